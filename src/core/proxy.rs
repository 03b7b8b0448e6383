use crate::domain::model::HttpMethod;
use crate::domain::ports::{ConfigProvider, Transport};
use crate::utils::error::{DashboardError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use url::{Origin, Url};

/// Headers that describe a single connection or the body framing and must
/// not be relayed.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
    "proxy-connection",
    "te",
    "trailer",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MultipartPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: value.into().into_bytes(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<MultipartPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: RequestBody,
    pub headers: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: RequestBody::Empty,
            headers: Vec::new(),
        }
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_parts(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// JSON envelope posted to the proxy route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyEnvelope {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl ProxyEnvelope {
    pub fn into_request(self) -> OutboundRequest {
        let body = match (self.method, self.body) {
            // GET 不帶 body
            (HttpMethod::Get, Some(_)) => {
                tracing::debug!("Dropping body of GET request to {}", self.url);
                RequestBody::Empty
            }
            (_, Some(value)) => RequestBody::Json(value),
            (_, None) => RequestBody::Empty,
        };

        OutboundRequest {
            method: self.method,
            url: self.url,
            body,
            headers: self.headers.into_iter().collect(),
        }
    }
}

impl TryFrom<&OutboundRequest> for ProxyEnvelope {
    type Error = DashboardError;

    fn try_from(request: &OutboundRequest) -> Result<Self> {
        let body = match &request.body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => Some(value.clone()),
            RequestBody::Multipart(_) => {
                return Err(DashboardError::MultipartError {
                    message: "multipart bodies cannot travel in a JSON envelope".to_string(),
                })
            }
        };

        Ok(Self {
            url: request.url.clone(),
            method: request.method,
            body,
            headers: request.headers.iter().cloned().collect(),
        })
    }
}

/// Upstream answer with its original status code.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    pub body: Value,
    /// false when the body is the raw-text fallback or empty
    pub json: bool,
}

impl ProxyReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_message(&self) -> String {
        ["message", "error"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
            .filter(|msg| !msg.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", self.status))
    }

    pub fn into_result(self) -> Result<Value> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(DashboardError::Upstream {
                status: self.status,
                message: self.error_message(),
            })
        }
    }
}

/// 將上游回應正規化：JSON 照原樣，其他文字包成 `{ "message": ... }`
pub fn normalize_response(status: u16, bytes: &[u8]) -> ProxyReply {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return ProxyReply {
            status,
            body: Value::Null,
            json: false,
        };
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(body) => ProxyReply {
            status,
            body,
            json: true,
        },
        Err(_) => ProxyReply {
            status,
            body: json!({ "message": String::from_utf8_lossy(bytes) }),
            json: false,
        },
    }
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// 轉送到上游 API，保留上游狀態碼
pub struct RequestForwarder {
    client: Client,
    upstream: Url,
    allowed_origins: Vec<Origin>,
    default_headers: Vec<(String, String)>,
}

impl RequestForwarder {
    pub fn new<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        let mut upstream = Url::parse(config.upstream_origin())?;
        if !upstream.path().ends_with('/') {
            let path = format!("{}/", upstream.path());
            upstream.set_path(&path);
        }

        let allowed_origins = config
            .allowed_origins()
            .iter()
            .map(|o| Url::parse(o).map(|u| u.origin()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        tracing::debug!("Proxy upstream: {}", upstream);

        Ok(Self {
            client,
            upstream,
            allowed_origins,
            default_headers: config.default_headers(),
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Relative targets are joined onto the upstream origin. Either way the
    /// resolved URL must point at the upstream or an allowed origin.
    pub fn resolve_target(&self, target: &str) -> Result<Url> {
        let target = target.trim();
        if target.is_empty() {
            return Err(DashboardError::TargetRejected {
                url: target.to_string(),
                reason: "target URL is empty".to_string(),
            });
        }

        let url = match Url::parse(target) {
            Ok(url) => url,
            // 反斜線會被 join 當成 `//`，所以 join 之後仍要檢查 origin
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.upstream.join(target.trim_start_matches('/'))?
            }
            Err(e) => return Err(e.into()),
        };
        self.check_origin(target, url)
    }

    fn check_origin(&self, target: &str, url: Url) -> Result<Url> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DashboardError::TargetRejected {
                url: target.to_string(),
                reason: format!("unsupported scheme: {}", url.scheme()),
            });
        }
        let origin = url.origin();
        if origin == self.upstream.origin() || self.allowed_origins.contains(&origin) {
            Ok(url)
        } else {
            Err(DashboardError::TargetRejected {
                url: target.to_string(),
                reason: "origin is not the upstream API".to_string(),
            })
        }
    }

    fn build_headers(&self, request: &OutboundRequest) -> Result<HeaderMap> {
        let framed = !matches!(request.body, RequestBody::Empty);
        let mut headers = HeaderMap::new();

        // 預設標頭先套用，呼叫端可覆寫
        for (name, value) in self.default_headers.iter().chain(request.headers.iter()) {
            if is_hop_by_hop(name) || (framed && name.eq_ignore_ascii_case("content-type")) {
                continue;
            }
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                DashboardError::ValidationError {
                    message: format!("invalid header name: {}", name),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| DashboardError::ValidationError {
                    message: format!("invalid value for header {}", name),
                })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    pub async fn forward(&self, request: OutboundRequest) -> Result<ProxyReply> {
        let target = self.resolve_target(&request.url)?;
        let headers = self.build_headers(&request)?;
        let method = request.method;

        tracing::debug!("📡 Forwarding {} {}", method, target);

        let mut builder = self
            .client
            .request(method.to_reqwest(), target.clone())
            .headers(headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("📡 {} {} failed: {}", method, target, e);
            e
        })?;

        let status = response.status().as_u16();
        let is_json_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);
        let bytes = response.bytes().await?;
        let reply = normalize_response(status, &bytes);

        if is_json_type && !reply.json && reply.body != Value::Null {
            tracing::warn!("📡 {} declared JSON but body did not parse", target);
        }
        tracing::info!("📡 {} {} -> {}", method, target, status);

        Ok(reply)
    }
}

fn build_form(parts: Vec<MultipartPart>) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        let mut field = reqwest::multipart::Part::bytes(part.data);
        if let Some(file_name) = part.file_name {
            field = field.file_name(file_name);
        }
        if let Some(content_type) = part.content_type {
            field = field
                .mime_str(&content_type)
                .map_err(|e| DashboardError::MultipartError {
                    message: format!("invalid content type for {}: {}", part.name, e),
                })?;
        }
        form = form.part(part.name, field);
    }
    Ok(form)
}

#[async_trait]
impl Transport for RequestForwarder {
    async fn send(&self, request: OutboundRequest) -> Result<ProxyReply> {
        self.forward(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use httpmock::prelude::*;

    fn forwarder(origin: &str) -> RequestForwarder {
        RequestForwarder::new(&DashboardConfig::with_upstream(origin)).unwrap()
    }

    #[test]
    fn test_resolve_relative_targets_keep_prefix() {
        let fwd = forwarder("https://api.example.com/api");
        assert_eq!(
            fwd.resolve_target("blogs").unwrap().as_str(),
            "https://api.example.com/api/blogs"
        );
        assert_eq!(
            fwd.resolve_target("/blogs/42?draft=true").unwrap().as_str(),
            "https://api.example.com/api/blogs/42?draft=true"
        );
    }

    #[test]
    fn test_resolve_absolute_targets() {
        let mut config = DashboardConfig::with_upstream("https://api.example.com/api/");
        config.upstream.allowed_origins = vec!["https://media.example.com".to_string()];
        let fwd = RequestForwarder::new(&config).unwrap();

        assert!(fwd.resolve_target("https://api.example.com/other").is_ok());
        assert!(fwd.resolve_target("https://media.example.com/upload").is_ok());
        assert!(matches!(
            fwd.resolve_target("https://evil.example.net/"),
            Err(DashboardError::TargetRejected { .. })
        ));
        assert!(matches!(
            fwd.resolve_target("file:///etc/passwd"),
            Err(DashboardError::TargetRejected { .. })
        ));
        assert!(fwd.resolve_target("   ").is_err());
    }

    #[test]
    fn test_protocol_relative_target_stays_on_upstream() {
        let fwd = forwarder("https://api.example.com/api/");
        let url = fwd.resolve_target("//evil.example.net/x").unwrap();
        assert_eq!(url.host_str(), Some("api.example.com"));
    }

    #[test]
    fn test_backslash_targets_cannot_leave_upstream() {
        let fwd = forwarder("https://api.example.com/api/");
        for target in ["\\\\evil.example.net/x", "\\/evil.example.net/x"] {
            assert!(
                matches!(
                    fwd.resolve_target(target),
                    Err(DashboardError::TargetRejected { .. })
                ),
                "{} should be rejected",
                target
            );
        }
    }

    #[test]
    fn test_normalize_response() {
        let reply = normalize_response(200, br#"{"ok":true}"#);
        assert!(reply.json);
        assert_eq!(reply.body, json!({ "ok": true }));

        let reply = normalize_response(502, b"<html>Bad Gateway</html>");
        assert!(!reply.json);
        assert_eq!(reply.status, 502);
        assert_eq!(reply.body, json!({ "message": "<html>Bad Gateway</html>" }));

        let reply = normalize_response(204, b"");
        assert_eq!(reply.body, Value::Null);
    }

    #[test]
    fn test_reply_error_message() {
        let reply = ProxyReply {
            status: 422,
            body: json!({ "error": "title is required" }),
            json: true,
        };
        assert_eq!(reply.error_message(), "title is required");

        let reply = ProxyReply {
            status: 500,
            body: Value::Null,
            json: false,
        };
        assert_eq!(reply.error_message(), "Request failed with status 500");
        assert!(matches!(
            reply.into_result(),
            Err(DashboardError::Upstream { status: 500, .. })
        ));
    }

    #[test]
    fn test_envelope_drops_get_body() {
        let envelope: ProxyEnvelope = serde_json::from_value(json!({
            "url": "blogs",
            "body": { "ignored": true },
            "headers": { "X-Trace": "1" }
        }))
        .unwrap();
        let request = envelope.into_request();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.body, RequestBody::Empty);
        assert!(request.has_header("x-trace"));
    }

    #[test]
    fn test_multipart_request_has_no_envelope() {
        let request = OutboundRequest::new(HttpMethod::Post, "uploads")
            .with_parts(vec![MultipartPart::text("alt", "cover")]);
        assert!(ProxyEnvelope::try_from(&request).is_err());
    }

    #[tokio::test]
    async fn test_forward_json_body_and_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/blogs")
                    .header("authorization", "Bearer secret")
                    .json_body(json!({ "title": "Hello" }));
                then.status(201).json_body(json!({ "id": "1", "title": "Hello" }));
            })
            .await;

        let fwd = forwarder(&server.url("/api"));
        let request = OutboundRequest::new(HttpMethod::Post, "/blogs")
            .with_json(json!({ "title": "Hello" }))
            .with_header("Authorization", "Bearer secret")
            .with_header("Host", "spoofed.example");

        let reply = fwd.forward(request).await.unwrap();
        mock.assert_async().await;
        assert_eq!(reply.status, 201);
        assert_eq!(reply.body["id"], "1");
    }

    #[tokio::test]
    async fn test_forward_keeps_error_status_and_wraps_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/blogs/9");
                then.status(404)
                    .header("content-type", "text/plain")
                    .body("Not Found");
            })
            .await;

        let fwd = forwarder(&server.base_url());
        let reply = fwd
            .forward(OutboundRequest::new(HttpMethod::Delete, "blogs/9"))
            .await
            .unwrap();
        assert_eq!(reply.status, 404);
        assert!(!reply.json);
        assert_eq!(reply.body, json!({ "message": "Not Found" }));
    }

    #[tokio::test]
    async fn test_forward_applies_default_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/blogs").header("x-api-key", "override");
                then.status(200).json_body(json!([]));
            })
            .await;

        let mut config = DashboardConfig::with_upstream(&server.base_url());
        config
            .upstream
            .default_headers
            .insert("X-Api-Key".to_string(), "default".to_string());
        let fwd = RequestForwarder::new(&config).unwrap();

        let request =
            OutboundRequest::new(HttpMethod::Get, "blogs").with_header("x-api-key", "override");
        let reply = fwd.forward(request).await.unwrap();
        mock.assert_async().await;
        assert!(reply.is_success());
    }

    #[tokio::test]
    async fn test_forward_rejects_invalid_header() {
        let fwd = forwarder("http://127.0.0.1:9/");
        let request =
            OutboundRequest::new(HttpMethod::Get, "blogs").with_header("bad header", "x");
        assert!(matches!(
            fwd.forward(request).await,
            Err(DashboardError::ValidationError { .. })
        ));
    }
}

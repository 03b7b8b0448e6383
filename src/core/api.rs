use crate::core::proxy::{
    normalize_response, MultipartPart, OutboundRequest, ProxyEnvelope, ProxyReply, RequestBody,
};
use crate::domain::model::HttpMethod;
use crate::domain::ports::Transport;
use crate::utils::error::{DashboardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Marks a proxy reply whose body is the raw-text fallback.
pub const RAW_BODY_HEADER: &str = "x-proxy-body";

pub struct ApiClient<T: Transport> {
    transport: T,
    auth_token: Option<String>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn dispatch(&self, mut request: OutboundRequest) -> Result<Value> {
        if let Some(token) = &self.auth_token {
            if !request.has_header("authorization") {
                request = request.with_header("Authorization", format!("Bearer {}", token));
            }
        }

        let method = request.method;
        let url = request.url.clone();
        let reply = self.transport.send(request).await?;

        if !reply.is_success() {
            tracing::warn!("{} {} returned {}: {}", method, url, reply.status, reply.error_message());
        }
        reply.into_result()
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        self.dispatch(OutboundRequest::new(HttpMethod::Get, url)).await
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.dispatch(OutboundRequest::new(HttpMethod::Delete, url)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.dispatch(OutboundRequest::new(HttpMethod::Post, url).with_json(body))
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.dispatch(OutboundRequest::new(HttpMethod::Put, url).with_json(body))
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.dispatch(OutboundRequest::new(HttpMethod::Patch, url).with_json(body))
            .await
    }

    pub async fn upload(
        &self,
        url: &str,
        method: HttpMethod,
        parts: Vec<MultipartPart>,
    ) -> Result<Value> {
        if matches!(method, HttpMethod::Get | HttpMethod::Delete) {
            return Err(DashboardError::MultipartError {
                message: format!("{} requests cannot carry a multipart body", method),
            });
        }
        self.dispatch(OutboundRequest::new(method, url).with_parts(parts))
            .await
    }
}

/// Sends envelopes to a dashboard's `/api/proxy` route over HTTP.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    upload_endpoint: Url,
}

impl HttpTransport {
    /// `endpoint` is the JSON proxy route, e.g. `http://127.0.0.1:3000/api/proxy`.
    pub fn new(endpoint: &str, timeout: std::time::Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let upload_path = format!("{}/upload", endpoint.path().trim_end_matches('/'));
        let mut upload_endpoint = endpoint.clone();
        upload_endpoint.set_path(&upload_path);

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            upload_endpoint,
        })
    }

    pub fn upload_endpoint(&self) -> &Url {
        &self.upload_endpoint
    }

    async fn read_reply(response: reqwest::Response) -> Result<ProxyReply> {
        let status = response.status().as_u16();
        let raw = response
            .headers()
            .get(RAW_BODY_HEADER)
            .map(|v| v.as_bytes() == b"raw")
            .unwrap_or(false);
        let bytes = response.bytes().await?;
        let mut reply = normalize_response(status, &bytes);
        if raw {
            reply.json = false;
        }
        Ok(reply)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ProxyReply> {
        let response = match &request.body {
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::multipart::Form::new()
                    .text("url", request.url.clone())
                    .text("method", request.method.as_str());
                if !request.headers.is_empty() {
                    let headers: serde_json::Map<String, Value> = request
                        .headers
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect();
                    form = form.text("headers", Value::Object(headers).to_string());
                }
                for part in parts {
                    let mut field = reqwest::multipart::Part::bytes(part.data.clone());
                    if let Some(file_name) = &part.file_name {
                        field = field.file_name(file_name.clone());
                    }
                    if let Some(content_type) = &part.content_type {
                        field = field.mime_str(content_type).map_err(|e| {
                            DashboardError::MultipartError {
                                message: format!("invalid content type for {}: {}", part.name, e),
                            }
                        })?;
                    }
                    form = form.part(part.name.clone(), field);
                }
                tracing::debug!("Posting multipart envelope to {}", self.upload_endpoint);
                self.client
                    .post(self.upload_endpoint.clone())
                    .multipart(form)
                    .send()
                    .await?
            }
            _ => {
                let envelope = ProxyEnvelope::try_from(&request)?;
                tracing::debug!("Posting envelope {} {} to {}", envelope.method, envelope.url, self.endpoint);
                self.client
                    .post(self.endpoint.clone())
                    .json(&envelope)
                    .send()
                    .await?
            }
        };

        Self::read_reply(response).await
    }
}

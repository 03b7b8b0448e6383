use crate::core::api::RAW_BODY_HEADER;
use crate::core::proxy::{MultipartPart, OutboundRequest, ProxyEnvelope, ProxyReply, RequestForwarder};
use crate::domain::model::HttpMethod;
use crate::utils::error::{DashboardError, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;

const UPLOAD_BODY_LIMIT: usize = 25 * 1024 * 1024;

pub fn app(forwarder: Arc<RequestForwarder>) -> Router {
    Router::new()
        .route("/api/proxy", post(proxy_json))
        .route(
            "/api/proxy/upload",
            post(proxy_multipart).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/health", get(health))
        .with_state(forwarder)
}

pub async fn run(listener: TcpListener, forwarder: Arc<RequestForwarder>) -> std::io::Result<()> {
    axum::serve(listener, app(forwarder))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutting down proxy server");
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "message": self.user_friendly_message(),
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn proxy_json(
    State(forwarder): State<Arc<RequestForwarder>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ProxyEnvelope>, JsonRejection>,
) -> Response {
    let envelope = match payload {
        Ok(Json(envelope)) => envelope,
        Err(rejection) => {
            tracing::warn!("Rejected proxy envelope: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "Invalid proxy request",
                    "error": rejection.body_text(),
                })),
            )
                .into_response();
        }
    };

    let mut request = envelope.into_request();
    inherit_authorization(&mut request, &headers);
    relay(&forwarder, request).await
}

async fn proxy_multipart(
    State(forwarder): State<Arc<RequestForwarder>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    match read_multipart(&mut multipart).await {
        Ok(mut request) => {
            inherit_authorization(&mut request, &headers);
            relay(&forwarder, request).await
        }
        Err(e) => {
            tracing::warn!("Rejected multipart proxy request: {}", e);
            e.into_response()
        }
    }
}

fn multipart_error(e: MultipartError) -> DashboardError {
    DashboardError::MultipartError {
        message: e.body_text(),
    }
}

/// `url`, `method` and `headers` are control fields; every other field is
/// relayed as a part.
async fn read_multipart(multipart: &mut Multipart) -> Result<OutboundRequest> {
    let mut url = None;
    let mut method = HttpMethod::Post;
    let mut headers = Vec::new();
    let mut parts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();

        match name.as_str() {
            "url" if !is_file => url = Some(field.text().await.map_err(multipart_error)?),
            "method" if !is_file => {
                let text = field.text().await.map_err(multipart_error)?;
                method = text
                    .parse()
                    .map_err(|message| DashboardError::ValidationError { message })?;
            }
            "headers" if !is_file => {
                let text = field.text().await.map_err(multipart_error)?;
                let map: BTreeMap<String, String> = serde_json::from_str(&text)?;
                headers.extend(map);
            }
            _ => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                parts.push(MultipartPart {
                    name,
                    file_name,
                    content_type,
                    data,
                });
            }
        }
    }

    let url = url.ok_or_else(|| DashboardError::ValidationError {
        message: "multipart proxy request is missing the url field".to_string(),
    })?;
    if matches!(method, HttpMethod::Get | HttpMethod::Delete) {
        return Err(DashboardError::MultipartError {
            message: format!("{} requests cannot carry a multipart body", method),
        });
    }

    let mut request = OutboundRequest::new(method, url).with_parts(parts);
    request.headers = headers;
    Ok(request)
}

/// 呼叫端沒有指定時沿用進來請求的 Authorization
fn inherit_authorization(request: &mut OutboundRequest, headers: &HeaderMap) {
    if request.has_header("authorization") {
        return;
    }
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        request
            .headers
            .push(("Authorization".to_string(), value.to_string()));
    }
}

async fn relay(forwarder: &RequestForwarder, request: OutboundRequest) -> Response {
    let method = request.method;
    let target = request.url.clone();
    match forwarder.forward(request).await {
        Ok(reply) => reply_response(reply),
        Err(e) => {
            tracing::error!(
                "❌ Proxy {} {} failed: {} (Category: {:?}, Severity: {:?})",
                method,
                target,
                e,
                e.category(),
                e.severity()
            );
            e.into_response()
        }
    }
}

fn reply_response(reply: ProxyReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);

    // 204/304 與空回應不帶 body
    if matches!(reply.status, 204 | 304) || (reply.body.is_null() && !reply.json) {
        return status.into_response();
    }

    let mut response = (status, Json(reply.body)).into_response();
    if !reply.json {
        response
            .headers_mut()
            .insert(RAW_BODY_HEADER, HeaderValue::from_static("raw"));
    }
    response
}

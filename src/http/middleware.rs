//! Cross-cutting request layers.
//!
//! Each layer wraps the next handler and reads the status from the finished
//! response, so it sees the final code written by every inner layer
//! (including admission rejections). Bodies are passed through untouched.
//!
//! Order, outermost first: access log → metrics capture → admission.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::http::request::{client_ip, request_id};
use crate::observability::Telemetry;

/// Backend label for requests counted at the gateway layer.
pub const GATEWAY_LABEL: &str = "gateway";

/// One structured log line per request.
pub async fn access_log(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote_ip = client_ip(&request);
    let request_id = request_id(&request).to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let response = next.run(request).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration = ?start.elapsed(),
        remote_ip = %remote_ip,
        user_agent = %user_agent,
        "HTTP Request"
    );
    response
}

/// Count every request except scrapes of the metrics endpoint itself.
pub async fn capture_metrics(
    State(telemetry): State<Arc<dyn Telemetry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let skip = request.uri().path() == "/metrics";

    let response = next.run(request).await;

    if !skip {
        telemetry.record_request(
            method.as_str(),
            response.status().as_u16(),
            GATEWAY_LABEL,
            start.elapsed(),
        );
    }
    response
}

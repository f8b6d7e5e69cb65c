use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Request/response logging. The check endpoint is a hot path, so this
/// stays to one log line per request, at warn for error statuses.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = client_ip(&request);
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed();
    if status.is_client_error() || status.is_server_error() {
        warn!(
            target: "limitd::http",
            method = %method,
            uri = %uri,
            client_ip = %client_ip,
            status = %status,
            elapsed = ?elapsed,
            "request failed"
        );
    } else {
        info!(
            target: "limitd::http",
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "request completed"
        );
    }

    response
}

fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                return first.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return value.to_string();
        }
    }

    "unknown".to_string()
}

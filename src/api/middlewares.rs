use axum::{
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Log method, path, status and latency of every request
pub async fn logging_middleware<B>(req: Request<B>, next: Next<B>) -> Response {
    let path = req.uri().path().to_owned();
    let method = req.method().clone();

    let start = Instant::now();
    let res = next.run(req).await;
    let duration = start.elapsed();

    let status = res.status();
    if status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), duration_ms = duration.as_millis() as u64, "Request failed");
    } else {
        info!(method = %method, path = %path, status = status.as_u16(), duration_ms = duration.as_millis() as u64, "Request completed");
    }

    res
}

/// Stamp a request id on requests that carry none, and echo it back
pub async fn request_id_middleware<B>(mut req: Request<B>, next: Next<B>) -> Response {
    let request_id = match req.headers().get(REQUEST_ID_HEADER) {
        Some(value) => value.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            req.headers_mut().insert(REQUEST_ID_HEADER, generated.clone());
            generated
        }
    };

    let mut res = next.run(req).await;
    res.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    res
}

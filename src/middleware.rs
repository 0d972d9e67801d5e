//! Request ID middleware for correlating logs with requests.
//!
//! Each request gets an ID: the caller's `x-request-id` if it is a valid UUID,
//! otherwise a fresh UUID v4. A tracing span carrying the ID wraps the whole
//! request, and the ID is echoed back on the response.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::REQUEST_ID_HEADER;

fn incoming_request_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}

/// Middleware that assigns a request ID and creates a request span.
///
/// Must be the outermost layer so the span covers every other layer.
pub async fn request_id_layer(request: Request, next: Next) -> Response {
    let request_id = incoming_request_id(request.headers()).unwrap_or_else(Uuid::new_v4);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        duration_ms = tracing::field::Empty,
    );

    let start = Instant::now();

    async move {
        let mut response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::info!(
            status = response.status().as_u16(),
            duration_ms,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

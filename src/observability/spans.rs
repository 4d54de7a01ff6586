//! Per-request spans.
//!
//! The HTTP trace layer opens one span per request carrying the request
//! id, so every event logged by the engine and by capabilities inherits it.

use axum::http::Request;
use tracing::Span;

use crate::http::X_REQUEST_ID;

/// Span for one inbound HTTP request.
pub fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}

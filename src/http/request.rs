//! Request handling and translation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Decode form submissions
//! - Translate the HTTP request into a `RouteRequest`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Reads are GET/HEAD; every other method submits to the leaf action
//! - Body size limit enforced while reading

use axum::body::{to_bytes, Body};
use axum::http::{HeaderName, Method, Request, StatusCode};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::engine::{FormData, RouteRequest};

/// Header carrying the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn request_id_header() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// Generates a UUID v4 request id when the client sent none.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

/// Whether `method` runs loaders only.
pub fn is_read(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Translate an HTTP request into an engine request.
///
/// Fails with `413` when the submission exceeds `max_body_bytes`.
pub async fn into_route_request(
    request: Request<Body>,
    max_body_bytes: usize,
    session_header: &str,
) -> Result<RouteRequest, StatusCode> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts
        .uri
        .query()
        .map(|q| FormData::parse(q.as_bytes()))
        .unwrap_or_default();

    let mut route_request = if is_read(&parts.method) {
        RouteRequest::read(path)
    } else {
        let bytes = to_bytes(body, max_body_bytes)
            .await
            .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;
        RouteRequest::write(path, FormData::parse(&bytes))
    };
    route_request = route_request.with_query(query);

    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            route_request = route_request.with_header(name.as_str(), value);
        }
    }
    if let Some(id) = parts.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()) {
        route_request = route_request.with_request_id(id);
    }
    if let Some(session) = parts
        .headers
        .get(session_header)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
    {
        route_request = route_request.with_session(session);
    }

    Ok(route_request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RequestMethod;

    #[tokio::test]
    async fn test_read_request() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/posts/hello?tab=comments")
            .header(X_REQUEST_ID, "req-1")
            .header("x-session-id", "tab-9")
            .body(Body::empty())
            .unwrap();

        let route_request = into_route_request(request, 1024, "x-session-id").await.unwrap();
        assert_eq!(route_request.method(), RequestMethod::Read);
        assert_eq!(route_request.path(), "/posts/hello");
        assert_eq!(route_request.query().get("tab"), Some("comments"));
        assert_eq!(route_request.request_id(), "req-1");
        assert_eq!(route_request.session(), Some("tab-9"));
    }

    #[tokio::test]
    async fn test_form_submission() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/posts/new")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("intent=create&title=Hi+there&tag=a&tag=b"))
            .unwrap();

        let route_request = into_route_request(request, 1024, "x-session-id").await.unwrap();
        assert_eq!(route_request.method(), RequestMethod::Write);
        assert_eq!(route_request.submission().get("title"), Some("Hi there"));
        assert_eq!(route_request.submission().get_all("tag").count(), 2);
        assert_eq!(route_request.session(), None);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/posts/new")
            .body(Body::from("x".repeat(100)))
            .unwrap();

        let err = into_route_request(request, 10, "x-session-id").await.unwrap_err();
        assert_eq!(err, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_make_request_id() {
        let request = Request::builder().body(()).unwrap();
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        assert_eq!(id.header_value().len(), 36);
    }
}

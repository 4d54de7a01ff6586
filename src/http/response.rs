//! Response encoding.
//!
//! # Responsibilities
//! - Turn engine output into HTTP responses
//! - Map engine errors to appropriate HTTP status codes
//!
//! # Design Decisions
//! - Redirects carry only a status and `Location`
//! - Rendered chains are JSON bodies
//! - Unhandled failures never expose capability error messages

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::engine::{EngineError, RouteResponse};

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for RouteResponse {
    fn into_response(self) -> Response {
        match self {
            RouteResponse::Redirect { status, location } => {
                (status_code(status), [(header::LOCATION, location)]).into_response()
            }
            RouteResponse::Render(payload) => {
                (status_code(payload.status), Json(payload)).into_response()
            }
            RouteResponse::NoMatch { path } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": 404, "error": "not found", "path": path })),
            )
                .into_response(),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = status_code(self.status());
        let message = match &self {
            EngineError::Unhandled { kind, .. } if kind.is_unexpected() => "internal server error",
            EngineError::Unhandled { .. } => status.canonical_reason().unwrap_or("request failed"),
            EngineError::Superseded => "superseded by a newer request",
        };
        (status, Json(json!({ "status": status.as_u16(), "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FailureKind;

    #[test]
    fn test_redirect_response() {
        let response = RouteResponse::Redirect {
            status: 302,
            location: "/login".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn test_error_statuses() {
        let unexpected = EngineError::Unhandled {
            route: "posts".into(),
            kind: FailureKind::UnexpectedError,
        };
        assert_eq!(unexpected.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let forbidden = EngineError::Unhandled {
            route: "posts".into(),
            kind: FailureKind::ExpectedStatus { status: 403 },
        };
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);

        assert_eq!(EngineError::Superseded.into_response().status(), StatusCode::CONFLICT);
    }
}

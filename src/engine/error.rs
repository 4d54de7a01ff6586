use thiserror::Error;

use crate::engine::boundary::Unhandled;
use crate::engine::outcome::FailureKind;
use crate::routing::RouteId;

/// Request-level failures the host has to turn into a response itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No node between the failing one and the root handles the failure.
    #[error("unhandled {kind} raised by route {route}")]
    Unhandled { route: RouteId, kind: FailureKind },

    /// A newer request for the same session started first.
    #[error("superseded by a newer request for the same session")]
    Superseded,
}

impl EngineError {
    /// HTTP status the host should answer with.
    pub fn status(&self) -> u16 {
        match self {
            EngineError::Unhandled { kind, .. } => kind.status(),
            EngineError::Superseded => 409,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::Unhandled { .. } => "unhandled",
            EngineError::Superseded => "superseded",
        }
    }
}

impl From<Unhandled> for EngineError {
    fn from(unhandled: Unhandled) -> Self {
        EngineError::Unhandled {
            route: unhandled.route,
            kind: unhandled.kind,
        }
    }
}

//! Engine output handed to the host.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::engine::boundary::{RenderTarget, Settlement};
use crate::engine::outcome::ControlSignal;
use crate::routing::{MatchedChain, RouteId};

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResponse {
    Redirect { status: u16, location: String },
    Render(RenderPayload),
    /// No leaf consumes the path; the host renders its global not-found.
    NoMatch { path: String },
}

impl RouteResponse {
    pub(crate) fn redirect(signal: &ControlSignal) -> Self {
        RouteResponse::Redirect {
            status: signal.status_code(),
            location: signal.location().unwrap_or("/").to_string(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RouteResponse::Redirect { status, .. } => *status,
            RouteResponse::Render(payload) => payload.status,
            RouteResponse::NoMatch { .. } => 404,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RouteResponse::Redirect { .. } => "redirect",
            RouteResponse::Render(payload) if payload.boundary.is_some() => "boundary",
            RouteResponse::Render(_) => "render",
            RouteResponse::NoMatch { .. } => "no_match",
        }
    }
}

/// Structured body of a rendered chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub status: u16,
    /// Matched route ids, root first.
    pub matches: Vec<RouteId>,
    /// Success payloads of the rendered nodes.
    pub loader_data: BTreeMap<RouteId, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_data: Option<Value>,
    /// Boundary rendered in place of a failed subtree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary: Option<RenderTarget>,
    /// Nodes that opted out of revalidation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<RouteId>,
}

impl RenderPayload {
    pub(crate) fn new(chain: &MatchedChain<'_>, settlement: Settlement) -> Self {
        Self {
            status: settlement
                .boundary
                .as_ref()
                .map_or(200, |target| target.kind.status()),
            matches: chain.route_ids(),
            loader_data: settlement.data,
            action_data: None,
            boundary: settlement.boundary,
            skipped: Vec::new(),
        }
    }

    pub(crate) fn with_action(mut self, data: Value, skipped: Vec<RouteId>) -> Self {
        self.action_data = Some(data);
        self.skipped = skipped;
        self
    }
}

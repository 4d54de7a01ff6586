//! Arguments passed to route capabilities.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::outcome::FailureKind;
use crate::engine::request::{Environment, FormData, RouteRequest};
use crate::routing::RouteId;

/// Path bindings of the whole matched chain.
pub type Params = Arc<BTreeMap<String, String>>;

/// Input of a [`Loader`](super::Loader).
#[derive(Debug, Clone)]
pub struct LoaderArgs {
    route: RouteId,
    request: Arc<RouteRequest>,
    params: Params,
}

impl LoaderArgs {
    pub fn new(route: RouteId, request: Arc<RouteRequest>, params: Params) -> Self {
        Self {
            route,
            request,
            params,
        }
    }

    /// Route the loader is attached to.
    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn request(&self) -> &RouteRequest {
        &self.request
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn env(&self) -> &Environment {
        self.request.env()
    }
}

/// Input of an [`Action`](super::Action).
#[derive(Debug, Clone)]
pub struct ActionArgs {
    route: RouteId,
    request: Arc<RouteRequest>,
    params: Params,
    intent_field: Arc<str>,
}

impl ActionArgs {
    pub fn new(
        route: RouteId,
        request: Arc<RouteRequest>,
        params: Params,
        intent_field: Arc<str>,
    ) -> Self {
        Self {
            route,
            request,
            params,
            intent_field,
        }
    }

    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn request(&self) -> &RouteRequest {
        &self.request
    }

    /// Decoded submission payload.
    pub fn submission(&self) -> &FormData {
        self.request.submission()
    }

    /// Operation selected by the submission, when several share one target.
    pub fn intent(&self) -> Option<&str> {
        self.submission().get(&self.intent_field)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn env(&self) -> &Environment {
        self.request.env()
    }
}

/// What a boundary handler is asked to render.
#[derive(Debug, Clone)]
pub struct BoundaryContext {
    /// Node whose boundary renders.
    pub route: RouteId,
    /// Node that raised the failure.
    pub failed_route: RouteId,
    pub kind: FailureKind,
    /// Signal body or `{"message": ...}` for unexpected errors.
    pub payload: Value,
    pub path: String,
}

/// Input of a [`RevalidationPolicy`](super::RevalidationPolicy).
#[derive(Debug, Clone)]
pub struct RevalidationArgs {
    /// Node asked whether it should reload.
    pub route: RouteId,
    /// Leaf whose action ran.
    pub action_route: RouteId,
    pub intent: Option<String>,
    pub path: String,
}

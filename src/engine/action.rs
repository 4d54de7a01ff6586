//! Action dispatch and revalidation.
//!
//! # Responsibilities
//! - Invoke the leaf's action, and only the leaf's
//! - Re-run the loaders of the revalidation set after a successful action
//! - Hand redirects back untouched and failures to the boundary resolver
//!
//! # Design Decisions
//! - The dispatcher is intent-agnostic: the action reads the intent field
//! - A successful action always returns fresh loader results; there is no
//!   path that returns success without the revalidation pass
//! - A leaf without an action is a `405` expected status

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::loader::{LoaderOrchestrator, LoaderOutcome};
use crate::engine::outcome::{ControlSignal, FailureKind, LoadResult};
use crate::engine::request::RouteRequest;
use crate::handler::{ActionArgs, RevalidationArgs};
use crate::observability::metrics;
use crate::resilience::timeouts::guard_capability;
use crate::routing::{MatchedChain, RouteId};

/// Status reported when the leaf declares no action.
pub const METHOD_NOT_ALLOWED: u16 = 405;

/// Nodes whose loaders re-run after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationSet {
    selected: Vec<bool>,
    skipped: Vec<RouteId>,
}

impl RevalidationSet {
    /// Every node of the chain.
    pub fn full(chain: &MatchedChain<'_>) -> Self {
        Self {
            selected: vec![true; chain.len()],
            skipped: Vec::new(),
        }
    }

    /// Every node except those whose policy opts out.
    pub fn for_action(chain: &MatchedChain<'_>, intent: Option<&str>) -> Self {
        let action_route = chain.leaf().id().clone();
        let mut selected = Vec::with_capacity(chain.len());
        let mut skipped = Vec::new();

        for matched in chain.iter() {
            let args = RevalidationArgs {
                route: matched.id().clone(),
                action_route: action_route.clone(),
                intent: intent.map(str::to_string),
                path: chain.path().to_string(),
            };
            let keep = matched.node().handlers().should_revalidate(&args);
            if !keep {
                skipped.push(matched.id().clone());
            }
            selected.push(keep);
        }

        Self { selected, skipped }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.selected.get(position).copied().unwrap_or(false)
    }

    pub fn selected(&self) -> &[bool] {
        &self.selected
    }

    /// Nodes that opted out, root first.
    pub fn skipped(&self) -> &[RouteId] {
        &self.skipped
    }
}

/// Outcome of a write request.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// The action redirected; nothing was revalidated.
    Redirect { route: RouteId, signal: ControlSignal },
    /// The action succeeded and the revalidation pass ran.
    Revalidated {
        route: RouteId,
        data: Value,
        revalidation: LoaderOutcome,
        skipped: Vec<RouteId>,
    },
    /// The action failed or returned an expected status; nothing was revalidated.
    Failed {
        route: RouteId,
        position: usize,
        kind: FailureKind,
        payload: Value,
    },
}

/// Routes a submission to the leaf's action.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    loaders: LoaderOrchestrator,
    intent_field: Arc<str>,
    deadline: Option<Duration>,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(LoaderOrchestrator::default(), "intent", None)
    }
}

impl ActionDispatcher {
    pub fn new(
        loaders: LoaderOrchestrator,
        intent_field: impl Into<Arc<str>>,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            loaders,
            intent_field: intent_field.into(),
            deadline,
        }
    }

    pub fn intent_field(&self) -> &str {
        &self.intent_field
    }

    /// Run the leaf's action, then revalidate on success.
    pub async fn act(&self, chain: &MatchedChain<'_>, request: &Arc<RouteRequest>) -> ActionOutcome {
        let leaf = chain.leaf();
        let route = leaf.id().clone();
        let position = chain.len() - 1;

        let Some(action) = leaf.node().handlers().get_action() else {
            tracing::debug!(
                request_id = %request.request_id(),
                route = %route,
                "Leaf declares no action"
            );
            metrics::record_action(&route, "missing");
            return ActionOutcome::Failed {
                route,
                position,
                kind: FailureKind::ExpectedStatus {
                    status: METHOD_NOT_ALLOWED,
                },
                payload: Value::Null,
            };
        };

        let params = Arc::new(chain.params());
        let args = ActionArgs::new(
            route.clone(),
            request.clone(),
            params,
            self.intent_field.clone(),
        );
        let intent = args.intent().map(str::to_string);

        let started = Instant::now();
        let action = action.clone();
        let result = guard_capability(self.deadline, async move { action.act(args).await }).await;
        tracing::debug!(
            request_id = %request.request_id(),
            route = %route,
            intent = intent.as_deref().unwrap_or("-"),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Action completed"
        );

        match result {
            LoadResult::Signal(signal) if signal.is_redirect() => {
                metrics::record_action(&route, "redirect");
                ActionOutcome::Redirect { route, signal }
            }
            LoadResult::Success(data) => {
                metrics::record_action(&route, "success");
                let set = RevalidationSet::for_action(chain, intent.as_deref());
                let revalidation = self
                    .loaders
                    .load_selected(chain, request, set.selected())
                    .await;
                ActionOutcome::Revalidated {
                    route,
                    data,
                    revalidation,
                    skipped: set.skipped,
                }
            }
            other => {
                metrics::record_action(&route, "failure");
                let (kind, payload) = other
                    .failure()
                    .unwrap_or((FailureKind::UnexpectedError, Value::Null));
                tracing::warn!(
                    request_id = %request.request_id(),
                    route = %route,
                    kind = %kind,
                    "Action failed"
                );
                ActionOutcome::Failed {
                    route,
                    position,
                    kind,
                    payload,
                }
            }
        }
    }
}

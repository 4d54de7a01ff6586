//! Loader orchestration.
//!
//! # Responsibilities
//! - Start every matched node's loader at once, one task per node
//! - Collect exactly one result per node
//! - Stop early once the shallowest redirect is known
//!
//! # Design Decisions
//! - No node waits on another: parents never guard children, so every
//!   loader must assert its own authorization
//! - Redirect precedence is shallowest node first, independent of
//!   completion order
//! - A node without a loader yields an implicit empty success

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::engine::outcome::{ControlSignal, FailureKind, LoadResult, RouteFailure};
use crate::engine::request::RouteRequest;
use crate::handler::LoaderArgs;
use crate::observability::metrics;
use crate::resilience::timeouts::guard_capability;
use crate::routing::{MatchedChain, RouteId};

/// Per-node loader results for one chain, in chain order.
///
/// Positions that were not selected for loading hold no result.
#[derive(Debug, Clone)]
pub struct LoadResults {
    routes: Vec<RouteId>,
    slots: Vec<Option<LoadResult>>,
}

impl LoadResults {
    pub fn get(&self, id: &str) -> Option<&LoadResult> {
        let position = self.routes.iter().position(|r| r.as_str() == id)?;
        self.slots[position].as_ref()
    }

    /// Loaded results with their route ids, root first.
    pub fn iter(&self) -> impl Iterator<Item = (&RouteId, &LoadResult)> {
        self.routes
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(id, slot)| slot.as_ref().map(|r| (id, r)))
    }

    /// Number of loaded results.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deepest failing position strictly above `limit`.
    pub fn deepest_failure(&self, limit: usize) -> Option<(usize, FailureKind, Value)> {
        self.slots[..limit.min(self.slots.len())]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(position, slot)| {
                let (kind, payload) = slot.as_ref()?.failure()?;
                Some((position, kind, payload))
            })
    }

    /// Failure recorded at `position`, if any.
    pub fn failure_at(&self, position: usize) -> Option<(FailureKind, Value)> {
        self.slots.get(position)?.as_ref()?.failure()
    }

    /// Success payloads of positions strictly above `limit`, keyed by route id.
    pub fn data_above(&self, limit: usize) -> BTreeMap<RouteId, Value> {
        self.routes
            .iter()
            .zip(self.slots.iter())
            .take(limit)
            .filter_map(|(id, slot)| match slot {
                Some(LoadResult::Success(payload)) => Some((id.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Aggregate outcome of a loader pass.
#[derive(Debug, Clone)]
pub enum LoaderOutcome {
    /// The shallowest redirect; other results are discarded.
    Redirect { route: RouteId, signal: ControlSignal },
    /// Every selected loader completed without redirecting.
    Settled(LoadResults),
}

/// Runs the loaders of a matched chain concurrently.
#[derive(Debug, Clone, Default)]
pub struct LoaderOrchestrator {
    deadline: Option<Duration>,
}

impl LoaderOrchestrator {
    pub fn new(deadline: Option<Duration>) -> Self {
        Self { deadline }
    }

    /// Load every node of the chain.
    pub async fn load(&self, chain: &MatchedChain<'_>, request: &Arc<RouteRequest>) -> LoaderOutcome {
        self.load_selected(chain, request, &vec![true; chain.len()]).await
    }

    /// Load the nodes whose position is `true` in `selected`.
    pub async fn load_selected(
        &self,
        chain: &MatchedChain<'_>,
        request: &Arc<RouteRequest>,
        selected: &[bool],
    ) -> LoaderOutcome {
        let params = Arc::new(chain.params());
        let mut slots: Vec<Option<LoadResult>> = vec![None; chain.len()];
        let mut tasks = JoinSet::new();

        for (position, matched) in chain.iter().enumerate() {
            if !selected.get(position).copied().unwrap_or(false) {
                continue;
            }
            let route = matched.id().clone();
            let Some(loader) = matched.node().handlers().get_loader() else {
                slots[position] = Some(LoadResult::empty());
                continue;
            };

            let loader = loader.clone();
            let args = LoaderArgs::new(route.clone(), request.clone(), params.clone());
            let deadline = self.deadline;
            tasks.spawn(async move {
                let started = Instant::now();
                // The closure body runs on first poll, inside the panic guard.
                let result =
                    guard_capability(deadline, async move { loader.load(args).await }).await;
                metrics::record_loader(&route, started);
                (position, result)
            });
        }

        tracing::debug!(
            request_id = %request.request_id(),
            path = %chain.path(),
            loaders = tasks.len(),
            "Loaders started"
        );

        if let Some(outcome) = settled_redirect(chain, &slots, selected) {
            return outcome;
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => slots[position] = Some(result),
                Err(e) => {
                    tracing::error!(request_id = %request.request_id(), error = %e, "Loader task failed");
                    continue;
                }
            }
            if let Some(outcome) = settled_redirect(chain, &slots, selected) {
                // Dropping the set aborts the loaders still running.
                return outcome;
            }
        }

        for (position, slot) in slots.iter_mut().enumerate() {
            if selected.get(position).copied().unwrap_or(false) && slot.is_none() {
                *slot = Some(LoadResult::Failure(RouteFailure::new("loader did not complete")));
            }
        }

        LoaderOutcome::Settled(LoadResults {
            routes: chain.route_ids(),
            slots,
        })
    }
}

/// The shallowest redirect, once every shallower selected node has settled.
fn settled_redirect(
    chain: &MatchedChain<'_>,
    slots: &[Option<LoadResult>],
    selected: &[bool],
) -> Option<LoaderOutcome> {
    for (position, slot) in slots.iter().enumerate() {
        if !selected.get(position).copied().unwrap_or(false) {
            continue;
        }
        match slot {
            None => return None,
            Some(LoadResult::Signal(signal)) if signal.is_redirect() => {
                let route = chain.get(position)?.id().clone();
                return Some(LoaderOutcome::Redirect {
                    route,
                    signal: signal.clone(),
                });
            }
            Some(_) => {}
        }
    }
    None
}

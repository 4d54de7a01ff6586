//! Request pipeline: match, load or act, resolve boundaries.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RouterConfig;
use crate::engine::action::{ActionDispatcher, ActionOutcome};
use crate::engine::boundary::{BoundaryResolver, Settlement};
use crate::engine::error::EngineError;
use crate::engine::loader::{LoaderOrchestrator, LoaderOutcome};
use crate::engine::request::{Environment, RequestMethod, RouteRequest};
use crate::engine::response::{RenderPayload, RouteResponse};
use crate::engine::session::SessionTracker;
use crate::observability::metrics;
use crate::resilience::timeouts::deadline_from_millis;
use crate::routing::{match_path, MatchedChain, RouteTree};

/// Tunables of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub loader_timeout: Option<Duration>,
    pub action_timeout: Option<Duration>,
    /// Submission field holding the action intent.
    pub intent_field: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            loader_timeout: None,
            action_timeout: None,
            intent_field: "intent".to_string(),
        }
    }
}

impl From<&RouterConfig> for EngineSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            loader_timeout: deadline_from_millis(config.timeouts.loader_ms),
            action_timeout: deadline_from_millis(config.timeouts.action_ms),
            intent_field: config.engine.intent_field.clone(),
        }
    }
}

/// Nested route engine.
///
/// Cheap to clone; clones share the route tree and the session tracker.
#[derive(Clone)]
pub struct Engine {
    tree: Arc<ArcSwap<RouteTree>>,
    loaders: LoaderOrchestrator,
    actions: ActionDispatcher,
    sessions: SessionTracker,
    env: Arc<Environment>,
}

impl Engine {
    pub fn new(tree: RouteTree, settings: EngineSettings, env: Environment) -> Self {
        let loaders = LoaderOrchestrator::new(settings.loader_timeout);
        let actions = ActionDispatcher::new(
            loaders.clone(),
            settings.intent_field.as_str(),
            settings.action_timeout,
        );
        Self {
            tree: Arc::new(ArcSwap::from_pointee(tree)),
            loaders,
            actions,
            sessions: SessionTracker::new(),
            env: Arc::new(env),
        }
    }

    /// Current route tree.
    pub fn tree(&self) -> Arc<RouteTree> {
        self.tree.load_full()
    }

    /// Swap in a rebuilt tree. Requests already running keep the old one.
    pub fn replace_tree(&self, tree: RouteTree) {
        tracing::info!(routes = tree.len(), "Route tree replaced");
        self.tree.store(Arc::new(tree));
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Handle one request end to end.
    pub async fn handle(&self, request: RouteRequest) -> Result<RouteResponse, EngineError> {
        let started = Instant::now();
        let request = Arc::new(request.with_env(self.env.clone()));
        let tree = self.tree.load_full();

        let result = match request.session() {
            // A routed submission always runs to completion; it still
            // supersedes older requests of its session.
            Some(key) if request.method() == RequestMethod::Write => {
                let _ticket = self.sessions.begin(key);
                self.dispatch(&tree, &request).await
            }
            Some(key) => {
                let mut ticket = self.sessions.begin(key);
                let result = tokio::select! {
                    biased;
                    _ = ticket.superseded() => Err(EngineError::Superseded),
                    result = self.dispatch(&tree, &request) => result,
                };
                if ticket.is_current() {
                    result
                } else {
                    Err(EngineError::Superseded)
                }
            }
            None => self.dispatch(&tree, &request).await,
        };

        let outcome = match &result {
            Ok(response) => response.label(),
            Err(e) => e.label(),
        };
        tracing::debug!(
            request_id = %request.request_id(),
            method = request.method().as_str(),
            path = %request.path(),
            outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        metrics::record_request(request.method().as_str(), outcome, started);

        result
    }

    async fn dispatch(
        &self,
        tree: &RouteTree,
        request: &Arc<RouteRequest>,
    ) -> Result<RouteResponse, EngineError> {
        let chain = match match_path(tree, request.path()) {
            Ok(chain) => chain,
            Err(no_match) => {
                tracing::debug!(
                    request_id = %request.request_id(),
                    path = %no_match.path,
                    "No route matched"
                );
                return Ok(RouteResponse::NoMatch {
                    path: no_match.path,
                });
            }
        };

        match request.method() {
            RequestMethod::Read => self.navigate(&chain, request).await,
            RequestMethod::Write => self.submit(&chain, request).await,
        }
    }

    async fn navigate(
        &self,
        chain: &MatchedChain<'_>,
        request: &Arc<RouteRequest>,
    ) -> Result<RouteResponse, EngineError> {
        match self.loaders.load(chain, request).await {
            LoaderOutcome::Redirect { route, signal } => {
                tracing::debug!(
                    request_id = %request.request_id(),
                    route = %route,
                    location = signal.location().unwrap_or_default(),
                    "Loader redirected"
                );
                Ok(RouteResponse::redirect(&signal))
            }
            LoaderOutcome::Settled(results) => {
                let settlement = BoundaryResolver::settle(chain, &results)?;
                Ok(RouteResponse::Render(RenderPayload::new(chain, settlement)))
            }
        }
    }

    async fn submit(
        &self,
        chain: &MatchedChain<'_>,
        request: &Arc<RouteRequest>,
    ) -> Result<RouteResponse, EngineError> {
        match self.actions.act(chain, request).await {
            ActionOutcome::Redirect { signal, .. } => Ok(RouteResponse::redirect(&signal)),
            ActionOutcome::Revalidated {
                data,
                revalidation,
                skipped,
                ..
            } => match revalidation {
                LoaderOutcome::Redirect { signal, .. } => Ok(RouteResponse::redirect(&signal)),
                LoaderOutcome::Settled(results) => {
                    let settlement = BoundaryResolver::settle(chain, &results)?;
                    Ok(RouteResponse::Render(
                        RenderPayload::new(chain, settlement).with_action(data, skipped),
                    ))
                }
            },
            ActionOutcome::Failed {
                position,
                kind,
                payload,
                ..
            } => {
                let target = BoundaryResolver::resolve(chain, position, kind, payload)?;
                // no revalidation after a failed action
                let settlement = Settlement {
                    data: Default::default(),
                    boundary: Some(target),
                };
                Ok(RouteResponse::Render(RenderPayload::new(chain, settlement)))
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("routes", &self.tree.load().len())
            .field("sessions", &self.sessions.active())
            .finish()
    }
}

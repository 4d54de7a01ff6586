//! Route capabilities.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     HandlerRegistry (route id → RouteHandlers)
//!     → RouteTree::build attaches handlers to nodes
//!
//! Per request:
//!     Loader::load(LoaderArgs)        → LoadResult   (every matched node)
//!     Action::act(ActionArgs)         → LoadResult   (leaf only)
//!     BoundaryHandler::render(ctx)    → render description
//!     RevalidationPolicy::should_revalidate(args) → bool
//! ```
//!
//! # Design Decisions
//! - Capabilities are trait objects behind `Arc` so nodes stay cheap to clone
//! - Async capabilities return `'static` boxed futures so each one can run
//!   on its own task
//! - Closures implement the traits directly

pub mod args;
pub mod registry;

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::engine::outcome::{FailureKind, LoadResult};

pub use args::{ActionArgs, BoundaryContext, LoaderArgs, RevalidationArgs};
pub use registry::HandlerRegistry;

/// Read-path data dependency of a route.
pub trait Loader: Send + Sync + 'static {
    fn load(&self, args: LoaderArgs) -> BoxFuture<'static, LoadResult>;
}

impl<F, Fut> Loader for F
where
    F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult> + Send + 'static,
{
    fn load(&self, args: LoaderArgs) -> BoxFuture<'static, LoadResult> {
        Box::pin(self(args))
    }
}

/// Write-path mutation of a route.
pub trait Action: Send + Sync + 'static {
    fn act(&self, args: ActionArgs) -> BoxFuture<'static, LoadResult>;
}

impl<F, Fut> Action for F
where
    F: Fn(ActionArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult> + Send + 'static,
{
    fn act(&self, args: ActionArgs) -> BoxFuture<'static, LoadResult> {
        Box::pin(self(args))
    }
}

/// Renders in place of a failing descendant.
pub trait BoundaryHandler: Send + Sync + 'static {
    fn render(&self, context: &BoundaryContext) -> Value;

    /// Whether this handler accepts the failure. Defaults to every failure
    /// of the class it is registered for.
    fn handles(&self, _kind: &FailureKind) -> bool {
        true
    }
}

impl<F> BoundaryHandler for F
where
    F: Fn(&BoundaryContext) -> Value + Send + Sync + 'static,
{
    fn render(&self, context: &BoundaryContext) -> Value {
        self(context)
    }
}

/// Restricts a status handler to a set of status codes.
pub struct OnlyStatuses<H> {
    statuses: Vec<u16>,
    inner: H,
}

impl<H: BoundaryHandler> OnlyStatuses<H> {
    pub fn new(statuses: impl IntoIterator<Item = u16>, inner: H) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            inner,
        }
    }
}

impl<H: BoundaryHandler> BoundaryHandler for OnlyStatuses<H> {
    fn render(&self, context: &BoundaryContext) -> Value {
        self.inner.render(context)
    }

    fn handles(&self, kind: &FailureKind) -> bool {
        match kind {
            FailureKind::ExpectedStatus { status } => self.statuses.contains(status),
            FailureKind::UnexpectedError => false,
        }
    }
}

/// Lets a route opt out of revalidation after an action.
pub trait RevalidationPolicy: Send + Sync + 'static {
    fn should_revalidate(&self, args: &RevalidationArgs) -> bool;
}

impl<F> RevalidationPolicy for F
where
    F: Fn(&RevalidationArgs) -> bool + Send + Sync + 'static,
{
    fn should_revalidate(&self, args: &RevalidationArgs) -> bool {
        self(args)
    }
}

/// Capabilities attached to one route node.
#[derive(Clone, Default)]
pub struct RouteHandlers {
    loader: Option<Arc<dyn Loader>>,
    action: Option<Arc<dyn Action>>,
    error_handler: Option<Arc<dyn BoundaryHandler>>,
    status_handler: Option<Arc<dyn BoundaryHandler>>,
    revalidation: Option<Arc<dyn RevalidationPolicy>>,
}

impl RouteHandlers {
    pub fn loader(&mut self, loader: impl Loader) -> &mut Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn action(&mut self, action: impl Action) -> &mut Self {
        self.action = Some(Arc::new(action));
        self
    }

    /// Boundary for unexpected errors.
    pub fn error_handler(&mut self, handler: impl BoundaryHandler) -> &mut Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Boundary for expected statuses (not found, forbidden, ...).
    pub fn status_handler(&mut self, handler: impl BoundaryHandler) -> &mut Self {
        self.status_handler = Some(Arc::new(handler));
        self
    }

    pub fn revalidation(&mut self, policy: impl RevalidationPolicy) -> &mut Self {
        self.revalidation = Some(Arc::new(policy));
        self
    }

    pub fn get_loader(&self) -> Option<&Arc<dyn Loader>> {
        self.loader.as_ref()
    }

    pub fn get_action(&self) -> Option<&Arc<dyn Action>> {
        self.action.as_ref()
    }

    /// Boundary responsible for `kind`, if this node declares one.
    pub fn boundary_for(&self, kind: &FailureKind) -> Option<&Arc<dyn BoundaryHandler>> {
        let handler = match kind {
            FailureKind::UnexpectedError => self.error_handler.as_ref(),
            FailureKind::ExpectedStatus { .. } => self.status_handler.as_ref(),
        };
        handler.filter(|h| h.handles(kind))
    }

    pub fn should_revalidate(&self, args: &RevalidationArgs) -> bool {
        self.revalidation
            .as_ref()
            .map_or(true, |policy| policy.should_revalidate(args))
    }
}

impl fmt::Debug for RouteHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandlers")
            .field("loader", &self.loader.is_some())
            .field("action", &self.action.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("status_handler", &self.status_handler.is_some())
            .field("revalidation", &self.revalidation.is_some())
            .finish()
    }
}

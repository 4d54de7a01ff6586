//! Route engine subsystem.
//!
//! # Data Flow
//! ```text
//! RouteRequest
//!     → routing::match_path (MatchedChain or NoMatch)
//!     → read:  loader.rs  (one task per node, shallowest redirect wins)
//!       write: action.rs  (leaf action, then revalidation through loader.rs)
//!     → boundary.rs (failures bubble to the nearest capable ancestor)
//!     → response.rs (RouteResponse) or error.rs (EngineError)
//!
//! Per session (session.rs):
//!     newer request → older ticket superseded → work dropped, 409
//! ```
//!
//! # Design Decisions
//! - The route tree is shared read-only and swapped atomically on reload
//! - Per-request state (chain, results) never leaves the request
//! - Redirects and expected statuses are values, not panics or errors

pub mod action;
pub mod boundary;
pub mod error;
pub mod loader;
pub mod outcome;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod session;

pub use action::{ActionDispatcher, ActionOutcome, RevalidationSet};
pub use boundary::{BoundaryResolver, RenderTarget, Settlement, Unhandled};
pub use error::EngineError;
pub use loader::{LoadResults, LoaderOrchestrator, LoaderOutcome};
pub use outcome::{ControlSignal, FailureKind, LoadResult, RouteFailure};
pub use pipeline::{Engine, EngineSettings};
pub use request::{Environment, FormData, RequestMethod, RouteRequest};
pub use response::{RenderPayload, RouteResponse};
pub use session::{NavigationTicket, SessionTracker};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Capability invocation (loader / action):
//!     → timeouts.rs (enforce per-capability deadline)
//!     → panic isolation (a panicking capability becomes a failure)
//!     → LoadResult handed back to the engine
//! ```
//!
//! # Design Decisions
//! - Every capability call can carry a deadline
//! - A misbehaving capability fails its own request only, never the process
//! - Timeouts and panics surface as unexpected failures, routed to boundaries

pub mod timeouts;

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup / reload):
//!     RouteDescriptor[] + HandlerRegistry
//!     → tree.rs (validate, build arena, sort children)
//!     → Freeze as immutable RouteTree
//!
//! Incoming Request (path)
//!     → matcher.rs (depth-first walk, literals before parameters)
//!     → Return: MatchedChain (root → leaf, with bindings) or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - No regex: segments are literals, `$name` parameters or a `$` splat
//! - Deterministic: same input always matches the same chain
//! - Explicit NoMatch rather than silent default

pub mod matcher;
pub mod segment;
pub mod tree;

pub use matcher::{match_path, MatchedChain, NoMatch, RouteMatch};
pub use segment::Segment;
pub use tree::{RouteDescriptor, RouteId, RouteNode, RouteTree, TreeError, TreeIssue};

//! Nested route resolution and data orchestration.
//!
//! A request path is matched against a tree of route segments; every
//! matched segment's loader runs concurrently, submissions go to the
//! leaf's action followed by a revalidation pass, and failures bubble to
//! the nearest segment declaring a boundary for them.

pub mod config;
pub mod demo;
pub mod engine;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::RouterConfig;
pub use engine::{Engine, EngineError, LoadResult, RouteRequest, RouteResponse};
pub use handler::HandlerRegistry;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{RouteDescriptor, RouteTree};

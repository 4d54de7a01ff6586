//! Demo application served by the binary when no route table is configured.
//!
//! # Data Flow
//! ```text
//! demo_routes()            → RouteDescriptor table
//! register(registry, ...)  → loaders, actions and boundaries per route id
//! PostStore                → in-memory posts shared by every capability
//! ```

pub mod blog;

pub use blog::{demo_routes, register, Post, PostStore, ADMIN_HEADER};

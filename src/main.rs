//! Nested Router
//!
//! Serves a route tree over HTTP with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (axum, request id, body limit, form decoding)
//!                         │
//!                         ▼
//!                     routing::match_path ──▶ NoMatch → 404
//!                         │
//!                         ▼ MatchedChain
//!            ┌────────────┴─────────────┐
//!            ▼ read                     ▼ write
//!     engine::loader               engine::action
//!     (one task per node)          (leaf action, then revalidation)
//!            └────────────┬─────────────┘
//!                         ▼
//!                  engine::boundary (failures bubble up)
//!                         │
//!     Client Response     ▼
//!     ◀────────────── redirect | JSON render | error status
//!
//!     Cross-cutting: config (+ hot reload), observability, lifecycle, resilience
//! ```
//!
//! Without `--config` (or with a config that declares no routes) the demo
//! blog is served.

use clap::Parser;
use std::path::PathBuf;

use nested_router::config::{load_config, RouterConfig};
use nested_router::demo::{self, PostStore};
use nested_router::handler::HandlerRegistry;
use nested_router::lifecycle::startup;

#[derive(Parser)]
#[command(name = "nested-router")]
#[command(about = "Nested route resolution and data orchestration server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if config.routes.is_empty() {
        config.routes = demo::demo_routes();
    }

    let mut registry = HandlerRegistry::new();
    demo::register(&mut registry, PostStore::seeded());

    startup::run(config, registry, cli.config.as_deref()).await
}

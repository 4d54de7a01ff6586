//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from configuration
//! - Build the HTTP host and its route tree
//! - Start the config watcher when a config file is in use
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;

use crate::config::{ConfigWatcher, RouterConfig};
use crate::handler::HandlerRegistry;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

/// Start the router and serve until SIGINT/SIGTERM.
pub async fn run(
    config: RouterConfig,
    registry: HandlerRegistry,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        loader_timeout_ms = config.timeouts.loader_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must stay alive for as long as the server runs.
    let (_watcher, updates) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), Some(updates))
        }
        None => (None, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, registry)?;

    let shutdown = Shutdown::new();
    let on_stop = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    server.run(listener, updates, on_stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

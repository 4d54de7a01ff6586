//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all engine handler
//! - Wire up middleware (tracing, timeout, request ID, security headers)
//! - Bind server to listener
//! - Dispatch requests to the route engine
//! - Rebuild and swap the route tree on configuration updates

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RouterConfig;
use crate::engine::{Engine, EngineSettings};
use crate::handler::HandlerRegistry;
use crate::http::request::{into_route_request, request_id_header, MakeRequestUuid};
use crate::observability::spans::request_span;
use crate::routing::{RouteTree, TreeError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub max_body_bytes: usize,
    pub session_header: Arc<str>,
}

/// HTTP host for the route engine.
pub struct HttpServer {
    router: Router,
    engine: Engine,
    registry: Arc<HandlerRegistry>,
    config: RouterConfig,
}

impl HttpServer {
    /// Build the route tree from `config.routes` and the registered handlers.
    pub fn new(config: RouterConfig, registry: HandlerRegistry) -> Result<Self, TreeError> {
        let tree = RouteTree::build(&config.routes, &registry)?;
        let engine = Engine::new(
            tree,
            EngineSettings::from(&config),
            config.environment.clone(),
        );

        let state = AppState {
            engine: engine.clone(),
            max_body_bytes: config.limits.max_body_bytes,
            session_header: config.engine.session_header.to_ascii_lowercase().into(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            engine,
            registry: Arc::new(registry),
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RouterConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(route_handler))
            .route("/", any(route_handler))
            .with_state(state);

        if config.security.enable_headers {
            router = router
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ));
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    request_span(request)
                }))
                .layer(PropagateRequestIdLayer::new(request_id_header()))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `updates` replace the route tree; a route
    /// table that fails to build is logged and the current tree kept. An
    /// update without routes restores the table the server started with.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: Option<mpsc::UnboundedReceiver<RouterConfig>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.engine.tree().len(),
            "HTTP server starting"
        );

        if let Some(mut updates) = updates {
            let engine = self.engine.clone();
            let registry = self.registry.clone();
            let host_routes = self.config.routes.clone();
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    // A config without routes leaves the table to the host.
                    let routes = if config.routes.is_empty() {
                        &host_routes
                    } else {
                        &config.routes
                    };
                    match RouteTree::build(routes, &registry) {
                        Ok(tree) => engine.replace_tree(tree),
                        Err(e) => tracing::error!(
                            error = %e,
                            "Rejected reloaded route table, keeping current tree"
                        ),
                    }
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

/// Catch-all handler: every path goes through the engine.
async fn route_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let route_request =
        match into_route_request(request, state.max_body_bytes, &state.session_header).await {
            Ok(route_request) => route_request,
            Err(status) => {
                tracing::warn!(status = status.as_u16(), "Rejected request body");
                return (
                    status,
                    Json(json!({ "status": status.as_u16(), "error": "request body rejected" })),
                )
                    .into_response();
            }
        };

    let request_id = route_request.request_id().to_string();
    match state.engine.handle(route_request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            if e.status() == StatusCode::INTERNAL_SERVER_ERROR.as_u16() {
                tracing::error!(request_id = %request_id, error = %e, "Unhandled route failure");
            } else {
                tracing::debug!(request_id = %request_id, error = %e, "Request not rendered");
            }
            e.into_response()
        }
    }
}

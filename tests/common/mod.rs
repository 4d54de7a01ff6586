//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use nested_router::config::RouterConfig;
use nested_router::demo::{self, PostStore};
use nested_router::engine::{Engine, EngineSettings};
use nested_router::handler::HandlerRegistry;
use nested_router::http::HttpServer;
use nested_router::lifecycle::Shutdown;
use nested_router::routing::{RouteDescriptor, RouteTree};

/// Admin token of the demo blog with the default environment.
pub const ADMIN_TOKEN: &str = "letmein";

/// Engine over `routes` with default settings.
pub fn engine(routes: &[RouteDescriptor], registry: &HandlerRegistry) -> Engine {
    let tree = RouteTree::build(routes, registry).expect("valid route table");
    Engine::new(tree, EngineSettings::default(), Default::default())
}

/// Engine serving the demo blog, with its store.
pub fn demo_engine() -> (Engine, PostStore) {
    let store = PostStore::seeded();
    let mut registry = HandlerRegistry::new();
    demo::register(&mut registry, store.clone());
    (engine(&demo::demo_routes(), &registry), store)
}

/// A running HTTP server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<RouterConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Bind 127.0.0.1:0 and serve `config` with `registry`.
pub async fn start_server(mut config: RouterConfig, registry: HandlerRegistry) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, registry).expect("valid route table");
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, Some(config_updates), server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        shutdown,
        updates,
    }
}

/// Demo blog server.
pub async fn start_demo_server() -> (TestServer, PostStore) {
    let store = PostStore::seeded();
    let mut registry = HandlerRegistry::new();
    demo::register(&mut registry, store.clone());

    let mut config = RouterConfig::default();
    config.routes = demo::demo_routes();
    (start_server(config, registry).await, store)
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

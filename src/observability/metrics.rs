//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (requests, loader latency, boundaries, actions)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by method, outcome
//! - `router_request_duration_seconds` (histogram): latency by method
//! - `router_loader_duration_seconds` (histogram): loader latency by route
//! - `router_boundary_total` (counter): boundaries selected by route, kind
//! - `router_actions_total` (counter): actions by route, outcome
//!
//! # Design Decisions
//! - Recording before `init_metrics` is a no-op
//! - Labels are route ids and fixed outcome names, never raw paths

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::engine::FailureKind;
use crate::routing::RouteId;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &'static str, outcome: &'static str, started: Instant) {
    metrics::counter!("router_requests_total", "method" => method, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("router_request_duration_seconds", "method" => method)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_loader(route: &RouteId, started: Instant) {
    metrics::histogram!("router_loader_duration_seconds", "route" => route.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_boundary(route: &RouteId, kind: &FailureKind) {
    metrics::counter!(
        "router_boundary_total",
        "route" => route.to_string(),
        "kind" => kind.label()
    )
    .increment(1);
}

pub fn record_action(route: &RouteId, outcome: &'static str) {
    metrics::counter!("router_actions_total", "route" => route.to_string(), "outcome" => outcome)
        .increment(1);
}

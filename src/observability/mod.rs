//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → spans.rs (per-request spans carrying the request id)
//!
//! Consumers:
//!     → Log output (stdout, pretty or compact)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (request_id, route, path) on every event
//! - Request ID flows from the HTTP layer into every capability
//! - Metrics are cheap and no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
pub mod spans;

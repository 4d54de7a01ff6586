//! Timeout enforcement for route capabilities.
//!
//! # Responsibilities
//! - Wrap loader and action futures with a deadline
//! - Convert panics inside a capability, sync or async, into failures
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - `None` means no deadline
//! - Timed-out capabilities are dropped, which cancels their work

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::engine::outcome::{LoadResult, RouteFailure};

/// Run a capability future under an optional deadline, isolating panics.
pub async fn guard_capability<F>(deadline: Option<Duration>, future: F) -> LoadResult
where
    F: Future<Output = LoadResult>,
{
    let guarded = AssertUnwindSafe(future).catch_unwind();
    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return LoadResult::Failure(RouteFailure::new(format!(
                    "timed out after {}ms",
                    limit.as_millis()
                )))
            }
        },
        None => guarded.await,
    };

    outcome.unwrap_or_else(|panic| LoadResult::Failure(panic_failure(panic.as_ref())))
}

/// Run a synchronous capability, turning a panic into a failure.
pub fn guard_sync<T>(capability: impl FnOnce() -> T) -> Result<T, RouteFailure> {
    std::panic::catch_unwind(AssertUnwindSafe(capability))
        .map_err(|panic| panic_failure(panic.as_ref()))
}

fn panic_failure(panic: &(dyn Any + Send)) -> RouteFailure {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "capability panicked".to_string());
    RouteFailure::new(message)
}

/// Convert a configured millisecond value into a deadline; zero disables it.
pub fn deadline_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

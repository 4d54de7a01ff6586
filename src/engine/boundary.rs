//! Boundary resolution.
//!
//! # Responsibilities
//! - Find the nearest node, starting at the failing one, whose boundary
//!   handles the failure class
//! - Discard every node below the selected boundary from the output
//! - Keep the successful ancestors above the boundary
//!
//! # Design Decisions
//! - Unexpected errors go to `error_handler`, expected statuses to
//!   `status_handler`; there is no cross-class fallback
//! - With no capable ancestor the failure is unhandled and left to the host
//! - If a node above the chosen boundary also failed, resolution restarts
//!   from that node so the rendered ancestors are always successful
//! - A failure of the boundary node's own loader is only logged at debug
//!   level: the boundary renders in place of its own data as well

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::engine::loader::LoadResults;
use crate::engine::outcome::FailureKind;
use crate::handler::BoundaryContext;
use crate::observability::metrics;
use crate::resilience::timeouts::guard_sync;
use crate::routing::{MatchedChain, RouteId};

/// Boundary selected to render in place of a failed subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTarget {
    /// Node whose boundary renders.
    pub route: RouteId,
    /// Node that raised the failure.
    pub failed_route: RouteId,
    #[serde(flatten)]
    pub kind: FailureKind,
    /// Nodes removed from the output, root first.
    pub discarded: Vec<RouteId>,
    /// Output of the boundary handler.
    pub rendered: Value,
    #[serde(skip)]
    pub depth: usize,
}

/// No node between the failing one and the root handles the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no boundary handles {kind} raised by route {route}")]
pub struct Unhandled {
    pub route: RouteId,
    pub kind: FailureKind,
}

/// Result of settling a loader pass that contains failures.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub data: BTreeMap<RouteId, Value>,
    pub boundary: Option<RenderTarget>,
}

/// Walks failures up the chain to the nearest capable boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryResolver;

impl BoundaryResolver {
    /// Pick the boundary for a failure raised at `failing`.
    ///
    /// A boundary that panics while rendering raises an unexpected error of
    /// its own, which goes to the boundaries above it.
    pub fn resolve(
        chain: &MatchedChain<'_>,
        failing: usize,
        kind: FailureKind,
        payload: Value,
    ) -> Result<RenderTarget, Unhandled> {
        let failed = chain
            .get(failing)
            .map(|m| m.id().clone())
            .unwrap_or_else(|| chain.leaf().id().clone());
        let mut kind = kind;
        let mut payload = payload;

        for depth in (0..=failing.min(chain.len() - 1)).rev() {
            let Some(matched) = chain.get(depth) else { continue };
            let Some(handler) = matched.node().handlers().boundary_for(&kind) else {
                continue;
            };

            let context = BoundaryContext {
                route: matched.id().clone(),
                failed_route: failed.clone(),
                kind,
                payload: payload.clone(),
                path: chain.path().to_string(),
            };
            let rendered = match guard_sync(|| handler.render(&context)) {
                Ok(rendered) => rendered,
                Err(failure) => {
                    tracing::error!(
                        boundary = %matched.id(),
                        error = %failure,
                        "Boundary failed to render"
                    );
                    kind = FailureKind::UnexpectedError;
                    payload = json!({ "message": failure.message() });
                    continue;
                }
            };
            let discarded = chain.iter().skip(depth + 1).map(|m| m.id().clone()).collect();

            tracing::debug!(
                boundary = %matched.id(),
                failed = %failed,
                kind = %kind,
                "Boundary selected"
            );
            metrics::record_boundary(matched.id(), &kind);

            return Ok(RenderTarget {
                route: matched.id().clone(),
                failed_route: failed,
                kind,
                discarded,
                rendered,
                depth,
            });
        }

        tracing::warn!(failed = %failed, kind = %kind, "No boundary handles failure");
        Err(Unhandled {
            route: failed,
            kind,
        })
    }

    /// Settle a complete loader pass.
    ///
    /// Without failures every success payload is kept. Otherwise the
    /// deepest failure is resolved, then any failure above the selected
    /// boundary, until only successful ancestors remain.
    pub fn settle(chain: &MatchedChain<'_>, results: &LoadResults) -> Result<Settlement, Unhandled> {
        let mut limit = chain.len();
        let mut boundary: Option<RenderTarget> = None;

        while let Some((position, kind, payload)) = results.deepest_failure(limit) {
            let target = Self::resolve(chain, position, kind, payload)?;
            limit = target.depth;
            if let Some((own, _)) = results.failure_at(limit) {
                if limit != position {
                    tracing::debug!(
                        boundary = %target.route,
                        kind = %own,
                        "Boundary's own loader failure replaced by its render"
                    );
                }
            }
            boundary = Some(target);
        }

        Ok(Settlement {
            data: results.data_above(limit),
            boundary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::{LoaderOrchestrator, LoaderOutcome};
    use crate::engine::outcome::LoadResult;
    use crate::engine::request::RouteRequest;
    use crate::handler::{HandlerRegistry, LoaderArgs};
    use crate::routing::{match_path, RouteDescriptor, RouteTree};
    use serde_json::json;
    use std::sync::Arc;

    fn routes() -> Vec<RouteDescriptor> {
        vec![
            RouteDescriptor::root("a"),
            RouteDescriptor::new("b", "a", "b"),
            RouteDescriptor::new("c", "b", "c"),
            RouteDescriptor::new("d", "c", "d"),
        ]
    }

    async fn settle(registry: &HandlerRegistry, path: &str) -> Result<Settlement, Unhandled> {
        let tree = RouteTree::build(&routes(), registry).unwrap();
        let chain = match_path(&tree, path).unwrap();
        let request = Arc::new(RouteRequest::read(path));
        match LoaderOrchestrator::default().load(&chain, &request).await {
            LoaderOutcome::Settled(results) => BoundaryResolver::settle(&chain, &results),
            LoaderOutcome::Redirect { .. } => panic!("unexpected redirect"),
        }
    }

    #[tokio::test]
    async fn test_bubbles_to_nearest_error_handler() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("a")
            .loader(|_: LoaderArgs| async { LoadResult::json(json!("a-data")) });
        registry
            .route("b")
            .loader(|_: LoaderArgs| async { LoadResult::json(json!("b-data")) })
            .error_handler(|ctx: &BoundaryContext| json!({"caught": ctx.payload["message"]}));
        registry
            .route("c")
            .loader(|_: LoaderArgs| async { LoadResult::fail("c broke") });

        let settlement = settle(&registry, "/b/c").await.unwrap();
        let target = settlement.boundary.unwrap();
        assert_eq!(target.route.as_str(), "b");
        assert_eq!(target.failed_route.as_str(), "c");
        assert_eq!(target.discarded, vec![RouteId::from("c")]);
        assert_eq!(target.rendered, json!({"caught": "c broke"}));
        // only ancestors above the boundary keep their data
        assert_eq!(settlement.data.len(), 1);
        assert_eq!(settlement.data[&RouteId::from("a")], json!("a-data"));
    }

    #[tokio::test]
    async fn test_panicking_boundary_bubbles_as_error() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("a")
            .error_handler(|ctx: &BoundaryContext| json!({"root": ctx.payload["message"]}));
        registry
            .route("b")
            .status_handler(|ctx: &BoundaryContext| -> Value {
                panic!("cannot render {}", ctx.kind)
            });
        registry
            .route("c")
            .loader(|_: LoaderArgs| async { LoadResult::status(404) });

        let settlement = settle(&registry, "/b/c").await.unwrap();
        let target = settlement.boundary.unwrap();
        assert_eq!(target.route.as_str(), "a");
        assert_eq!(target.failed_route.as_str(), "c");
        assert_eq!(target.kind, FailureKind::UnexpectedError);
        assert_eq!(target.rendered, json!({"root": "cannot render status 404"}));
        assert!(settlement.data.is_empty());
    }

    #[tokio::test]
    async fn test_boundary_with_failed_loader_still_renders() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("a")
            .loader(|_: LoaderArgs| async { LoadResult::json(json!("a-data")) });
        registry
            .route("b")
            .loader(|_: LoaderArgs| async { LoadResult::status(404) })
            .error_handler(|_: &BoundaryContext| json!("b boundary"));
        registry
            .route("c")
            .loader(|_: LoaderArgs| async { LoadResult::fail("c broke") });

        let settlement = settle(&registry, "/b/c").await.unwrap();
        let target = settlement.boundary.unwrap();
        assert_eq!(target.route.as_str(), "b");
        assert_eq!(target.kind, FailureKind::UnexpectedError);
        assert_eq!(target.rendered, json!("b boundary"));
        assert_eq!(settlement.data.len(), 1);
        assert!(settlement.data.contains_key("a"));
    }

    #[tokio::test]
    async fn test_failing_node_can_be_its_own_boundary() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("c")
            .loader(|_: LoaderArgs| async { LoadResult::status(404) })
            .status_handler(|ctx: &BoundaryContext| json!({"status": ctx.kind.status()}));

        let settlement = settle(&registry, "/b/c/d").await.unwrap();
        let target = settlement.boundary.unwrap();
        assert_eq!(target.route.as_str(), "c");
        assert_eq!(target.discarded, vec![RouteId::from("d")]);
        assert_eq!(target.kind, FailureKind::ExpectedStatus { status: 404 });
        assert_eq!(
            settlement.data.keys().map(RouteId::as_str).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn test_handler_class_must_match() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("b")
            .status_handler(|_: &BoundaryContext| json!("status"));
        registry
            .route("a")
            .error_handler(|_: &BoundaryContext| json!("root error"));
        registry
            .route("c")
            .loader(|_: LoaderArgs| async { LoadResult::fail("boom") });

        let target = settle(&registry, "/b/c").await.unwrap().boundary.unwrap();
        assert_eq!(target.route.as_str(), "a");
        assert_eq!(
            target.discarded,
            vec![RouteId::from("b"), RouteId::from("c")]
        );
    }

    #[tokio::test]
    async fn test_unhandled_failure() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("c")
            .loader(|_: LoaderArgs| async { LoadResult::status(403) });

        let err = settle(&registry, "/b/c").await.unwrap_err();
        assert_eq!(err.route.as_str(), "c");
        assert_eq!(err.kind, FailureKind::ExpectedStatus { status: 403 });
    }

    #[tokio::test]
    async fn test_failure_above_boundary_restarts_resolution() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("a")
            .error_handler(|_: &BoundaryContext| json!("root boundary"));
        registry
            .route("b")
            .loader(|_: LoaderArgs| async { LoadResult::fail("b broke") });
        registry
            .route("c")
            .error_handler(|_: &BoundaryContext| json!("c boundary"));
        registry
            .route("d")
            .loader(|_: LoaderArgs| async { LoadResult::fail("d broke") });

        let settlement = settle(&registry, "/b/c/d").await.unwrap();
        let target = settlement.boundary.unwrap();
        assert_eq!(target.route.as_str(), "a");
        assert_eq!(target.failed_route.as_str(), "b");
        assert!(settlement.data.is_empty());
    }

    #[tokio::test]
    async fn test_no_failures_keeps_everything() {
        let settlement = settle(&HandlerRegistry::new(), "/b/c/d").await.unwrap();
        assert!(settlement.boundary.is_none());
        assert_eq!(settlement.data.len(), 4);
    }

    #[test]
    fn test_render_target_serialization() {
        let target = RenderTarget {
            route: "b".into(),
            failed_route: "c".into(),
            kind: FailureKind::ExpectedStatus { status: 404 },
            discarded: vec!["c".into()],
            rendered: json!("missing"),
            depth: 1,
        };
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({
                "route": "b",
                "failedRoute": "c",
                "kind": "expected_status",
                "status": 404,
                "discarded": ["c"],
                "rendered": "missing"
            })
        );
    }
}

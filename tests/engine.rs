//! Engine-level scenarios: matching, loading, actions and boundaries.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nested_router::engine::{
    EngineError, FailureKind, FormData, LoadResult, RouteRequest, RouteResponse,
};
use nested_router::handler::{ActionArgs, BoundaryContext, HandlerRegistry, LoaderArgs};
use nested_router::routing::{match_path, RouteDescriptor, RouteId, RouteTree};

mod common;

fn chain_routes() -> Vec<RouteDescriptor> {
    vec![
        RouteDescriptor::root("a"),
        RouteDescriptor::new("b", "a", "b"),
        RouteDescriptor::new("c", "b", "c"),
    ]
}

fn render(response: RouteResponse) -> nested_router::engine::RenderPayload {
    match response {
        RouteResponse::Render(payload) => payload,
        other => panic!("expected render, got {:?}", other),
    }
}

#[tokio::test]
async fn test_admin_redirect_wins_over_child_success() {
    let (engine, _) = common::demo_engine();

    let response = engine
        .handle(RouteRequest::read("/posts/admin/hello-world"))
        .await
        .unwrap();
    assert_eq!(
        response,
        RouteResponse::Redirect {
            status: 302,
            location: "/login".to_string()
        }
    );
}

#[tokio::test]
async fn test_admin_chain_renders_with_token() {
    let (engine, _) = common::demo_engine();

    let response = engine
        .handle(
            RouteRequest::read("/posts/admin/hello-world")
                .with_header("x-admin", common::ADMIN_TOKEN),
        )
        .await
        .unwrap();
    let payload = render(response);
    assert_eq!(
        payload.matches,
        vec![
            RouteId::from("root"),
            RouteId::from("posts"),
            RouteId::from("posts.admin"),
            RouteId::from("posts.admin.$slug"),
        ]
    );
    assert_eq!(
        payload.loader_data[&RouteId::from("posts.admin.$slug")]["post"]["title"],
        "Hello, world"
    );
    assert_eq!(payload.loader_data[&RouteId::from("root")]["admin"], true);
}

#[tokio::test]
async fn test_static_segment_outranks_dynamic_sibling() {
    let (engine, _) = common::demo_engine();
    let tree = engine.tree();

    let chain = match_path(&tree, "/posts/new").unwrap();
    assert_eq!(chain.leaf().id().as_str(), "posts.new");
    assert!(chain.params().is_empty());
}

#[tokio::test]
async fn test_every_loader_invoked_once_per_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    for id in ["a", "b", "c"] {
        let calls = calls.clone();
        registry.route(id).loader(move |args: LoaderArgs| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { LoadResult::json(json!(args.route().as_str())) }
        });
    }
    let engine = common::engine(&chain_routes(), &registry);

    let first = render(engine.handle(RouteRequest::read("/b/c")).await.unwrap());
    let second = render(engine.handle(RouteRequest::read("/b/c")).await.unwrap());

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(first.loader_data, second.loader_data);
    assert_eq!(first.loader_data[&RouteId::from("b")], json!("b"));
}

#[tokio::test]
async fn test_root_redirect_beats_leaf_failure() {
    let mut registry = HandlerRegistry::new();
    registry.route("a").loader(|_: LoaderArgs| async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        LoadResult::redirect("/elsewhere")
    });
    registry
        .route("c")
        .loader(|_: LoaderArgs| async { LoadResult::fail("leaf broke") });
    let engine = common::engine(&chain_routes(), &registry);

    let response = engine.handle(RouteRequest::read("/b/c")).await.unwrap();
    assert_eq!(
        response,
        RouteResponse::Redirect {
            status: 302,
            location: "/elsewhere".to_string()
        }
    );
}

#[tokio::test]
async fn test_boundary_bubbling() {
    let mut registry = HandlerRegistry::new();
    registry
        .route("a")
        .loader(|_: LoaderArgs| async { LoadResult::json(json!({"layout": true})) });
    registry
        .route("b")
        .loader(|_: LoaderArgs| async { LoadResult::json(json!({"section": true})) })
        .error_handler(|ctx: &BoundaryContext| {
            json!({"error": ctx.payload["message"], "failed": ctx.failed_route})
        });
    registry
        .route("c")
        .loader(|_: LoaderArgs| async { LoadResult::fail("c exploded") });
    let engine = common::engine(&chain_routes(), &registry);

    let payload = render(engine.handle(RouteRequest::read("/b/c")).await.unwrap());
    assert_eq!(payload.status, 500);

    let boundary = payload.boundary.unwrap();
    assert_eq!(boundary.route.as_str(), "b");
    assert_eq!(boundary.kind, FailureKind::UnexpectedError);
    assert_eq!(boundary.discarded, vec![RouteId::from("c")]);
    assert_eq!(boundary.rendered, json!({"error": "c exploded", "failed": "c"}));

    // the boundary node's own data is replaced, only A survives
    assert_eq!(payload.loader_data.len(), 1);
    assert_eq!(payload.loader_data[&RouteId::from("a")], json!({"layout": true}));
}

#[tokio::test]
async fn test_not_found_post_uses_status_boundary() {
    let (engine, _) = common::demo_engine();

    let payload = render(engine.handle(RouteRequest::read("/posts/missing")).await.unwrap());
    assert_eq!(payload.status, 404);
    let boundary = payload.boundary.unwrap();
    assert_eq!(boundary.route.as_str(), "posts.$slug");
    assert_eq!(boundary.rendered, json!({"missing": "missing"}));
    assert!(payload.loader_data.contains_key(&RouteId::from("posts")));
}

#[tokio::test]
async fn test_successful_action_revalidates_full_chain() {
    let loads = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    for id in ["a", "b", "c"] {
        let loads = loads.clone();
        registry.route(id).loader(move |_: LoaderArgs| {
            loads.fetch_add(1, Ordering::SeqCst);
            async { LoadResult::empty() }
        });
    }
    registry
        .route("c")
        .action(|args: ActionArgs| async move { LoadResult::json(json!({"intent": args.intent()})) });
    let engine = common::engine(&chain_routes(), &registry);

    let response = engine
        .handle(RouteRequest::write("/b/c", FormData::new().with("intent", "update")))
        .await
        .unwrap();
    let payload = render(response);

    assert_eq!(loads.load(Ordering::SeqCst), 3);
    assert_eq!(payload.action_data, Some(json!({"intent": "update"})));
    assert_eq!(payload.loader_data.len(), 3);
}

#[tokio::test]
async fn test_failed_action_triggers_no_revalidation() {
    let loads = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    for id in ["a", "b", "c"] {
        let loads = loads.clone();
        registry.route(id).loader(move |_: LoaderArgs| {
            loads.fetch_add(1, Ordering::SeqCst);
            async { LoadResult::empty() }
        });
    }
    registry
        .route("a")
        .error_handler(|_: &BoundaryContext| json!("root boundary"));
    registry
        .route("c")
        .action(|_: ActionArgs| async { LoadResult::fail("write rejected") });
    let engine = common::engine(&chain_routes(), &registry);

    let payload = render(
        engine
            .handle(RouteRequest::write("/b/c", FormData::new()))
            .await
            .unwrap(),
    );

    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert_eq!(payload.boundary.unwrap().route.as_str(), "a");
}

#[tokio::test]
async fn test_demo_update_then_read_sees_mutation() {
    let (engine, store) = common::demo_engine();

    let response = engine
        .handle(
            RouteRequest::write(
                "/posts/admin/hello-world",
                FormData::new()
                    .with("intent", "update")
                    .with("title", "Hello again")
                    .with("markdown", "Edited."),
            )
            .with_header("x-admin", common::ADMIN_TOKEN),
        )
        .await
        .unwrap();
    let payload = render(response);

    assert_eq!(payload.action_data, Some(json!({"updated": "hello-world"})));
    // root opts out of revalidation
    assert_eq!(payload.skipped, vec![RouteId::from("root")]);
    assert_eq!(
        payload.loader_data[&RouteId::from("posts.admin.$slug")]["post"]["title"],
        "Hello again"
    );
    assert_eq!(store.get("hello-world").unwrap().title, "Hello again");
}

#[tokio::test]
async fn test_demo_create_and_delete() {
    let (engine, store) = common::demo_engine();

    let created = engine
        .handle(
            RouteRequest::write(
                "/posts/new",
                FormData::new()
                    .with("intent", "create")
                    .with("slug", "third")
                    .with("title", "Third")
                    .with("markdown", "Body"),
            )
            .with_header("x-admin", common::ADMIN_TOKEN),
        )
        .await
        .unwrap();
    assert_eq!(
        created,
        RouteResponse::Redirect {
            status: 302,
            location: "/posts/third".to_string()
        }
    );
    assert!(store.get("third").is_some());

    let deleted = engine
        .handle(
            RouteRequest::write("/posts/admin/third", FormData::new().with("intent", "delete"))
                .with_header("x-admin", common::ADMIN_TOKEN),
        )
        .await
        .unwrap();
    assert!(matches!(deleted, RouteResponse::Redirect { .. }));
    assert!(store.get("third").is_none());
}

#[tokio::test]
async fn test_demo_invalid_form_returns_errors() {
    let (engine, store) = common::demo_engine();

    let payload = render(
        engine
            .handle(
                RouteRequest::write("/posts/new", FormData::new().with("intent", "create"))
                    .with_header("x-admin", common::ADMIN_TOKEN),
            )
            .await
            .unwrap(),
    );
    let errors = &payload.action_data.unwrap()["errors"];
    assert_eq!(errors["title"], "required");
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_action_without_admin_redirects() {
    let (engine, store) = common::demo_engine();

    let response = engine
        .handle(RouteRequest::write(
            "/posts/admin/hello-world",
            FormData::new().with("intent", "delete"),
        ))
        .await
        .unwrap();
    assert!(matches!(response, RouteResponse::Redirect { .. }));
    assert!(store.get("hello-world").is_some());
}

#[tokio::test]
async fn test_unhandled_expected_status() {
    let mut registry = HandlerRegistry::new();
    registry
        .route("c")
        .loader(|_: LoaderArgs| async { LoadResult::status(403) });
    let engine = common::engine(&chain_routes(), &registry);

    let err = engine.handle(RouteRequest::read("/b/c")).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Unhandled {
            route: RouteId::from("c"),
            kind: FailureKind::ExpectedStatus { status: 403 },
        }
    );
}

#[tokio::test]
async fn test_environment_snapshot_reaches_loaders() {
    let mut registry = HandlerRegistry::new();
    registry.route("a").loader(|args: LoaderArgs| async move {
        LoadResult::json(json!(args.env().get("REGION")))
    });
    let tree = RouteTree::build(&chain_routes(), &registry).unwrap();
    let env = [("REGION".to_string(), "eu".to_string())].into_iter().collect();
    let engine = nested_router::Engine::new(tree, Default::default(), env);

    let payload = render(engine.handle(RouteRequest::read("/b")).await.unwrap());
    assert_eq!(payload.loader_data[&RouteId::from("a")], json!("eu"));
}

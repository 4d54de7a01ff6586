//! In-memory blog with a guarded admin area.
//!
//! ```text
//! /                      root → index
//! /login                 root → login
//! /posts                 root → posts → posts.index
//! /posts/new             root → posts → posts.new          (admin, create)
//! /posts/:slug           root → posts → posts.$slug
//! /posts/admin           root → posts → posts.admin → posts.admin.index
//! /posts/admin/:slug     root → posts → posts.admin → posts.admin.$slug (update, delete)
//! ```
//!
//! Every admin loader and action checks the admin header itself; a parent
//! loader's redirect does not protect its children.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::engine::{ControlSignal, Environment, LoadResult, RouteRequest};
use crate::handler::{
    ActionArgs, BoundaryContext, HandlerRegistry, LoaderArgs, OnlyStatuses, RevalidationArgs,
};
use crate::routing::RouteDescriptor;

/// Header that must carry the admin token.
pub const ADMIN_HEADER: &str = "x-admin";

const DEFAULT_ADMIN_TOKEN: &str = "letmein";
const DEFAULT_SITE_NAME: &str = "Nested Router";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub markdown: String,
}

/// Posts shared by every capability of the demo.
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    posts: Arc<DashMap<String, Post>>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding two sample posts.
    pub fn seeded() -> Self {
        let store = Self::new();
        store.put(Post {
            slug: "hello-world".to_string(),
            title: "Hello, world".to_string(),
            markdown: "# Hello\n\nFirst post.".to_string(),
        });
        store.put(Post {
            slug: "nested-routes".to_string(),
            title: "Nested routes".to_string(),
            markdown: "Every segment loads its own data.".to_string(),
        });
        store
    }

    pub fn get(&self, slug: &str) -> Option<Post> {
        self.posts.get(slug).map(|p| p.value().clone())
    }

    pub fn put(&self, post: Post) {
        self.posts.insert(post.slug.clone(), post);
    }

    pub fn remove(&self, slug: &str) -> Option<Post> {
        self.posts.remove(slug).map(|(_, post)| post)
    }

    /// Posts ordered by slug.
    pub fn list(&self) -> Vec<Post> {
        let mut posts: Vec<Post> = self.posts.iter().map(|p| p.value().clone()).collect();
        posts.sort_by(|a, b| a.slug.cmp(&b.slug));
        posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Route table of the demo.
pub fn demo_routes() -> Vec<RouteDescriptor> {
    vec![
        RouteDescriptor::root("root"),
        RouteDescriptor::index("index", "root"),
        RouteDescriptor::new("login", "root", "login"),
        RouteDescriptor::new("posts", "root", "posts"),
        RouteDescriptor::index("posts.index", "posts"),
        RouteDescriptor::new("posts.new", "posts", "new"),
        RouteDescriptor::new("posts.$slug", "posts", "$slug"),
        RouteDescriptor::new("posts.admin", "posts", "admin"),
        RouteDescriptor::index("posts.admin.index", "posts.admin"),
        RouteDescriptor::new("posts.admin.$slug", "posts.admin", "$slug"),
    ]
}

fn is_admin(request: &RouteRequest, env: &Environment) -> bool {
    let token = env.get("ADMIN_TOKEN").unwrap_or(DEFAULT_ADMIN_TOKEN);
    request.header(ADMIN_HEADER) == Some(token)
}

/// Redirect to the login page unless the request carries the admin token.
fn require_admin(request: &RouteRequest, env: &Environment) -> Option<LoadResult> {
    (!is_admin(request, env)).then(|| LoadResult::redirect("/login"))
}

fn summaries(store: &PostStore) -> Value {
    store
        .list()
        .into_iter()
        .map(|p| json!({ "slug": p.slug, "title": p.title }))
        .collect()
}

/// Field errors of a post form, empty when the form is valid.
fn validate_post(slug: &str, title: &str, markdown: &str) -> Map<String, Value> {
    let mut errors = Map::new();
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        errors.insert("slug".into(), json!("lowercase letters, digits and dashes"));
    }
    if title.trim().is_empty() {
        errors.insert("title".into(), json!("required"));
    }
    if markdown.trim().is_empty() {
        errors.insert("markdown".into(), json!("required"));
    }
    errors
}

/// Register the demo capabilities against [`demo_routes`].
pub fn register(registry: &mut HandlerRegistry, store: PostStore) {
    registry
        .route("root")
        .loader(|args: LoaderArgs| async move {
            let env = args.env();
            LoadResult::json(json!({
                "site": env.get("SITE_NAME").unwrap_or(DEFAULT_SITE_NAME),
                "admin": is_admin(args.request(), env),
            }))
        })
        .error_handler(|_: &BoundaryContext| json!({ "title": "Something went wrong" }))
        .status_handler(|ctx: &BoundaryContext| {
            json!({ "title": "Request failed", "status": ctx.kind.status() })
        })
        // site settings never change through a submission
        .revalidation(|_: &RevalidationArgs| false);

    registry.route("index").loader(|_: LoaderArgs| async {
        LoadResult::json(json!({ "links": ["/posts", "/posts/admin"] }))
    });

    registry.route("login").loader(|_: LoaderArgs| async {
        LoadResult::json(json!({ "hint": format!("send the {} header", ADMIN_HEADER) }))
    });

    let posts = store.clone();
    registry.route("posts").loader(move |_: LoaderArgs| {
        let posts = posts.clone();
        async move { LoadResult::json(json!({ "posts": summaries(&posts) })) }
    });

    registry.route("posts.index").loader(|_: LoaderArgs| async {
        LoadResult::json(json!({ "hint": "pick a post" }))
    });

    let posts = store.clone();
    registry
        .route("posts.$slug")
        .loader(move |args: LoaderArgs| {
            let posts = posts.clone();
            async move {
                let slug = args.param("slug").unwrap_or_default();
                match posts.get(slug) {
                    Some(post) => LoadResult::json(json!({ "post": post })),
                    None => LoadResult::Signal(
                        ControlSignal::not_found().with_body(json!({ "slug": slug })),
                    ),
                }
            }
        })
        .status_handler(OnlyStatuses::new([404], |ctx: &BoundaryContext| {
            json!({ "missing": ctx.payload["slug"] })
        }));

    register_new_post(registry, store.clone());
    register_admin(registry, store);
}

fn register_new_post(registry: &mut HandlerRegistry, store: PostStore) {
    registry
        .route("posts.new")
        .loader(|args: LoaderArgs| async move {
            require_admin(args.request(), args.env())
                .unwrap_or_else(|| LoadResult::json(json!({ "form": "new" })))
        })
        .action(move |args: ActionArgs| {
            let posts = store.clone();
            async move {
                if let Some(redirect) = require_admin(args.request(), args.env()) {
                    return redirect;
                }
                if args.intent() != Some("create") {
                    return LoadResult::Signal(
                        ControlSignal::status(400).with_body(json!({ "error": "unknown intent" })),
                    );
                }

                let form = args.submission();
                let slug = form.get("slug").unwrap_or_default();
                let title = form.get("title").unwrap_or_default();
                let markdown = form.get("markdown").unwrap_or_default();

                let mut errors = validate_post(slug, title, markdown);
                if posts.get(slug).is_some() {
                    errors.insert("slug".into(), json!("already taken"));
                }
                if !errors.is_empty() {
                    return LoadResult::json(json!({ "errors": errors }));
                }

                posts.put(Post {
                    slug: slug.to_string(),
                    title: title.to_string(),
                    markdown: markdown.to_string(),
                });
                tracing::info!(slug, "Post created");
                LoadResult::redirect(format!("/posts/{}", slug))
            }
        });
}

fn register_admin(registry: &mut HandlerRegistry, store: PostStore) {
    let posts = store.clone();
    registry
        .route("posts.admin")
        .loader(move |args: LoaderArgs| {
            let posts = posts.clone();
            async move {
                if let Some(redirect) = require_admin(args.request(), args.env()) {
                    return redirect;
                }
                LoadResult::json(json!({ "posts": summaries(&posts) }))
            }
        })
        .error_handler(|ctx: &BoundaryContext| {
            json!({ "adminError": ctx.payload["message"], "failed": ctx.failed_route })
        });

    registry
        .route("posts.admin.index")
        .loader(|args: LoaderArgs| async move {
            require_admin(args.request(), args.env())
                .unwrap_or_else(|| LoadResult::json(json!({ "hint": "pick a post to edit" })))
        });

    let posts = store.clone();
    registry
        .route("posts.admin.$slug")
        .loader(move |args: LoaderArgs| {
            let posts = posts.clone();
            async move {
                if let Some(redirect) = require_admin(args.request(), args.env()) {
                    return redirect;
                }
                let slug = args.param("slug").unwrap_or_default();
                match posts.get(slug) {
                    Some(post) => LoadResult::json(json!({ "post": post })),
                    None => LoadResult::status(404),
                }
            }
        })
        .action(move |args: ActionArgs| {
            let posts = store.clone();
            async move {
                if let Some(redirect) = require_admin(args.request(), args.env()) {
                    return redirect;
                }
                let slug = args.param("slug").unwrap_or_default().to_string();
                let Some(existing) = posts.get(&slug) else {
                    return LoadResult::status(404);
                };

                match args.intent() {
                    Some("delete") => {
                        posts.remove(&slug);
                        tracing::info!(slug = %slug, "Post deleted");
                        LoadResult::redirect("/posts/admin")
                    }
                    Some("update") => {
                        let form = args.submission();
                        let title = form.get("title").unwrap_or(existing.title.as_str());
                        let markdown = form.get("markdown").unwrap_or(existing.markdown.as_str());
                        let errors = validate_post(&slug, title, markdown);
                        if !errors.is_empty() {
                            return LoadResult::json(json!({ "errors": errors }));
                        }
                        posts.put(Post {
                            slug: slug.clone(),
                            title: title.to_string(),
                            markdown: markdown.to_string(),
                        });
                        tracing::info!(slug = %slug, "Post updated");
                        LoadResult::json(json!({ "updated": slug }))
                    }
                    _ => LoadResult::Signal(
                        ControlSignal::status(400).with_body(json!({ "error": "unknown intent" })),
                    ),
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteTree;

    #[test]
    fn test_demo_tree_builds() {
        let mut registry = HandlerRegistry::new();
        register(&mut registry, PostStore::seeded());
        let tree = RouteTree::build(&demo_routes(), &registry).unwrap();
        assert_eq!(tree.len(), demo_routes().len());
    }

    #[test]
    fn test_validate_post() {
        assert!(validate_post("ok-slug-1", "Title", "Body").is_empty());
        let errors = validate_post("Bad Slug", " ", "");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_store_lists_by_slug() {
        let store = PostStore::seeded();
        let slugs: Vec<_> = store.list().into_iter().map(|p| p.slug).collect();
        assert_eq!(slugs, vec!["hello-world", "nested-routes"]);
        assert!(store.remove("hello-world").is_some());
        assert_eq!(store.len(), 1);
    }
}

//! Handler registry keyed by route id.
//!
//! Route structure comes from declarative descriptors (usually the config
//! file); the code that backs each route is registered here under the same
//! id and attached when the tree is built.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = HandlerRegistry::new();
//! registry
//!     .route("posts.$slug")
//!     .loader(|args: LoaderArgs| async move { load_post(args).await })
//!     .status_handler(|ctx: &BoundaryContext| json!({"missing": ctx.path}));
//! ```

use std::collections::HashMap;

use super::RouteHandlers;
use crate::routing::RouteId;

/// Maps route ids to their capabilities.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    routes: HashMap<RouteId, RouteHandlers>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for `id`, created empty on first use.
    pub fn route(&mut self, id: impl Into<RouteId>) -> &mut RouteHandlers {
        self.routes.entry(id.into()).or_default()
    }

    pub fn get(&self, id: &str) -> Option<&RouteHandlers> {
        self.routes.get(id)
    }

    /// Registered route ids, sorted.
    pub fn ids(&self) -> Vec<&RouteId> {
        let mut ids: Vec<_> = self.routes.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::outcome::LoadResult;
    use crate::handler::LoaderArgs;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry
            .route("posts")
            .loader(|_: LoaderArgs| async { LoadResult::empty() });
        registry.route("root");

        assert_eq!(registry.len(), 2);
        assert!(registry.get("posts").unwrap().get_loader().is_some());
        assert!(registry.get("root").unwrap().get_loader().is_none());
        assert!(registry.get("missing").is_none());
        assert_eq!(
            registry.ids().iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            vec!["posts", "root"]
        );
    }
}

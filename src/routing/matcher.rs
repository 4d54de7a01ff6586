//! Path matching against the route tree.
//!
//! # Responsibilities
//! - Split the request path into segments
//! - Walk the tree depth-first, literal children before parameters
//! - Produce the root-to-leaf chain with parameter bindings
//!
//! # Design Decisions
//! - Pure function of (tree, path); no allocation in the tree
//! - Backtracking: a branch that cannot consume the full path is abandoned
//! - Index routes only match once the path is exhausted
//! - A layout without an index route ends the chain itself

use std::collections::BTreeMap;
use thiserror::Error;

use crate::routing::segment::{Segment, SPLAT};
use crate::routing::tree::{RouteId, RouteNode, RouteTree};

/// No leaf consumes the full path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no route matches {path}")]
pub struct NoMatch {
    pub path: String,
}

/// One node of a matched chain.
#[derive(Debug, Clone)]
pub struct RouteMatch<'t> {
    node: &'t RouteNode,
    bindings: BTreeMap<String, String>,
    pathname: String,
}

impl<'t> RouteMatch<'t> {
    pub fn node(&self) -> &'t RouteNode {
        self.node
    }

    pub fn id(&self) -> &'t RouteId {
        self.node.id()
    }

    /// Bindings contributed by this node's own segments.
    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    /// Portion of the path consumed up to and including this node.
    pub fn pathname(&self) -> &str {
        &self.pathname
    }
}

/// Ordered root-to-leaf list of matched nodes for one request.
#[derive(Debug, Clone)]
pub struct MatchedChain<'t> {
    path: String,
    matches: Vec<RouteMatch<'t>>,
}

impl<'t> MatchedChain<'t> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Always false: a chain contains at least the root.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&RouteMatch<'t>> {
        self.matches.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteMatch<'t>> {
        self.matches.iter()
    }

    /// Most specific matched node.
    pub fn leaf(&self) -> &RouteMatch<'t> {
        // a chain always holds the root
        &self.matches[self.matches.len() - 1]
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.matches.iter().position(|m| m.id().as_str() == id)
    }

    pub fn route_ids(&self) -> Vec<RouteId> {
        self.matches.iter().map(|m| m.id().clone()).collect()
    }

    /// Bindings of every node in the chain.
    pub fn params(&self) -> BTreeMap<String, String> {
        self.matches
            .iter()
            .flat_map(|m| m.bindings.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Match `path` against `tree`.
pub fn match_path<'t>(tree: &'t RouteTree, path: &str) -> Result<MatchedChain<'t>, NoMatch> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut matches = Vec::new();
    if walk(tree, tree.root_index(), &segments, 0, &mut matches) {
        tracing::trace!(path = %path, depth = matches.len(), "Path matched");
        Ok(MatchedChain {
            path: path.to_string(),
            matches,
        })
    } else {
        Err(NoMatch {
            path: path.to_string(),
        })
    }
}

fn walk<'t>(
    tree: &'t RouteTree,
    index: usize,
    segments: &[&str],
    position: usize,
    matches: &mut Vec<RouteMatch<'t>>,
) -> bool {
    let node = tree.node(index);
    let Some((bindings, consumed)) = consume(node.pattern(), &segments[position..]) else {
        return false;
    };
    let next = position + consumed;
    matches.push(RouteMatch {
        node,
        bindings,
        pathname: pathname(&segments[..next]),
    });

    if next == segments.len() {
        for &child in node.children() {
            let candidate = tree.node(child);
            if candidate.is_index() {
                matches.push(RouteMatch {
                    node: candidate,
                    bindings: BTreeMap::new(),
                    pathname: pathname(segments),
                });
                return true;
            }
        }
        // a pathless layout only helps if it leads to an index
        for &child in node.children() {
            if tree.node(child).is_pathless() && walk(tree, child, segments, next, matches) {
                return true;
            }
        }
        if !node.is_pathless() {
            return true;
        }
    } else {
        for &child in node.children() {
            if !tree.node(child).is_index() && walk(tree, child, segments, next, matches) {
                return true;
            }
        }
    }

    matches.pop();
    false
}

/// Consume `pattern` from the front of `rest`.
fn consume(pattern: &[Segment], rest: &[&str]) -> Option<(BTreeMap<String, String>, usize)> {
    let mut bindings = BTreeMap::new();
    for (i, segment) in pattern.iter().enumerate() {
        match segment {
            Segment::Literal(literal) => {
                if rest.get(i).copied()? != literal.as_str() {
                    return None;
                }
            }
            Segment::Dynamic(name) => {
                bindings.insert(name.clone(), rest.get(i)?.to_string());
            }
            Segment::Splat => {
                if i >= rest.len() {
                    return None;
                }
                bindings.insert(SPLAT.to_string(), rest[i..].join("/"));
                return Some((bindings, rest.len()));
            }
        }
    }
    Some((bindings, pattern.len()))
}

fn pathname(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

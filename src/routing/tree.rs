//! Route tree construction.
//!
//! # Responsibilities
//! - Validate the declarative route table
//! - Compile descriptors into an immutable arena of nodes
//! - Order children by match priority
//! - Attach registered capabilities to nodes
//!
//! # Design Decisions
//! - Immutable after construction (shared across requests without locks)
//! - Validation returns every issue, not just the first
//! - Declaration order is kept among children of equal priority

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;

use crate::handler::{HandlerRegistry, RouteHandlers};
use crate::routing::segment::{compare_patterns, parse_pattern, Segment, SegmentError, SegmentRank};

/// Stable identifier of a route node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RouteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for RouteId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Declarative description of one route node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteDescriptor {
    pub id: RouteId,

    /// Parent route id. Exactly one descriptor (the root) has none.
    #[serde(default)]
    pub parent: Option<RouteId>,

    /// Segments this node consumes, e.g. `posts/$slug`. Empty for index
    /// routes and pathless layouts.
    #[serde(default)]
    pub path: String,

    /// Index routes match only when the parent consumed the whole path.
    #[serde(default)]
    pub index: bool,
}

impl RouteDescriptor {
    pub fn root(id: impl Into<RouteId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            path: String::new(),
            index: false,
        }
    }

    pub fn new(id: impl Into<RouteId>, parent: impl Into<RouteId>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
            path: path.into(),
            index: false,
        }
    }

    pub fn index(id: impl Into<RouteId>, parent: impl Into<RouteId>) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
            path: String::new(),
            index: true,
        }
    }
}

/// A single problem found in a route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeIssue {
    #[error("route table has no root route")]
    NoRoot,

    #[error("route table has several root routes: {}", join(.0))]
    MultipleRoots(Vec<RouteId>),

    #[error("duplicate route id {0}")]
    DuplicateId(RouteId),

    #[error("route {id} names unknown parent {parent}")]
    UnknownParent { id: RouteId, parent: RouteId },

    #[error("route {0} is not reachable from the root")]
    Unreachable(RouteId),

    #[error("route {id} has an invalid path: {source}")]
    InvalidPath { id: RouteId, source: SegmentError },

    #[error("index route {0} must not declare a path")]
    IndexWithPath(RouteId),

    #[error("index route {0} must not have children")]
    IndexWithChildren(RouteId),

    #[error("root route {0} must not be an index route")]
    IndexRoot(RouteId),

    #[error("parameter {name:?} of route {id} is already bound by an ancestor")]
    DuplicateParam { id: RouteId, name: String },

    #[error("routes {first} and {second} under {parent} can never be told apart")]
    AmbiguousSiblings {
        parent: RouteId,
        first: RouteId,
        second: RouteId,
    },
}

fn join(ids: &[RouteId]) -> String {
    ids.iter().map(RouteId::as_str).collect::<Vec<_>>().join(", ")
}

/// Route table rejected at build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid route table: {}", describe(.0))]
pub struct TreeError(pub Vec<TreeIssue>);

fn describe(issues: &[TreeIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One node of the compiled tree.
pub struct RouteNode {
    id: RouteId,
    pattern: Vec<Segment>,
    index: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
    handlers: RouteHandlers,
}

impl RouteNode {
    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn pattern(&self) -> &[Segment] {
        &self.pattern
    }

    pub fn is_index(&self) -> bool {
        self.index
    }

    /// A non-root node that consumes no segments and is not an index.
    pub fn is_pathless(&self) -> bool {
        self.pattern.is_empty() && !self.index && self.parent.is_some()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn handlers(&self) -> &RouteHandlers {
        &self.handlers
    }

    pub(crate) fn children(&self) -> &[usize] {
        &self.children
    }

    /// Sort group among siblings: literal-led, pathless, parameter-led, index.
    fn group(&self) -> u8 {
        if self.index {
            return 3;
        }
        match self.pattern.first().map(Segment::rank) {
            Some(SegmentRank::Literal) => 0,
            None => 1,
            Some(_) => 2,
        }
    }
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern: Vec<String> = self.pattern.iter().map(|s| s.to_string()).collect();
        f.debug_struct("RouteNode")
            .field("id", &self.id)
            .field("pattern", &pattern.join("/"))
            .field("index", &self.index)
            .field("depth", &self.depth)
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Immutable, ordered tree of routes.
#[derive(Debug)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
    root: usize,
    by_id: HashMap<RouteId, usize>,
}

impl RouteTree {
    /// Build the tree from a route table and the registered capabilities.
    pub fn build(
        descriptors: &[RouteDescriptor],
        registry: &HandlerRegistry,
    ) -> Result<Self, TreeError> {
        let issues = check_descriptors(descriptors);
        if !issues.is_empty() {
            return Err(TreeError(issues));
        }

        let by_id: HashMap<RouteId, usize> = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();

        let mut nodes = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            // Patterns were checked above.
            let pattern = parse_pattern(&descriptor.path).unwrap_or_default();
            nodes.push(RouteNode {
                id: descriptor.id.clone(),
                pattern,
                index: descriptor.index,
                parent: descriptor.parent.as_ref().and_then(|p| by_id.get(p).copied()),
                children: Vec::new(),
                depth: 0,
                handlers: registry
                    .get(descriptor.id.as_str())
                    .cloned()
                    .unwrap_or_default(),
            });
        }

        for i in 0..nodes.len() {
            if let Some(parent) = nodes[i].parent {
                nodes[parent].children.push(i);
            }
        }

        let root = nodes
            .iter()
            .position(|n| n.parent.is_none())
            .ok_or_else(|| TreeError(vec![TreeIssue::NoRoot]))?;

        // Depths, then child priority.
        let mut queue = VecDeque::from([root]);
        while let Some(i) = queue.pop_front() {
            let depth = nodes[i].depth;
            let children = nodes[i].children.clone();
            for child in children {
                nodes[child].depth = depth + 1;
                queue.push_back(child);
            }
        }

        for i in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[i].children);
            children.sort_by(|&a, &b| priority(&nodes[a], &nodes[b]));
            nodes[i].children = children;
        }

        for id in registry.ids() {
            if !by_id.contains_key(id) {
                tracing::warn!(route = %id, "Handlers registered for unknown route");
            }
        }

        tracing::debug!(routes = nodes.len(), "Route tree built");

        Ok(Self { nodes, root, by_id })
    }

    pub fn root(&self) -> &RouteNode {
        &self.nodes[self.root]
    }

    pub fn get(&self, id: &str) -> Option<&RouteNode> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    /// Children of `node` in match priority order.
    pub fn children<'t>(&'t self, node: &'t RouteNode) -> impl Iterator<Item = &'t RouteNode> + 't {
        node.children.iter().map(move |&i| &self.nodes[i])
    }

    pub fn parent(&self, node: &RouteNode) -> Option<&RouteNode> {
        node.parent.map(|i| &self.nodes[i])
    }

    pub(crate) fn node(&self, index: usize) -> &RouteNode {
        &self.nodes[index]
    }

    pub(crate) fn root_index(&self) -> usize {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn priority(a: &RouteNode, b: &RouteNode) -> Ordering {
    a.group()
        .cmp(&b.group())
        .then_with(|| compare_patterns(&a.pattern, &b.pattern))
}

/// Check a route table without building it.
pub fn check_descriptors(descriptors: &[RouteDescriptor]) -> Vec<TreeIssue> {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for d in descriptors {
        if !seen.insert(&d.id) {
            issues.push(TreeIssue::DuplicateId(d.id.clone()));
        }
    }

    let roots: Vec<&RouteDescriptor> = descriptors.iter().filter(|d| d.parent.is_none()).collect();
    match roots.as_slice() {
        [] => issues.push(TreeIssue::NoRoot),
        [root] if root.index => issues.push(TreeIssue::IndexRoot(root.id.clone())),
        [_] => {}
        many => issues.push(TreeIssue::MultipleRoots(
            many.iter().map(|d| d.id.clone()).collect(),
        )),
    }

    let mut patterns: HashMap<&RouteId, Vec<Segment>> = HashMap::new();
    for d in descriptors {
        match parse_pattern(&d.path) {
            Ok(pattern) => {
                if d.index && !pattern.is_empty() {
                    issues.push(TreeIssue::IndexWithPath(d.id.clone()));
                }
                patterns.insert(&d.id, pattern);
            }
            Err(source) => issues.push(TreeIssue::InvalidPath {
                id: d.id.clone(),
                source,
            }),
        }
    }

    let known: HashMap<&RouteId, &RouteDescriptor> = descriptors.iter().map(|d| (&d.id, d)).collect();
    let mut children: HashMap<&RouteId, Vec<&RouteDescriptor>> = HashMap::new();
    for d in descriptors {
        let Some(parent) = &d.parent else { continue };
        match known.get(parent) {
            None => issues.push(TreeIssue::UnknownParent {
                id: d.id.clone(),
                parent: parent.clone(),
            }),
            Some(p) => {
                if p.index {
                    issues.push(TreeIssue::IndexWithChildren(p.id.clone()));
                }
                children.entry(parent).or_default().push(d);
            }
        }
    }

    // Ambiguous siblings: equal shapes, or two index routes.
    for (parent, siblings) in &children {
        let mut shapes: HashMap<(bool, Vec<&str>), &RouteId> = HashMap::new();
        for d in siblings {
            let Some(pattern) = patterns.get(&d.id) else { continue };
            // pathless layouts may repeat
            if pattern.is_empty() && !d.index {
                continue;
            }
            let shape = (d.index, pattern.iter().map(Segment::shape).collect());
            if let Some(first) = shapes.insert(shape, &d.id) {
                issues.push(TreeIssue::AmbiguousSiblings {
                    parent: (*parent).clone(),
                    first: first.clone(),
                    second: d.id.clone(),
                });
            }
        }
    }

    // Reachability and parameter uniqueness along each root-to-leaf path.
    let mut reached = HashSet::new();
    if let [root] = roots.as_slice() {
        let mut stack: Vec<(&RouteDescriptor, Vec<String>)> = vec![(root, Vec::new())];
        while let Some((d, mut bound)) = stack.pop() {
            if !reached.insert(&d.id) {
                continue;
            }
            for name in patterns.get(&d.id).into_iter().flatten().filter_map(Segment::param_name) {
                if bound.iter().any(|b| b == name) {
                    issues.push(TreeIssue::DuplicateParam {
                        id: d.id.clone(),
                        name: name.to_string(),
                    });
                } else {
                    bound.push(name.to_string());
                }
            }
            for child in children.get(&d.id).into_iter().flatten() {
                stack.push((*child, bound.clone()));
            }
        }

        for d in descriptors {
            let parent_known = d.parent.as_ref().map_or(true, |p| known.contains_key(p));
            if parent_known && !reached.contains(&d.id) {
                issues.push(TreeIssue::Unreachable(d.id.clone()));
            }
        }
    }

    issues
}

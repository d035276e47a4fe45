//! Relationship inference: turns normalized nodes plus their raw objects into a
//! deduplicated, dangling-free edge set.
//!
//! Rules run in a fixed order (ownership first). A candidate is dropped when an
//! endpoint is not a known node, when it is a self-loop, or when the pair is
//! already present in either direction.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use rustc_hash::{FxHashMap, FxHashSet};
use topo_core::{Edge, Node, RawResource, Relation};
use tracing::debug;

pub mod rules;
pub mod selector;

pub use rules::{
    EnvRule, IngressRule, OwnershipRule, SelectorRule, ServiceAccountRule, VolumeRule,
};
pub use selector::{labels_match_selector, LabelSelector};

/// Read-only lookups over one build's nodes.
pub struct NodeIndex<'a> {
    nodes: &'a [Node],
    raw_by_uid: &'a HashMap<String, RawResource>,
    by_id: FxHashMap<&'a str, &'a Node>,
    by_namespace: FxHashMap<Option<&'a str>, Vec<&'a Node>>,
}

impl<'a> NodeIndex<'a> {
    pub fn new(nodes: &'a [Node], raw_by_uid: &'a HashMap<String, RawResource>) -> Self {
        let mut by_id = FxHashMap::default();
        let mut by_namespace: FxHashMap<Option<&'a str>, Vec<&'a Node>> = FxHashMap::default();
        for n in nodes {
            by_id.insert(n.id.as_str(), n);
            by_namespace.entry(n.namespace.as_deref()).or_default().push(n);
        }
        Self { nodes, raw_by_uid, by_id, by_namespace }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&'a Node> {
        self.by_id.get(id).copied()
    }

    pub fn raw(&self, node: &Node) -> Option<&'a RawResource> {
        self.raw_by_uid.get(&node.uid)
    }

    /// Nodes paired with their raw object, in node order.
    pub fn resources(&self) -> impl Iterator<Item = (&'a Node, &'a RawResource)> + '_ {
        let raw = self.raw_by_uid;
        self.nodes.iter().filter_map(move |n| raw.get(&n.uid).map(|r| (n, r)))
    }

    pub fn in_namespace(&self, namespace: Option<&'a str>) -> &[&'a Node] {
        self.by_namespace.get(&namespace).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Accepted edges plus pair bookkeeping for dedup.
#[derive(Debug, Default)]
pub struct EdgeSet {
    edges: Vec<Edge>,
    pairs: FxHashSet<(String, String)>,
    owned: FxHashSet<String>,
}

impl EdgeSet {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// True if `(a, b)` or `(b, a)` is already represented.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        self.pairs.contains(&(a.to_string(), b.to_string())) || self.pairs.contains(&(b.to_string(), a.to_string()))
    }

    /// True if some ownership edge already points at `id`.
    pub fn is_owned(&self, id: &str) -> bool {
        self.owned.contains(id)
    }

    /// Offer a candidate; returns whether it was accepted.
    pub fn offer(&mut self, index: &NodeIndex<'_>, source: &str, target: &str, relation: Relation) -> bool {
        if source == target || !index.contains(source) || !index.contains(target) {
            return false;
        }
        if self.connects(source, target) {
            return false;
        }
        self.pairs.insert((source.to_string(), target.to_string()));
        if relation == Relation::Owner {
            self.owned.insert(target.to_string());
        }
        self.edges.push(Edge::new(source, target, relation));
        true
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn into_edges(self) -> Vec<Edge> {
        self.edges
    }
}

/// Candidate `(source, target)` pair.
pub type Candidate = (String, String);

/// One inference rule. Rules see edges accepted by earlier rules.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;
    fn relation(&self) -> Relation;
    fn discover(&self, index: &NodeIndex<'_>, accepted: &EdgeSet, out: &mut Vec<Candidate>);
}

/// Ordered rule pipeline.
pub struct InferenceEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new(vec![
            Box::new(OwnershipRule),
            Box::new(SelectorRule),
            Box::new(VolumeRule),
            Box::new(ServiceAccountRule),
            Box::new(EnvRule),
            Box::new(IngressRule),
        ])
    }
}

impl InferenceEngine {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn infer(&self, nodes: &[Node], raw_by_uid: &HashMap<String, RawResource>) -> Vec<Edge> {
        let index = NodeIndex::new(nodes, raw_by_uid);
        let mut edges = EdgeSet::default();
        let mut found = Vec::new();
        for rule in &self.rules {
            found.clear();
            rule.discover(&index, &edges, &mut found);
            let candidates = found.len();
            let accepted = found
                .iter()
                .filter(|(s, t)| edges.offer(&index, s, t, rule.relation()))
                .count();
            debug!(rule = rule.name(), candidates, accepted, "graph: rule applied");
        }
        edges.into_edges()
    }
}

/// Infer edges with the standard rule set.
pub fn infer(nodes: &[Node], raw_by_uid: &HashMap<String, RawResource>) -> Vec<Edge> {
    InferenceEngine::default().infer(nodes, raw_by_uid)
}

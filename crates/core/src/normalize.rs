//! Resource normalizer: raw resources to graph nodes.

use std::collections::HashMap;

use metrics::counter;
use tracing::{debug, warn};

use crate::raw::RawResource;
use crate::status::map_status;
use crate::{node_id, Node};

/// Kinds that never become nodes unless configured otherwise.
pub const DEFAULT_EXCLUDED_KINDS: &[&str] = &["Event", "Endpoints", "EndpointSlice"];

/// Build a node for one resource; `None` (with a warning) when `kind`,
/// `metadata.name` or `metadata.uid` is missing.
pub fn normalize(res: &RawResource) -> Option<Node> {
    let (Some(kind), Some(name), Some(uid)) = (res.kind(), res.name(), res.uid()) else {
        warn!(
            kind = ?res.kind(),
            name = ?res.name(),
            uid = ?res.uid(),
            "normalize: skipping resource missing kind/name/uid"
        );
        counter!("graph_items_skipped_total", 1);
        return None;
    };
    let summary = map_status(res);
    let labels = res.labels();
    Some(Node {
        id: node_id(kind, res.namespace(), name),
        kind: kind.to_string(),
        name: name.to_string(),
        namespace: res.namespace().map(|s| s.to_string()),
        uid: uid.to_string(),
        api_version: res.api_version.clone().unwrap_or_default(),
        labels: if labels.is_empty() { None } else { Some(labels.clone()) },
        status: summary.status,
        health: summary.health,
        label_details: summary.label_details,
    })
}

/// Nodes for one build plus the raw objects they came from.
#[derive(Debug, Default)]
pub struct Normalized {
    /// In first-seen order.
    pub nodes: Vec<Node>,
    pub raw_by_uid: HashMap<String, RawResource>,
    pub skipped: usize,
}

/// Normalizer with a configurable kind exclusion list.
#[derive(Debug, Clone)]
pub struct Normalizer {
    excluded: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_KINDS)
    }
}

impl Normalizer {
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { excluded: excluded.into_iter().map(|k| k.as_ref().to_lowercase()).collect() }
    }

    /// Case-insensitive match against the exclusion list.
    pub fn is_excluded(&self, kind: &str) -> bool {
        let k = kind.to_lowercase();
        self.excluded.iter().any(|e| *e == k)
    }

    pub fn normalize(&self, res: &RawResource) -> Option<Node> {
        if let Some(kind) = res.kind() {
            if self.is_excluded(kind) {
                debug!(kind = %kind, name = ?res.name(), "normalize: excluded kind");
                return None;
            }
        }
        normalize(res)
    }

    /// Normalize a flattened item set.
    ///
    /// Two resources yielding the same node id: the later one wins and keeps the
    /// earlier one's position. A uid already claimed by a different resource is
    /// skipped instead, so there the first write wins.
    pub fn normalize_all(&self, items: Vec<RawResource>) -> Normalized {
        let mut out = Normalized::default();
        let mut index_by_id: HashMap<String, usize> = HashMap::new();
        for res in items {
            let Some(node) = self.normalize(&res) else {
                out.skipped += 1;
                continue;
            };
            if let Some(prev) = out.raw_by_uid.get(&node.uid) {
                if prev.kind() != res.kind() || prev.name() != res.name() || prev.namespace() != res.namespace() {
                    warn!(uid = %node.uid, id = %node.id, "normalize: uid already used by another resource; skipping");
                    out.skipped += 1;
                    continue;
                }
            }
            match index_by_id.get(&node.id).copied() {
                Some(i) => {
                    warn!(id = %node.id, "normalize: duplicate node id; last write wins");
                    let old_uid = std::mem::replace(&mut out.nodes[i], node.clone()).uid;
                    out.raw_by_uid.remove(&old_uid);
                }
                None => {
                    index_by_id.insert(node.id.clone(), out.nodes.len());
                    out.nodes.push(node.clone());
                }
            }
            out.raw_by_uid.insert(node.uid, res);
        }
        debug!(nodes = out.nodes.len(), skipped = out.skipped, "normalize: done");
        out
    }
}

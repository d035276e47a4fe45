//! Topology core types: raw resource envelope, graph nodes and edges.
//!
//! Every graph-build call produces fresh [`Node`]s and [`Edge`]s; nothing here is
//! persisted across calls.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod normalize;
pub mod raw;
pub mod status;

pub use normalize::{Normalized, Normalizer};
pub use raw::{parse_resource_list, ListParseError, ObjectMeta, OwnerRef, RawResource};
pub use status::map_status;

pub mod prelude {
    pub use super::{
        node_id, Edge, GraphMessage, GraphResult, Health, Node, NodeStatus, Relation, StatusSummary,
    };
    pub use super::{Normalizer, RawResource};
}

/// Scope segment used in node ids for cluster-scoped resources.
pub const CLUSTER_SCOPE: &str = "cluster";

/// Stable node id: `lowercase(kind)/<namespace or "cluster">/<name>`.
///
/// Downstream renderers key off this exact shape.
pub fn node_id(kind: &str, namespace: Option<&str>, name: &str) -> String {
    format!(
        "{}/{}/{}",
        kind.to_lowercase(),
        namespace.unwrap_or(CLUSTER_SCOPE),
        name
    )
}

/// Semantic status of a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum NodeStatus {
    Running,
    Pending,
    Succeeded,
    Failed,
    Progressing,
    ScaledDown,
    Idle,
    Active,
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
    #[default]
    Unknown,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Running => "Running",
            NodeStatus::Pending => "Pending",
            NodeStatus::Succeeded => "Succeeded",
            NodeStatus::Failed => "Failed",
            NodeStatus::Progressing => "Progressing",
            NodeStatus::ScaledDown => "ScaledDown",
            NodeStatus::Idle => "Idle",
            NodeStatus::Active => "Active",
            NodeStatus::ClusterIP => "ClusterIP",
            NodeStatus::NodePort => "NodePort",
            NodeStatus::LoadBalancer => "LoadBalancer",
            NodeStatus::ExternalName => "ExternalName",
            NodeStatus::Unknown => "Unknown",
        }
    }

    /// Pod phase (`status.phase`) to status. Unrecognized phases are `Unknown`.
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            "Running" => NodeStatus::Running,
            "Pending" => NodeStatus::Pending,
            "Succeeded" => NodeStatus::Succeeded,
            "Failed" => NodeStatus::Failed,
            _ => NodeStatus::Unknown,
        }
    }

    /// Service `spec.type` to status. Unrecognized types are `Unknown`.
    pub fn from_service_type(ty: &str) -> Self {
        match ty {
            "ClusterIP" => NodeStatus::ClusterIP,
            "NodePort" => NodeStatus::NodePort,
            "LoadBalancer" => NodeStatus::LoadBalancer,
            "ExternalName" => NodeStatus::ExternalName,
            _ => NodeStatus::Unknown,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ready vs desired counts for countable kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub ready: u32,
    pub desired: u32,
}

/// Output of the status mapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_details: Option<String>,
}

impl StatusSummary {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Summary for kinds with ready/desired counts; `labelDetails` is `"<ready>/<desired> Ready"`.
    pub fn counted(status: NodeStatus, ready: u32, desired: u32) -> Self {
        Self {
            status,
            health: Some(Health { ready, desired }),
            label_details: Some(format!("{}/{} Ready", ready, desired)),
        }
    }
}

/// Graph vertex for one resource instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub uid: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_details: Option<String>,
}

/// Which inference rule produced an edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    Owner,
    Selector,
    Volume,
    ServiceAccount,
    Env,
    Ingress,
}

impl Relation {
    /// Presentation hint: ownership and ingress routing are drawn animated.
    pub fn animated(&self) -> bool {
        matches!(self, Relation::Owner | Relation::Ingress)
    }
}

/// Directed edge from upstream/owning node to downstream/dependent node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation: Relation,
    #[serde(default)]
    pub animated: bool,
}

impl Edge {
    /// Canonical id, independent of the rule that found the pair.
    pub fn edge_id(source: &str, target: &str) -> String {
        format!("e-{}-{}", source, target)
    }

    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: Relation) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Self::edge_id(&source, &target),
            source,
            target,
            relation,
            animated: relation.animated(),
        }
    }
}

/// Result of one graph build, delivered once per request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GraphResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Kinds that contributed nothing because their fetch failed. Informational only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GraphResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self { nodes: Vec::new(), edges: Vec::new(), error: Some(message.into()), warnings: Vec::new() }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Host message envelope carrying a [`GraphResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraphMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub sub_type: String,
    pub data: GraphResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphMessage {
    pub const TYPE: &'static str = "GET_RESOURCE_GRAPH";
    pub const SUB_TYPE: &'static str = "namespaceGraphData";

    pub fn new(data: GraphResult) -> Self {
        let error = data.error.clone();
        Self { message_type: Self::TYPE.to_string(), sub_type: Self::SUB_TYPE.to_string(), data, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_lowercases_kind_and_defaults_scope() {
        assert_eq!(node_id("Deployment", Some("test-ns"), "test-dep"), "deployment/test-ns/test-dep");
        assert_eq!(node_id("PersistentVolume", None, "pv-1"), "persistentvolume/cluster/pv-1");
    }

    #[test]
    fn message_mirrors_top_level_error() {
        let msg = GraphMessage::new(GraphResult::failed("boom"));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "GET_RESOURCE_GRAPH");
        assert_eq!(v["subType"], "namespaceGraphData");
        assert_eq!(v["error"], "boom");
        assert_eq!(v["data"]["nodes"], serde_json::json!([]));
        assert!(v["data"].get("warnings").is_none());
    }
}

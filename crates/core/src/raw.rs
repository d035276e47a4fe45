//! Minimal envelope over untyped Kubernetes objects.
//!
//! Only identity, labels and owner references are typed; `spec` and `status` stay
//! as JSON and are read through [`value_at`]. Parsing never fails on a single
//! object: wrong-typed or missing fields simply come out empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

/// Back-pointer from a dependent to its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub controller: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub owner_references: SmallVec<[OwnerRef; 1]>,
}

/// Raw resource as returned by a collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct RawResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub metadata: ObjectMeta,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

/// Walk nested object keys; `None` as soon as a segment is missing or not an object.
pub fn value_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = v;
    for seg in path {
        cur = cur.as_object()?.get(*seg)?;
    }
    Some(cur)
}

pub fn str_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(v, path).and_then(|x| x.as_str())
}

/// Array at `path`, or an empty slice.
pub fn array_at<'a>(v: &'a Value, path: &[&str]) -> &'a [Value] {
    value_at(v, path)
        .and_then(|x| x.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// Non-negative integer at `path`, saturating into `u32`.
pub fn count_at(v: &Value, path: &[&str]) -> Option<u32> {
    value_at(v, path)
        .and_then(|x| x.as_u64())
        .map(|n| n.min(u32::MAX as u64) as u32)
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(|x| x.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// String-valued entries of a JSON object; other values are dropped.
pub fn string_map(v: Option<&Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(obj) = v.and_then(|x| x.as_object()) {
        for (k, val) in obj {
            if let Some(s) = val.as_str() {
                out.insert(k.clone(), s.to_string());
            }
        }
    }
    out
}

fn owner_refs(v: Option<&Value>) -> SmallVec<[OwnerRef; 1]> {
    let mut out = SmallVec::new();
    for o in v.and_then(|x| x.as_array()).map(|a| a.as_slice()).unwrap_or(&[]) {
        let (Some(kind), Some(name)) = (non_empty_str(o.get("kind")), non_empty_str(o.get("name"))) else {
            continue;
        };
        out.push(OwnerRef {
            api_version: non_empty_str(o.get("apiVersion")),
            kind,
            name,
            uid: non_empty_str(o.get("uid")),
            controller: o.get("controller").and_then(|x| x.as_bool()).unwrap_or(false),
        });
    }
    out
}

impl From<Value> for RawResource {
    fn from(mut v: Value) -> Self {
        let meta = v.get("metadata");
        let metadata = ObjectMeta {
            name: non_empty_str(meta.and_then(|m| m.get("name"))),
            namespace: non_empty_str(meta.and_then(|m| m.get("namespace"))),
            uid: non_empty_str(meta.and_then(|m| m.get("uid"))),
            labels: string_map(meta.and_then(|m| m.get("labels"))),
            owner_references: owner_refs(meta.and_then(|m| m.get("ownerReferences"))),
        };
        let kind = non_empty_str(v.get("kind"));
        let api_version = non_empty_str(v.get("apiVersion"));
        let (spec, status) = match v.as_object_mut() {
            Some(obj) => (
                obj.remove("spec").unwrap_or(Value::Null),
                obj.remove("status").filter(|s| !s.is_null()),
            ),
            None => (Value::Null, None),
        };
        Self { kind, api_version, metadata, spec, status }
    }
}

impl RawResource {
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    pub fn uid(&self) -> Option<&str> {
        self.metadata.uid.as_deref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    pub fn spec_at(&self, path: &[&str]) -> Option<&Value> {
        value_at(&self.spec, path)
    }

    pub fn status_at(&self, path: &[&str]) -> Option<&Value> {
        self.status.as_ref().and_then(|s| value_at(s, path))
    }
}

/// Failure to read a collector's list payload.
#[derive(Debug, thiserror::Error)]
pub enum ListParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a list: {0}")]
    NotAList(String),
}

/// Parse `{ "items": [...] }` (or a single object) into raw resources.
///
/// Blank payloads are zero items.
pub fn parse_resource_list(text: &str) -> Result<Vec<RawResource>, ListParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let v: Value = serde_json::from_str(text)?;
    let Value::Object(mut obj) = v else {
        return Err(ListParseError::NotAList("top-level value is not an object".into()));
    };
    match obj.remove("items") {
        Some(Value::Array(items)) => Ok(items.into_iter().map(RawResource::from).collect()),
        Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(ListParseError::NotAList("`items` is not an array".into())),
        None if obj.contains_key("kind") && obj.contains_key("metadata") => {
            Ok(vec![RawResource::from(Value::Object(obj))])
        }
        None => Err(ListParseError::NotAList("missing `items`".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tolerates_wrong_types_at_any_depth() {
        let raw = RawResource::from(json!({
            "kind": "Pod",
            "metadata": {
                "name": "p",
                "uid": 42,
                "labels": { "app": "web", "replicas": 3 },
                "ownerReferences": [ { "kind": "ReplicaSet" }, { "kind": "ReplicaSet", "name": "rs", "uid": "u1" }, "junk" ]
            },
            "spec": "not-an-object",
            "status": null
        }));
        assert_eq!(raw.kind(), Some("Pod"));
        assert_eq!(raw.name(), Some("p"));
        assert_eq!(raw.uid(), None);
        assert_eq!(raw.labels().len(), 1);
        assert_eq!(raw.metadata.owner_references.len(), 1);
        assert_eq!(raw.metadata.owner_references[0].uid.as_deref(), Some("u1"));
        assert!(raw.status.is_none());
        assert!(raw.spec_at(&["containers"]).is_none());
    }

    #[test]
    fn non_object_becomes_empty_envelope() {
        let raw = RawResource::from(json!([1, 2, 3]));
        assert_eq!(raw, RawResource::default());
    }

    #[test]
    fn list_payload_shapes() {
        assert!(parse_resource_list("").unwrap().is_empty());
        assert!(parse_resource_list("  \n").unwrap().is_empty());
        let items = parse_resource_list(r#"{"kind":"List","items":[{"kind":"Pod","metadata":{"name":"a"}}]}"#).unwrap();
        assert_eq!(items.len(), 1);
        let single = parse_resource_list(r#"{"kind":"Pod","metadata":{"name":"a"}}"#).unwrap();
        assert_eq!(single[0].name(), Some("a"));
        assert!(matches!(parse_resource_list("{not json"), Err(ListParseError::Json(_))));
        assert!(matches!(parse_resource_list(r#"{"items":{}}"#), Err(ListParseError::NotAList(_))));
        assert!(matches!(parse_resource_list("[]"), Err(ListParseError::NotAList(_))));
    }

    #[test]
    fn serde_roundtrip_uses_lenient_path() {
        let raw: RawResource = serde_json::from_value(json!({
            "kind": "Service",
            "apiVersion": "v1",
            "metadata": { "name": "svc", "namespace": "" },
            "spec": { "type": "ClusterIP" }
        }))
        .unwrap();
        assert_eq!(raw.namespace(), None);
        assert_eq!(raw.api_version.as_deref(), Some("v1"));
        assert_eq!(str_at(&raw.spec, &["type"]), Some("ClusterIP"));
    }
}

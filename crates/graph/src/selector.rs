//! Label selector matching.

use std::collections::BTreeMap;

use serde_json::Value;
use topo_core::raw::{array_at, string_map};

/// Every selector key must be present in `labels` with an identical value.
///
/// An empty selector is vacuously satisfied; [`LabelSelector`] refuses to match
/// in that case.
pub fn labels_match_selector(labels: &BTreeMap<String, String>, selector: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    /// Anything else; never matches.
    Unsupported,
}

impl Operator {
    fn parse(s: &str) -> Self {
        match s {
            "In" => Operator::In,
            "NotIn" => Operator::NotIn,
            "Exists" => Operator::Exists,
            "DoesNotExist" => Operator::DoesNotExist,
            _ => Operator::Unsupported,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Requirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::In => value.map(|v| self.values.contains(v)).unwrap_or(false),
            Operator::NotIn => value.map(|v| !self.values.contains(v)).unwrap_or(true),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Unsupported => false,
        }
    }
}

/// Selector as found under `spec.selector`: either a plain key/value map
/// (Service) or a `matchLabels`/`matchExpressions` structure (workloads).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
    pub match_expressions: Vec<Requirement>,
}

impl LabelSelector {
    /// `None` for missing or empty selectors.
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let sel = if obj.contains_key("matchLabels") || obj.contains_key("matchExpressions") {
            let match_expressions = array_at(v, &["matchExpressions"])
                .iter()
                .filter_map(|e| {
                    let key = e.get("key")?.as_str()?.to_string();
                    let operator = Operator::parse(e.get("operator").and_then(|o| o.as_str()).unwrap_or(""));
                    let values = e
                        .get("values")
                        .and_then(|x| x.as_array())
                        .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                    Some(Requirement { key, operator, values })
                })
                .collect();
            LabelSelector { match_labels: string_map(obj.get("matchLabels")), match_expressions }
        } else {
            LabelSelector { match_labels: string_map(Some(v)), match_expressions: Vec::new() }
        };
        if sel.is_empty() {
            None
        } else {
            Some(sel)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        !self.is_empty()
            && labels_match_selector(labels, &self.match_labels)
            && self.match_expressions.iter().all(|r| r.matches(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn exact_equality_per_key() {
        let l = labels(&[("app", "web"), ("tier", "fe")]);
        assert!(labels_match_selector(&l, &labels(&[("app", "web")])));
        assert!(labels_match_selector(&l, &labels(&[("app", "web"), ("tier", "fe")])));
        assert!(!labels_match_selector(&l, &labels(&[("app", "Web")])));
        assert!(!labels_match_selector(&l, &labels(&[("app", "web"), ("env", "prod")])));
        assert!(!labels_match_selector(&BTreeMap::new(), &labels(&[("app", "web")])));
    }

    #[test]
    fn plain_and_structured_shapes() {
        let plain = LabelSelector::from_value(&json!({ "app": "web" })).unwrap();
        assert_eq!(plain.match_labels, labels(&[("app", "web")]));

        let nested = LabelSelector::from_value(&json!({ "matchLabels": { "app": "web" } })).unwrap();
        assert_eq!(nested, plain);

        assert!(LabelSelector::from_value(&json!({})).is_none());
        assert!(LabelSelector::from_value(&json!({ "matchLabels": {} })).is_none());
        assert!(LabelSelector::from_value(&json!("app=web")).is_none());
    }

    #[test]
    fn match_expressions() {
        let sel = LabelSelector::from_value(&json!({
            "matchLabels": { "app": "web" },
            "matchExpressions": [
                { "key": "tier", "operator": "In", "values": ["fe", "edge"] },
                { "key": "env", "operator": "NotIn", "values": ["dev"] },
                { "key": "canary", "operator": "DoesNotExist" }
            ]
        }))
        .unwrap();
        assert!(sel.matches(&labels(&[("app", "web"), ("tier", "fe")])));
        assert!(sel.matches(&labels(&[("app", "web"), ("tier", "edge"), ("env", "prod")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("tier", "be")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("tier", "fe"), ("env", "dev")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("tier", "fe"), ("canary", "1")])));

        let exists = LabelSelector::from_value(&json!({ "matchExpressions": [{ "key": "app", "operator": "Exists" }] })).unwrap();
        assert!(exists.matches(&labels(&[("app", "x")])));
        assert!(!exists.matches(&BTreeMap::new()));

        let odd = LabelSelector::from_value(&json!({ "matchExpressions": [{ "key": "app", "operator": "Gt" }] })).unwrap();
        assert!(!odd.matches(&labels(&[("app", "x")])));
    }

    #[test]
    fn empty_selector_matches_nothing() {
        assert!(!LabelSelector::default().matches(&labels(&[("app", "web")])));
    }
}

//! The standard inference rules.

use std::collections::BTreeMap;

use serde_json::Value;
use smallvec::SmallVec;
use topo_core::raw::{array_at, str_at, value_at};
use topo_core::{node_id, Node, Relation};

use crate::selector::LabelSelector;
use crate::{Candidate, EdgeSet, NodeIndex, Rule};

/// Workload controllers whose selectors may link to ReplicaSets and Pods.
const WORKLOAD_KINDS: &[&str] = &["Deployment", "ReplicaSet", "StatefulSet", "DaemonSet", "Job"];

static NO_LABELS: BTreeMap<String, String> = BTreeMap::new();

/// Owner -> child for every resolvable `metadata.ownerReferences` entry.
pub struct OwnershipRule;

impl Rule for OwnershipRule {
    fn name(&self) -> &'static str {
        "ownership"
    }

    fn relation(&self) -> Relation {
        Relation::Owner
    }

    fn discover(&self, index: &NodeIndex<'_>, _accepted: &EdgeSet, out: &mut Vec<Candidate>) {
        for (child, raw) in index.resources() {
            for owner in raw.metadata.owner_references.iter() {
                let mut ids: SmallVec<[String; 2]> = SmallVec::new();
                ids.push(node_id(&owner.kind, child.namespace.as_deref(), &owner.name));
                if child.namespace.is_some() {
                    ids.push(node_id(&owner.kind, None, &owner.name));
                }
                let found = ids.into_iter().find_map(|id| index.get(&id));
                let Some(parent) = found else { continue };
                if let Some(uid) = owner.uid.as_deref() {
                    if parent.uid != uid {
                        continue;
                    }
                }
                out.push((parent.id.clone(), child.id.clone()));
            }
        }
    }
}

/// Selector source -> every same-namespace node whose labels satisfy it.
///
/// Services target Pods only. Workload controllers target Pods and ReplicaSets
/// that are not already owned by something in the graph, so a Deployment never
/// links straight to Pods its ReplicaSet owns. Other kinds target Pods only.
pub struct SelectorRule;

impl SelectorRule {
    fn targets(source_kind: &str, target_kind: &str) -> bool {
        if WORKLOAD_KINDS.contains(&source_kind) {
            matches!(target_kind, "Pod" | "ReplicaSet")
        } else {
            target_kind == "Pod"
        }
    }
}

impl Rule for SelectorRule {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn relation(&self) -> Relation {
        Relation::Selector
    }

    fn discover(&self, index: &NodeIndex<'_>, accepted: &EdgeSet, out: &mut Vec<Candidate>) {
        for (source, raw) in index.resources() {
            let Some(selector) = raw.spec_at(&["selector"]).and_then(LabelSelector::from_value) else {
                continue;
            };
            let workload = WORKLOAD_KINDS.contains(&source.kind.as_str());
            for target in index.in_namespace(source.namespace.as_deref()) {
                if target.uid == source.uid || !Self::targets(&source.kind, &target.kind) {
                    continue;
                }
                if workload && accepted.is_owned(&target.id) {
                    continue;
                }
                // unlabeled targets can still satisfy NotIn / DoesNotExist
                let labels = target.labels.as_ref().unwrap_or(&NO_LABELS);
                if selector.matches(labels) {
                    out.push((source.id.clone(), target.id.clone()));
                }
            }
        }
    }
}

fn name_at<'v>(v: &'v Value, path: &[&str]) -> Option<&'v str> {
    str_at(v, path).filter(|s| !s.is_empty())
}

fn pod_ref(pod: &Node, kind: &str, name: &str, out: &mut Vec<Candidate>) {
    out.push((pod.id.clone(), node_id(kind, pod.namespace.as_deref(), name)));
}

/// Pod -> ConfigMap / Secret / PersistentVolumeClaim mounted as volumes.
pub struct VolumeRule;

impl Rule for VolumeRule {
    fn name(&self) -> &'static str {
        "volumes"
    }

    fn relation(&self) -> Relation {
        Relation::Volume
    }

    fn discover(&self, index: &NodeIndex<'_>, _accepted: &EdgeSet, out: &mut Vec<Candidate>) {
        for (pod, raw) in index.resources().filter(|(n, _)| n.kind == "Pod") {
            for vol in array_at(&raw.spec, &["volumes"]) {
                if let Some(cm) = name_at(vol, &["configMap", "name"]) {
                    pod_ref(pod, "ConfigMap", cm, out);
                }
                if let Some(sec) = name_at(vol, &["secret", "secretName"]).or_else(|| name_at(vol, &["secret", "name"])) {
                    pod_ref(pod, "Secret", sec, out);
                }
                if let Some(pvc) = name_at(vol, &["persistentVolumeClaim", "claimName"]) {
                    pod_ref(pod, "PersistentVolumeClaim", pvc, out);
                }
                for src in array_at(vol, &["projected", "sources"]) {
                    if let Some(cm) = name_at(src, &["configMap", "name"]) {
                        pod_ref(pod, "ConfigMap", cm, out);
                    }
                    if let Some(sec) = name_at(src, &["secret", "name"]) {
                        pod_ref(pod, "Secret", sec, out);
                    }
                }
            }
        }
    }
}

/// Pod -> ServiceAccount named by `spec.serviceAccountName`.
pub struct ServiceAccountRule;

impl Rule for ServiceAccountRule {
    fn name(&self) -> &'static str {
        "service-account"
    }

    fn relation(&self) -> Relation {
        Relation::ServiceAccount
    }

    fn discover(&self, index: &NodeIndex<'_>, _accepted: &EdgeSet, out: &mut Vec<Candidate>) {
        for (pod, raw) in index.resources().filter(|(n, _)| n.kind == "Pod") {
            // `serviceAccount` is the deprecated alias
            let sa = name_at(&raw.spec, &["serviceAccountName"]).or_else(|| name_at(&raw.spec, &["serviceAccount"]));
            if let Some(sa) = sa {
                pod_ref(pod, "ServiceAccount", sa, out);
            }
        }
    }
}

/// Pod -> ConfigMap / Secret referenced from container environments.
pub struct EnvRule;

impl EnvRule {
    fn container(pod: &Node, c: &Value, out: &mut Vec<Candidate>) {
        for src in array_at(c, &["envFrom"]) {
            if let Some(cm) = name_at(src, &["configMapRef", "name"]) {
                pod_ref(pod, "ConfigMap", cm, out);
            }
            if let Some(sec) = name_at(src, &["secretRef", "name"]) {
                pod_ref(pod, "Secret", sec, out);
            }
        }
        for var in array_at(c, &["env"]) {
            let Some(from) = value_at(var, &["valueFrom"]) else { continue };
            if let Some(cm) = name_at(from, &["configMapKeyRef", "name"]) {
                pod_ref(pod, "ConfigMap", cm, out);
            }
            if let Some(sec) = name_at(from, &["secretKeyRef", "name"]) {
                pod_ref(pod, "Secret", sec, out);
            }
        }
    }
}

impl Rule for EnvRule {
    fn name(&self) -> &'static str {
        "env"
    }

    fn relation(&self) -> Relation {
        Relation::Env
    }

    fn discover(&self, index: &NodeIndex<'_>, _accepted: &EdgeSet, out: &mut Vec<Candidate>) {
        for (pod, raw) in index.resources().filter(|(n, _)| n.kind == "Pod") {
            for field in ["containers", "initContainers", "ephemeralContainers"] {
                for c in array_at(&raw.spec, &[field]) {
                    Self::container(pod, c, out);
                }
            }
        }
    }
}

/// Ingress -> Service for the default backend and every HTTP path backend.
pub struct IngressRule;

impl IngressRule {
    fn backend_service(backend: &Value) -> Option<&str> {
        // networking.k8s.io/v1, then extensions/v1beta1
        name_at(backend, &["service", "name"]).or_else(|| name_at(backend, &["serviceName"]))
    }
}

impl Rule for IngressRule {
    fn name(&self) -> &'static str {
        "ingress"
    }

    fn relation(&self) -> Relation {
        Relation::Ingress
    }

    fn discover(&self, index: &NodeIndex<'_>, _accepted: &EdgeSet, out: &mut Vec<Candidate>) {
        for (ing, raw) in index.resources().filter(|(n, _)| n.kind == "Ingress") {
            let mut services: SmallVec<[&str; 4]> = SmallVec::new();
            for key in ["defaultBackend", "backend"] {
                if let Some(svc) = raw.spec_at(&[key]).and_then(Self::backend_service) {
                    services.push(svc);
                }
            }
            for rule in array_at(&raw.spec, &["rules"]) {
                for path in array_at(rule, &["http", "paths"]) {
                    if let Some(svc) = value_at(path, &["backend"]).and_then(Self::backend_service) {
                        services.push(svc);
                    }
                }
            }
            for svc in services {
                out.push((ing.id.clone(), node_id("Service", ing.namespace.as_deref(), svc)));
            }
        }
    }
}

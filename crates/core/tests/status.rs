#![forbid(unsafe_code)]

use serde_json::json;
use topo_core::{map_status, Health, NodeStatus, RawResource, StatusSummary};

fn raw(v: serde_json::Value) -> RawResource {
    RawResource::from(v)
}

fn counted(status: NodeStatus, ready: u32, desired: u32, details: &str) -> StatusSummary {
    StatusSummary {
        status,
        health: Some(Health { ready, desired }),
        label_details: Some(details.to_string()),
    }
}

#[test]
fn pod_phase_and_container_readiness() {
    let running = raw(json!({
        "kind": "Pod",
        "spec": { "containers": [{ "name": "c1" }] },
        "status": { "phase": "Running", "containerStatuses": [{ "name": "c1", "ready": true }] }
    }));
    assert_eq!(map_status(&running), counted(NodeStatus::Running, 1, 1, "1/1 Ready"));

    for (phase, want) in [
        ("Pending", NodeStatus::Pending),
        ("Succeeded", NodeStatus::Succeeded),
        ("Failed", NodeStatus::Failed),
        ("Unknown", NodeStatus::Unknown),
    ] {
        let pod = raw(json!({
            "kind": "Pod",
            "spec": { "containers": [{ "name": "c1" }] },
            "status": { "phase": phase }
        }));
        assert_eq!(map_status(&pod), counted(want, 0, 1, "0/1 Ready"), "phase {}", phase);
    }

    // only `ready: true` counts
    let partial = raw(json!({
        "kind": "Pod",
        "spec": { "containers": [{ "name": "a" }, { "name": "b" }, { "name": "c" }] },
        "status": { "phase": "Running", "containerStatuses": [{ "ready": true }, { "ready": false }, { "ready": "true" }] }
    }));
    assert_eq!(map_status(&partial), counted(NodeStatus::Running, 1, 3, "1/3 Ready"));
}

#[test]
fn deployment_replica_comparison() {
    let running = raw(json!({
        "kind": "Deployment",
        "spec": { "replicas": 2 },
        "status": { "availableReplicas": 2, "conditions": [{ "type": "Available", "status": "True" }] }
    }));
    assert_eq!(map_status(&running), counted(NodeStatus::Running, 2, 2, "2/2 Ready"));

    let pending = raw(json!({
        "kind": "Deployment",
        "spec": { "replicas": 2 },
        "status": { "availableReplicas": 1 }
    }));
    assert_eq!(map_status(&pending), counted(NodeStatus::Pending, 1, 2, "1/2 Ready"));

    // conditions never override the count comparison
    let pending_despite_conditions = raw(json!({
        "kind": "Deployment",
        "spec": { "replicas": 2 },
        "status": {
            "availableReplicas": 1,
            "conditions": [
                { "type": "Available", "status": "True" },
                { "type": "Progressing", "status": "True", "reason": "NewReplicaSetAvailable" }
            ]
        }
    }));
    assert_eq!(map_status(&pending_despite_conditions).status, NodeStatus::Pending);

    let scaled_down = raw(json!({
        "kind": "Deployment",
        "spec": { "replicas": 0 },
        "status": { "availableReplicas": 0 }
    }));
    assert_eq!(map_status(&scaled_down), counted(NodeStatus::ScaledDown, 0, 0, "0/0 Ready"));

    let missing_counts = raw(json!({ "kind": "Deployment", "spec": {}, "status": {} }));
    assert_eq!(map_status(&missing_counts).status, NodeStatus::ScaledDown);

    let unavailable = raw(json!({
        "kind": "Deployment",
        "spec": { "replicas": 1 },
        "status": { "availableReplicas": 1, "conditions": [{ "type": "Available", "status": "False" }] }
    }));
    assert_eq!(map_status(&unavailable).status, NodeStatus::Progressing);
}

#[test]
fn statefulset_daemonset_replicaset() {
    let sts = |ready: u64, desired: u64| {
        raw(json!({ "kind": "StatefulSet", "spec": { "replicas": desired }, "status": { "readyReplicas": ready } }))
    };
    assert_eq!(map_status(&sts(1, 1)), counted(NodeStatus::Running, 1, 1, "1/1 Ready"));
    assert_eq!(map_status(&sts(0, 1)), counted(NodeStatus::Pending, 0, 1, "0/1 Ready"));
    assert_eq!(map_status(&sts(0, 0)).status, NodeStatus::ScaledDown);

    let ds = |ready: u64, desired: u64| {
        raw(json!({ "kind": "DaemonSet", "status": { "numberReady": ready, "desiredNumberScheduled": desired } }))
    };
    assert_eq!(map_status(&ds(3, 3)), counted(NodeStatus::Running, 3, 3, "3/3 Ready"));
    assert_eq!(map_status(&ds(2, 3)), counted(NodeStatus::Pending, 2, 3, "2/3 Ready"));
    assert_eq!(map_status(&ds(0, 0)).status, NodeStatus::Idle);

    let rs = |ready: u64, desired: u64| {
        raw(json!({ "kind": "ReplicaSet", "spec": { "replicas": desired }, "status": { "availableReplicas": ready } }))
    };
    assert_eq!(map_status(&rs(1, 1)), counted(NodeStatus::Running, 1, 1, "1/1 Ready"));
    assert_eq!(map_status(&rs(0, 1)), counted(NodeStatus::Pending, 0, 1, "0/1 Ready"));
    assert_eq!(map_status(&rs(0, 0)).status, NodeStatus::ScaledDown);
}

#[test]
fn service_and_ingress_without_status_are_unknown() {
    let svc = raw(json!({ "kind": "Service", "spec": { "type": "ClusterIP" } }));
    assert_eq!(map_status(&svc), StatusSummary::unknown());
    let ing = raw(json!({ "kind": "Ingress", "spec": {} }));
    assert_eq!(map_status(&ing), StatusSummary::unknown());
}

#[test]
fn service_and_ingress_with_status_block() {
    let svc = raw(json!({ "kind": "Service", "spec": { "type": "ClusterIP" }, "status": { "loadBalancer": {} } }));
    assert_eq!(
        map_status(&svc),
        StatusSummary { status: NodeStatus::ClusterIP, health: None, label_details: Some("Type: ClusterIP".into()) }
    );
    let lb = raw(json!({ "kind": "Service", "spec": { "type": "LoadBalancer" }, "status": { "loadBalancer": {} } }));
    assert_eq!(map_status(&lb).status, NodeStatus::LoadBalancer);

    let untyped = raw(json!({ "kind": "Service", "spec": {}, "status": {} }));
    assert_eq!(map_status(&untyped), StatusSummary::unknown());

    let ing = raw(json!({ "kind": "Ingress", "spec": {}, "status": { "loadBalancer": {} } }));
    assert_eq!(map_status(&ing), StatusSummary { status: NodeStatus::Active, health: None, label_details: None });
}

#[test]
fn unknown_kind_or_missing_status() {
    let weird = raw(json!({ "kind": "CustomWeirdResource", "status": { "someStatus": "ok" } }));
    assert_eq!(map_status(&weird), StatusSummary::unknown());
    let no_status = raw(json!({ "kind": "Pod", "spec": {} }));
    assert_eq!(map_status(&no_status), StatusSummary::unknown());
    let no_kind = raw(json!({ "status": { "phase": "Running" } }));
    assert_eq!(map_status(&no_kind), StatusSummary::unknown());
    assert_eq!(map_status(&raw(json!(null))), StatusSummary::unknown());
}

#[test]
fn summary_serializes_camel_case() {
    let pod = raw(json!({
        "kind": "Pod",
        "spec": { "containers": [{}] },
        "status": { "phase": "Running", "containerStatuses": [{ "ready": true }] }
    }));
    let v = serde_json::to_value(map_status(&pod)).unwrap();
    assert_eq!(v, json!({ "status": "Running", "health": { "ready": 1, "desired": 1 }, "labelDetails": "1/1 Ready" }));
}

//! Status mapper: raw resource to semantic status, health and display summary.
//!
//! Total over its input: anything it does not understand maps to `Unknown`.

use serde_json::Value;

use crate::raw::{array_at, count_at, str_at, RawResource};
use crate::{NodeStatus, StatusSummary};

pub fn map_status(res: &RawResource) -> StatusSummary {
    let Some(kind) = res.kind() else {
        return StatusSummary::unknown();
    };
    let Some(status) = res.status.as_ref() else {
        return StatusSummary::unknown();
    };
    match kind {
        // present but uninformative status; reported from spec
        "Service" => service_status(res),
        "Ingress" => StatusSummary { status: NodeStatus::Active, ..Default::default() },
        "Pod" => pod_status(res, status),
        "Deployment" => deployment_status(res, status),
        "ReplicaSet" => {
            let ready = count_at(status, &["availableReplicas"]).unwrap_or(0);
            let desired = count_at(&res.spec, &["replicas"]).unwrap_or(0);
            StatusSummary::counted(replica_status(ready, desired), ready, desired)
        }
        "StatefulSet" => {
            let ready = count_at(status, &["readyReplicas"]).unwrap_or(0);
            let desired = count_at(&res.spec, &["replicas"]).unwrap_or(0);
            let s = if desired == 0 {
                NodeStatus::ScaledDown
            } else if ready >= desired {
                NodeStatus::Running
            } else {
                NodeStatus::Pending
            };
            StatusSummary::counted(s, ready, desired)
        }
        "DaemonSet" => {
            let ready = count_at(status, &["numberReady"]).unwrap_or(0);
            let desired = count_at(status, &["desiredNumberScheduled"]).unwrap_or(0);
            let s = if desired == 0 {
                NodeStatus::Idle
            } else if ready >= desired {
                NodeStatus::Running
            } else {
                NodeStatus::Pending
            };
            StatusSummary::counted(s, ready, desired)
        }
        _ => StatusSummary::unknown(),
    }
}

/// Replica comparison shared by Deployment and ReplicaSet.
fn replica_status(ready: u32, desired: u32) -> NodeStatus {
    if desired == 0 && ready == 0 {
        NodeStatus::ScaledDown
    } else if desired > 0 && ready < desired {
        NodeStatus::Pending
    } else {
        NodeStatus::Running
    }
}

fn pod_status(res: &RawResource, status: &Value) -> StatusSummary {
    let desired = array_at(&res.spec, &["containers"]).len().min(u32::MAX as usize) as u32;
    let ready = array_at(status, &["containerStatuses"])
        .iter()
        .filter(|cs| cs.get("ready").and_then(|r| r.as_bool()) == Some(true))
        .count()
        .min(u32::MAX as usize) as u32;
    let phase = str_at(status, &["phase"])
        .map(NodeStatus::from_phase)
        .unwrap_or(NodeStatus::Unknown);
    StatusSummary::counted(phase, ready, desired)
}

fn deployment_status(res: &RawResource, status: &Value) -> StatusSummary {
    let ready = count_at(status, &["availableReplicas"]).unwrap_or(0);
    let desired = count_at(&res.spec, &["replicas"]).unwrap_or(0);
    let mut s = replica_status(ready, desired);
    if s == NodeStatus::Running && condition_is(status, "Available", "False") {
        s = NodeStatus::Progressing;
    }
    StatusSummary::counted(s, ready, desired)
}

fn condition_is(status: &Value, ty: &str, want: &str) -> bool {
    array_at(status, &["conditions"]).iter().any(|c| {
        c.get("type").and_then(|x| x.as_str()) == Some(ty)
            && c.get("status").and_then(|x| x.as_str()) == Some(want)
    })
}

fn service_status(res: &RawResource) -> StatusSummary {
    match str_at(&res.spec, &["type"]) {
        Some(ty) => StatusSummary {
            status: NodeStatus::from_service_type(ty),
            health: None,
            label_details: Some(format!("Type: {}", ty)),
        },
        None => StatusSummary::unknown(),
    }
}

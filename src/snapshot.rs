//! Simplified snapshots of the Kubernetes objects the engine evaluates.
//!
//! Raw `k8s_openapi` objects are deeply optional; these mirrors flatten the
//! handful of fields the filter chains inspect so the rest of the crate
//! never touches `Option<Option<..>>` shapes.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Node, Pod};
use serde::{Deserialize, Serialize};

/// Kind of inbound notification for a pod key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodEventKind {
    Added,
    Modified,
    Deleted,
}

/// Owning controller reference carried into alert payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

/// One entry of a pod's condition list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodConditionSnapshot {
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

/// Terminated-state details, shared by current and last-terminated states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminatedState {
    pub reason: String,
    pub message: String,
    pub exit_code: i32,
    pub started_at: Option<DateTime<Utc>>,
}

/// Coarse container state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Waiting { reason: String, message: String },
    Terminated(TerminatedState),
}

impl Default for ContainerState {
    fn default() -> Self {
        Self::Waiting {
            reason: String::new(),
            message: String::new(),
        }
    }
}

/// Container status within a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStatusSnapshot {
    pub name: String,
    pub ready: bool,
    pub restart_count: i32,
    pub state: ContainerState,
    pub last_terminated: Option<TerminatedState>,
}

/// Pod fields the filter chains evaluate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    pub phase: String,
    pub owner_references: Vec<OwnerRef>,
    pub conditions: Vec<PodConditionSnapshot>,
    pub containers: Vec<ContainerStatusSnapshot>,
}

impl PodSnapshot {
    /// Find a condition by type.
    #[must_use]
    pub fn condition(&self, type_: &str) -> Option<&PodConditionSnapshot> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

impl From<&Pod> for PodSnapshot {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        Self {
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            name: pod.metadata.name.clone().unwrap_or_default(),
            phase: status
                .and_then(|s| s.phase.clone())
                .unwrap_or_default(),
            owner_references: pod
                .metadata
                .owner_references
                .iter()
                .flatten()
                .map(|o| OwnerRef {
                    kind: o.kind.clone(),
                    name: o.name.clone(),
                })
                .collect(),
            conditions: status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| PodConditionSnapshot {
                    type_: c.type_.clone(),
                    status: c.status.clone(),
                    reason: c.reason.clone().unwrap_or_default(),
                    message: c.message.clone().unwrap_or_default(),
                })
                .collect(),
            containers: status
                .and_then(|s| s.container_statuses.as_ref())
                .into_iter()
                .flatten()
                .map(ContainerStatusSnapshot::from)
                .collect(),
        }
    }
}

impl From<&ContainerStatus> for ContainerStatusSnapshot {
    fn from(cs: &ContainerStatus) -> Self {
        let state = cs.state.as_ref().map_or_else(ContainerState::default, |s| {
            if s.running.is_some() {
                ContainerState::Running
            } else if let Some(t) = &s.terminated {
                ContainerState::Terminated(TerminatedState {
                    reason: t.reason.clone().unwrap_or_default(),
                    message: t.message.clone().unwrap_or_default(),
                    exit_code: t.exit_code,
                    started_at: t.started_at.as_ref().map(|t| t.0),
                })
            } else if let Some(w) = &s.waiting {
                ContainerState::Waiting {
                    reason: w.reason.clone().unwrap_or_default(),
                    message: w.message.clone().unwrap_or_default(),
                }
            } else {
                ContainerState::default()
            }
        });

        let last_terminated = cs
            .last_state
            .as_ref()
            .and_then(|s| s.terminated.as_ref())
            .map(|t| TerminatedState {
                reason: t.reason.clone().unwrap_or_default(),
                message: t.message.clone().unwrap_or_default(),
                exit_code: t.exit_code,
                started_at: t.started_at.as_ref().map(|t| t.0),
            });

        Self {
            name: cs.name.clone(),
            ready: cs.ready,
            restart_count: cs.restart_count,
            state,
            last_terminated,
        }
    }
}

/// Node fields the node watcher evaluates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub name: String,
    pub ready: bool,
}

impl From<&Node> for NodeSnapshot {
    fn from(node: &Node) -> Self {
        let ready = node
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .into_iter()
            .flatten()
            .any(|c| c.type_ == "Ready" && c.status == "True");
        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState as K8sContainerState, ContainerStateTerminated, ContainerStateWaiting,
        NodeCondition, NodeStatus, PodCondition, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};

    fn terminated(reason: &str, exit_code: i32) -> K8sContainerState {
        K8sContainerState {
            terminated: Some(ContainerStateTerminated {
                reason: Some(reason.to_string()),
                exit_code,
                started_at: Some(Time(Utc::now())),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn pod_snapshot_flattens_conditions_and_containers() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("app-abc".to_string()),
                namespace: Some("default".to_string()),
                owner_references: Some(vec![OwnerReference {
                    kind: "ReplicaSet".to_string(),
                    name: "app-7f9".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                conditions: Some(vec![PodCondition {
                    type_: "ContainersReady".to_string(),
                    status: "False".to_string(),
                    reason: Some("ContainersNotReady".to_string()),
                    ..Default::default()
                }]),
                container_statuses: Some(vec![ContainerStatus {
                    name: "app".to_string(),
                    ready: false,
                    restart_count: 2,
                    state: Some(K8sContainerState {
                        waiting: Some(ContainerStateWaiting {
                            reason: Some("CrashLoopBackOff".to_string()),
                            message: None,
                        }),
                        ..Default::default()
                    }),
                    last_state: Some(terminated("Error", 1)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let snap = PodSnapshot::from(&pod);
        assert_eq!(snap.namespace, "default");
        assert_eq!(snap.name, "app-abc");
        assert_eq!(snap.owner_references[0].kind, "ReplicaSet");
        assert_eq!(
            snap.condition("ContainersReady").unwrap().status,
            "False"
        );
        let c = &snap.containers[0];
        assert_eq!(c.restart_count, 2);
        assert!(matches!(c.state, ContainerState::Waiting { ref reason, .. } if reason == "CrashLoopBackOff"));
        let last = c.last_terminated.as_ref().unwrap();
        assert_eq!(last.reason, "Error");
        assert_eq!(last.exit_code, 1);
    }

    #[test]
    fn missing_status_yields_empty_snapshot() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("bare".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let snap = PodSnapshot::from(&pod);
        assert!(snap.conditions.is_empty());
        assert!(snap.containers.is_empty());
        assert!(snap.phase.is_empty());
    }

    #[test]
    fn node_ready_flag_follows_ready_condition() {
        let node = Node {
            metadata: ObjectMeta {
                name: Some("worker-1".to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: "False".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let snap = NodeSnapshot::from(&node);
        assert_eq!(snap.name, "worker-1");
        assert!(!snap.ready);
    }
}

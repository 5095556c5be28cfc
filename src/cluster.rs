//! Lookup collaborators: owner chain, container logs, recent warning events.
//!
//! The filter chains only see the [`ClusterLookup`] trait; the live
//! implementation talks to the API server with every call bounded by the
//! configured timeout. Tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, ListParams, LogParams};
use kube::Client;
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::snapshot::OwnerRef;

/// A recent cluster event attached to alert payloads and consulted by the
/// pod-events and killing filters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WarningEvent {
    pub reason: String,
    pub message: String,
    pub type_: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Read-only lookups against cluster state.
#[async_trait]
pub trait ClusterLookup: Send + Sync {
    /// Resolve the top-level controller one hop beyond the immediate owner.
    async fn owner_chain(&self, namespace: &str, owner: &OwnerRef) -> Result<OwnerRef>;

    /// Fetch a bounded tail of container logs, previous instance when asked.
    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        previous: bool,
        tail_lines: i64,
    ) -> Result<String>;

    /// Recent events involving the given pod. Callers filter by type;
    /// graceful-shutdown "Killing" events are type Normal, so the lookup
    /// cannot restrict itself to Warnings.
    async fn recent_events(&self, namespace: &str, pod: &str) -> Result<Vec<WarningEvent>>;
}

/// Live implementation backed by the Kubernetes API server.
pub struct KubeCluster {
    client: Client,
    timeout: Duration,
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::LookupTimeout(self.timeout))?
            .map_err(Error::from)
    }

    fn first_controller_owner(owners: Option<&Vec<OwnerReference>>) -> Option<OwnerRef> {
        owners
            .into_iter()
            .flatten()
            .find(|o| o.controller.unwrap_or(false))
            .or_else(|| owners.into_iter().flatten().next())
            .map(|o| OwnerRef {
                kind: o.kind.clone(),
                name: o.name.clone(),
            })
    }
}

#[async_trait]
impl ClusterLookup for KubeCluster {
    async fn owner_chain(&self, namespace: &str, owner: &OwnerRef) -> Result<OwnerRef> {
        // One hop: a ReplicaSet/DaemonSet/StatefulSet may itself be owned by
        // the resource we actually want to report (e.g. a Deployment).
        let hop = match owner.kind.as_str() {
            "ReplicaSet" => {
                let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
                let rs = self.bounded(api.get(&owner.name)).await?;
                Self::first_controller_owner(rs.metadata.owner_references.as_ref())
            }
            "DaemonSet" => {
                let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
                let ds = self.bounded(api.get(&owner.name)).await?;
                Self::first_controller_owner(ds.metadata.owner_references.as_ref())
            }
            "StatefulSet" => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                let sts = self.bounded(api.get(&owner.name)).await?;
                Self::first_controller_owner(sts.metadata.owner_references.as_ref())
            }
            _ => None,
        };
        Ok(hop.unwrap_or_else(|| owner.clone()))
    }

    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        previous: bool,
        tail_lines: i64,
    ) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            previous,
            tail_lines: Some(tail_lines),
            ..Default::default()
        };
        self.bounded(api.logs(pod, &params)).await
    }

    async fn recent_events(&self, namespace: &str, pod: &str) -> Result<Vec<WarningEvent>> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().fields(&format!(
            "involvedObject.kind=Pod,involvedObject.name={pod}"
        ));
        let list = self.bounded(api.list(&params)).await?;
        Ok(list
            .items
            .into_iter()
            .map(|e| WarningEvent {
                reason: e.reason.unwrap_or_default(),
                message: e.message.unwrap_or_default(),
                type_: e.type_.unwrap_or_default(),
                timestamp: e.last_timestamp.map(|t| t.0),
            })
            .collect())
    }
}

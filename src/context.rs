//! Per-pod evaluation scratch state threaded through both filter chains.
//!
//! One context is owned exclusively by one worker for the duration of one
//! (namespace, pod) evaluation pass. It is never shared across tasks.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cluster::{ClusterLookup, WarningEvent};
use crate::config::Config;
use crate::error::Result;
use crate::snapshot::{ContainerStatusSnapshot, OwnerRef, PodEventKind, PodSnapshot};
use crate::store::{ConditionRecord, DedupStore, StatusLabel};

/// How the pod-level chain classified this pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PodIssueKind {
    #[default]
    None,
    PodLevel,
    ContainerLevel,
}

/// Scratch state for the container currently being evaluated.
#[derive(Debug, Clone, Default)]
pub struct ContainerContext {
    /// Raw status entry this context was scoped to.
    pub snapshot: ContainerStatusSnapshot,
    pub name: String,
    pub restart_count: i32,
    pub reason: String,
    pub message: String,
    pub exit_code: i32,
    pub status: StatusLabel,
    pub has_restarts: bool,
    pub last_terminated_on: Option<DateTime<Utc>>,
    pub logs: String,
    /// Set by the name filter; no record is written for ignored containers.
    pub ignored: bool,
    /// Set by the state filter when the container is healthy again.
    pub recovered: bool,
}

impl ContainerContext {
    #[must_use]
    pub fn for_container(status: &ContainerStatusSnapshot) -> Self {
        Self {
            snapshot: status.clone(),
            name: status.name.clone(),
            restart_count: status.restart_count,
            ..Self::default()
        }
    }

    /// The record this pass would store for the container.
    #[must_use]
    pub fn to_record(&self) -> ConditionRecord {
        ConditionRecord {
            restart_count: self.restart_count,
            last_terminated_on: self.last_terminated_on,
            reason: self.reason.clone(),
            message: self.message.clone(),
            exit_code: self.exit_code,
            status: self.status,
        }
    }
}

/// Mutable evaluation state for one (namespace, pod) pass.
pub struct EvaluationContext {
    pub event: PodEventKind,
    pub pod: PodSnapshot,
    pub issue: PodIssueKind,
    pub pod_reason: String,
    pub pod_message: String,
    /// Current container scratch while iterating the container chain.
    pub container: ContainerContext,
    /// Owner reference resolved lazily, cached for the pass. Outer `None`
    /// means not yet resolved; inner `None` means the pod has no owner.
    owner: Option<Option<OwnerRef>>,
    /// Pod events fetched lazily, cached for the pass.
    events: Option<Vec<WarningEvent>>,

    pub config: Arc<Config>,
    pub store: Arc<DedupStore>,
    lookup: Arc<dyn ClusterLookup>,
}

impl EvaluationContext {
    #[must_use]
    pub fn new(
        event: PodEventKind,
        pod: PodSnapshot,
        config: Arc<Config>,
        store: Arc<DedupStore>,
        lookup: Arc<dyn ClusterLookup>,
    ) -> Self {
        Self {
            event,
            pod,
            issue: PodIssueKind::None,
            pod_reason: String::new(),
            pod_message: String::new(),
            container: ContainerContext::default(),
            owner: None,
            events: None,
            config,
            store,
            lookup,
        }
    }

    /// Fetch-and-cache the pod's recent events.
    pub async fn events(&mut self) -> Result<&[WarningEvent]> {
        if self.events.is_none() {
            let fetched = self
                .lookup
                .recent_events(&self.pod.namespace, &self.pod.name)
                .await?;
            self.events = Some(fetched);
        }
        Ok(self.events.as_deref().unwrap_or_default())
    }

    /// Events if they were already fetched during this pass.
    #[must_use]
    pub fn cached_events(&self) -> &[WarningEvent] {
        self.events.as_deref().unwrap_or_default()
    }

    /// Resolve-and-cache the owning controller reference.
    pub async fn owner(&mut self) -> Option<OwnerRef> {
        if self.owner.is_none() {
            let resolved = match self.pod.owner_references.first() {
                Some(immediate) => {
                    match self
                        .lookup
                        .owner_chain(&self.pod.namespace, immediate)
                        .await
                    {
                        Ok(top) => Some(top),
                        Err(e) => {
                            // Owner is enrichment only; fall back to the
                            // immediate reference rather than failing the pass.
                            tracing::warn!(
                                namespace = %self.pod.namespace,
                                pod = %self.pod.name,
                                error = %e,
                                "Owner chain resolution failed, using immediate owner"
                            );
                            Some(immediate.clone())
                        }
                    }
                }
                None => None,
            };
            self.owner = Some(resolved);
        }
        self.owner.clone().flatten()
    }

    /// Owner if it was already resolved during this pass.
    #[must_use]
    pub fn cached_owner(&self) -> Option<OwnerRef> {
        self.owner.clone().flatten()
    }

    pub fn lookup(&self) -> &Arc<dyn ClusterLookup> {
        &self.lookup
    }
}

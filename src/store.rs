//! Dedup state: the last-known condition per pod/container key, plus the
//! coarser node-not-ready set.
//!
//! Backed by `DashMap` so all workers can read and write concurrently; a
//! single key's read-modify-write goes through the entry API and is atomic.
//! The store is an owned instance injected into the controller, never a
//! global, so tests can instantiate isolated stores.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;

/// Container key denoting the pod itself rather than a specific container.
pub const POD_LEVEL_KEY: &str = ".";

/// Coarse status label computed by the container state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusLabel {
    #[default]
    Waiting,
    Running,
    Terminated,
}

impl StatusLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Terminated => "terminated",
        }
    }
}

/// Stored snapshot of the last reported condition for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionRecord {
    pub restart_count: i32,
    pub last_terminated_on: Option<DateTime<Utc>>,
    pub reason: String,
    pub message: String,
    pub exit_code: i32,
    pub status: StatusLabel,
}

impl ConditionRecord {
    /// Whether a freshly computed condition would re-alert against this one.
    ///
    /// An alert fires only when reason, message, or exit code differ, or the
    /// last-terminated timestamp moved; a terminated container re-observed
    /// with identical metadata must not re-alert.
    #[must_use]
    pub fn same_alert_identity(&self, other: &Self) -> bool {
        self.reason == other.reason
            && self.message == other.message
            && self.exit_code == other.exit_code
            && self.last_terminated_on == other.last_terminated_on
    }
}

type PodKeyPair = (String, String);

/// Keyed dedup state shared by all workers.
#[derive(Debug, Default)]
pub struct DedupStore {
    records: DashMap<PodKeyPair, HashMap<String, ConditionRecord>>,
    nodes: DashMap<String, ()>,
}

impl DedupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for a key. Idempotent.
    pub fn put(&self, namespace: &str, pod: &str, container: &str, record: ConditionRecord) {
        self.records
            .entry((namespace.to_string(), pod.to_string()))
            .or_default()
            .insert(container.to_string(), record);
    }

    /// Lookup with no side effects.
    #[must_use]
    pub fn get(&self, namespace: &str, pod: &str, container: &str) -> Option<ConditionRecord> {
        self.records
            .get(&(namespace.to_string(), pod.to_string()))
            .and_then(|entries| entries.get(container).cloned())
    }

    /// Remove one container entry; used when a container recovers.
    pub fn remove(&self, namespace: &str, pod: &str, container: &str) {
        let key = (namespace.to_string(), pod.to_string());
        if let Some(mut entries) = self.records.get_mut(&key) {
            entries.remove(container);
        }
        self.records.remove_if(&key, |_, entries| entries.is_empty());
    }

    /// Remove every entry under a pod key; used on pod deletion.
    pub fn remove_pod(&self, namespace: &str, pod: &str) {
        self.records
            .remove(&(namespace.to_string(), pod.to_string()));
    }

    /// Number of tracked container entries under a pod, for tests and logs.
    #[must_use]
    pub fn pod_entry_count(&self, namespace: &str, pod: &str) -> usize {
        self.records
            .get(&(namespace.to_string(), pod.to_string()))
            .map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn add_node(&self, name: &str) {
        self.nodes.insert(name.to_string(), ());
    }

    pub fn del_node(&self, name: &str) {
        self.nodes.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(reason: &str, exit_code: i32) -> ConditionRecord {
        ConditionRecord {
            reason: reason.to_string(),
            exit_code,
            ..Default::default()
        }
    }

    #[test]
    fn put_overwrites_existing_record() {
        let store = DedupStore::new();
        store.put("ns", "pod", "app", record("Error", 1));
        store.put("ns", "pod", "app", record("OOMKilled", 137));
        let got = store.get("ns", "pod", "app").unwrap();
        assert_eq!(got.reason, "OOMKilled");
        assert_eq!(got.exit_code, 137);
    }

    #[test]
    fn get_absent_key_returns_none() {
        let store = DedupStore::new();
        assert!(store.get("ns", "pod", "app").is_none());
    }

    #[test]
    fn remove_pod_cleans_all_container_entries() {
        // Deleted pod with records for two containers
        let store = DedupStore::new();
        store.put("ns", "pod", "app", record("Error", 1));
        store.put("ns", "pod", "sidecar", record("OOMKilled", 137));
        assert_eq!(store.pod_entry_count("ns", "pod"), 2);

        store.remove_pod("ns", "pod");
        assert!(store.get("ns", "pod", "app").is_none());
        assert!(store.get("ns", "pod", "sidecar").is_none());
        assert_eq!(store.pod_entry_count("ns", "pod"), 0);
    }

    #[test]
    fn remove_single_container_keeps_siblings() {
        let store = DedupStore::new();
        store.put("ns", "pod", "app", record("Error", 1));
        store.put("ns", "pod", POD_LEVEL_KEY, record("Unschedulable", 0));
        store.remove("ns", "pod", "app");
        assert!(store.get("ns", "pod", "app").is_none());
        assert!(store.get("ns", "pod", POD_LEVEL_KEY).is_some());
    }

    #[test]
    fn alert_identity_ignores_restart_count_and_status() {
        let mut a = record("Error", 1);
        let mut b = record("Error", 1);
        a.restart_count = 3;
        b.restart_count = 7;
        a.status = StatusLabel::Waiting;
        b.status = StatusLabel::Terminated;
        assert!(a.same_alert_identity(&b));
    }

    #[test]
    fn alert_identity_differs_on_terminated_timestamp() {
        let mut a = record("Error", 1);
        let mut b = record("Error", 1);
        a.last_terminated_on = Some(Utc::now());
        b.last_terminated_on = None;
        assert!(!a.same_alert_identity(&b));
    }

    #[test]
    fn node_set_add_has_del() {
        let store = DedupStore::new();
        assert!(!store.has_node("worker-1"));
        store.add_node("worker-1");
        assert!(store.has_node("worker-1"));
        store.del_node("worker-1");
        assert!(!store.has_node("worker-1"));
    }
}

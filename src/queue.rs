//! Rate-limited, deduplicating, retrying work queue.
//!
//! Keys move through `Queued -> Processing -> {Forgotten | Requeued |
//! Abandoned}`. A key enqueued while queued coalesces into the pending pass;
//! a key enqueued while processing is marked dirty and re-queued when the
//! current pass finishes, so no two workers ever hold the same key at once.
//! Failures requeue with exponential backoff up to the policy's attempt
//! budget; beyond that the key is dropped and reported out-of-band.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Queue key for one pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Explicit backoff policy so tests can run with deterministic timing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-based), doubling per attempt
    /// up to the ceiling.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1_u32 << shift);
        delay.min(self.max_delay)
    }
}

/// Outcome of finishing one processing pass for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// Pass succeeded; retry counter forgotten.
    Forgotten,
    /// Pass failed; key scheduled for a delayed retry.
    Requeued { attempt: u32 },
    /// Retry budget exhausted; key dropped.
    Abandoned { attempts: u32 },
}

struct Inner<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    failures: HashMap<K, u32>,
}

impl<K> Default for Inner<K> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            failures: HashMap::new(),
        }
    }
}

pub struct WorkQueue<K: Eq + Hash + Clone + fmt::Display + Send + 'static> {
    // Shared behind Arcs so delayed-requeue tasks outlive the borrow.
    inner: Arc<Mutex<Inner<K>>>,
    notify: Arc<Notify>,
    policy: RetryPolicy,
    shutting_down: AtomicBool,
}

impl<K: Eq + Hash + Clone + fmt::Display + Send + 'static> WorkQueue<K> {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            notify: Arc::new(Notify::new()),
            policy,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Enqueue a key. Duplicate enqueues before the key is popped coalesce
    /// into one pending pass.
    pub fn add(&self, key: K) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.dirty.contains(&key) {
            return;
        }
        inner.dirty.insert(key.clone());
        if inner.processing.contains(&key) {
            // Re-queued by done() once the current pass finishes.
            return;
        }
        inner.queue.push_back(key);
        drop(inner);
        self.notify.notify_one();
    }

    /// Pop the next key, waiting while the queue is empty. Returns `None`
    /// once the queue is shut down and drained.
    pub async fn pop(&self) -> Option<K> {
        loop {
            // Created before the condition check: a `Notified` observes
            // `notify_waiters` calls issued any time after creation, so a
            // shutdown racing the check cannot slip between the lock release
            // and the await.
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                if let Some(key) = inner.queue.pop_front() {
                    inner.dirty.remove(&key);
                    inner.processing.insert(key.clone());
                    return Some(key);
                }
                if self.shutting_down.load(Ordering::SeqCst) {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark a pass finished. On success the retry counter resets; on error
    /// the key is re-added after backoff until the budget runs out.
    pub fn finish(&self, key: &K, succeeded: bool) -> Finish {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.processing.remove(key);

        if succeeded {
            inner.failures.remove(key);
            // A new event arrived while we were processing; run again.
            if inner.dirty.contains(key) {
                inner.queue.push_back(key.clone());
                drop(inner);
                self.notify.notify_one();
            }
            return Finish::Forgotten;
        }

        let attempt = inner.failures.entry(key.clone()).or_insert(0);
        *attempt += 1;
        let attempt = *attempt;

        if attempt > self.policy.max_retries {
            inner.failures.remove(key);
            inner.dirty.remove(key);
            warn!(key = %key, attempts = attempt, "Retry budget exhausted, dropping key");
            return Finish::Abandoned { attempts: attempt };
        }

        inner.dirty.insert(key.clone());
        drop(inner);

        let delay = self.policy.delay(attempt);
        debug!(key = %key, attempt, ?delay, "Requeueing after backoff");
        let inner = Arc::clone(&self.inner);
        let notify = Arc::clone(&self.notify);
        let key = key.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = inner.lock().expect("queue lock poisoned");
            // Still dirty and not picked up through another path.
            if inner.dirty.contains(&key) && !inner.processing.contains(&key) {
                inner.queue.push_back(key);
                drop(inner);
                notify.notify_one();
            }
        });
        Finish::Requeued { attempt }
    }

    /// Stop accepting the wait loop; workers drain what is queued and exit.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> Arc<WorkQueue<PodKey>> {
        Arc::new(WorkQueue::new(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }))
    }

    fn key() -> PodKey {
        PodKey::new("ns", "app")
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(350));
        assert_eq!(policy.delay(10), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn duplicate_adds_coalesce() {
        let q = queue();
        q.add(key());
        q.add(key());
        q.add(key());
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().await, Some(key()));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn add_while_processing_requeues_after_done() {
        let q = queue();
        q.add(key());
        let popped = q.pop().await.unwrap();
        // Arrives mid-pass: must not enter the queue yet.
        q.add(key());
        assert!(q.is_empty());

        assert_eq!(q.finish(&popped, true), Finish::Forgotten);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().await, Some(key()));
    }

    #[tokio::test]
    async fn failure_requeues_until_budget_then_abandons() {
        let q = queue();
        q.add(key());

        let k = q.pop().await.unwrap();
        assert_eq!(q.finish(&k, false), Finish::Requeued { attempt: 1 });
        let k = q.pop().await.unwrap();
        assert_eq!(q.finish(&k, false), Finish::Requeued { attempt: 2 });
        let k = q.pop().await.unwrap();
        assert_eq!(q.finish(&k, false), Finish::Abandoned { attempts: 3 });
    }

    #[tokio::test]
    async fn success_resets_retry_counter() {
        let q = queue();
        q.add(key());
        let k = q.pop().await.unwrap();
        assert_eq!(q.finish(&k, false), Finish::Requeued { attempt: 1 });

        let k = q.pop().await.unwrap();
        assert_eq!(q.finish(&k, true), Finish::Forgotten);

        q.add(key());
        let k = q.pop().await.unwrap();
        // Counter restarted from zero.
        assert_eq!(q.finish(&k, false), Finish::Requeued { attempt: 1 });
    }

    #[tokio::test]
    async fn shutdown_unblocks_waiting_workers() {
        let q = queue();
        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await })
        };
        tokio::task::yield_now().await;
        q.shutdown();
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_racing_an_empty_pop_still_unblocks() {
        // Shutdown may land between a worker observing the empty queue and
        // parking on the notifier; the wakeup must not be lost.
        for _ in 0..100 {
            let q = queue();
            let waiter = {
                let q = Arc::clone(&q);
                tokio::spawn(async move { q.pop().await })
            };
            q.shutdown();
            let popped = tokio::time::timeout(Duration::from_secs(5), waiter)
                .await
                .expect("worker must observe shutdown")
                .unwrap();
            assert_eq!(popped, None);
        }
    }

    #[tokio::test]
    async fn distinct_keys_process_in_parallel() {
        let q = queue();
        q.add(PodKey::new("ns", "a"));
        q.add(PodKey::new("ns", "b"));
        let first = q.pop().await.unwrap();
        let second = q.pop().await.unwrap();
        assert_ne!(first, second);
    }
}

//! The controller: owns the queue, the dedup store, both filter chains, and
//! the dispatcher, and drives evaluation of every (namespace, pod) key.
//!
//! A watcher task folds pod watch events into a latest-state cache and
//! enqueues keys; workers pop keys and evaluate the newest snapshot, so
//! multiple watch events before a pop coalesce into a single pass. DELETED
//! notifications short-circuit straight to the dedup store and never touch
//! the filter chains.

use dashmap::DashMap;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::runtime::watcher;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::cluster::ClusterLookup;
use crate::config::Config;
use crate::context::{ContainerContext, EvaluationContext, PodIssueKind};
use crate::dispatch::{AlertPayload, Dispatcher};
use crate::error::{Error, Result};
use crate::filters::FilterChain;
use crate::queue::{Finish, PodKey, RetryPolicy, WorkQueue};
use crate::snapshot::{NodeSnapshot, PodEventKind, PodSnapshot};
use crate::store::{DedupStore, POD_LEVEL_KEY};

/// Latest observed state for a key, written by the watcher task.
#[derive(Debug, Clone)]
struct PodEntry {
    kind: PodEventKind,
    snapshot: PodSnapshot,
}

pub struct Controller {
    config: Arc<Config>,
    store: Arc<DedupStore>,
    queue: Arc<WorkQueue<PodKey>>,
    cache: DashMap<PodKey, PodEntry>,
    lookup: Arc<dyn ClusterLookup>,
    dispatcher: Arc<Dispatcher>,
    pod_chain: FilterChain,
    container_chain: FilterChain,
    errors_tx: mpsc::UnboundedSender<(PodKey, Error)>,
}

impl Controller {
    /// Build a controller plus the out-of-band channel where abandoned keys
    /// surface.
    pub fn new(
        config: Arc<Config>,
        store: Arc<DedupStore>,
        lookup: Arc<dyn ClusterLookup>,
        dispatcher: Arc<Dispatcher>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(PodKey, Error)>) {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let controller = Arc::new(Self {
            queue: Arc::new(WorkQueue::new(RetryPolicy::from(&config.retry))),
            cache: DashMap::new(),
            store,
            lookup,
            dispatcher,
            pod_chain: FilterChain::pod_chain(),
            container_chain: FilterChain::container_chain(),
            errors_tx,
            config,
        });
        (controller, errors_rx)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<DedupStore> {
        &self.store
    }

    /// Record an inbound pod notification and enqueue its key.
    pub fn observe_pod(&self, snapshot: PodSnapshot, deleted: bool) {
        let key = PodKey::new(snapshot.namespace.clone(), snapshot.name.clone());
        let kind = if deleted {
            PodEventKind::Deleted
        } else if self.cache.contains_key(&key) {
            PodEventKind::Modified
        } else {
            PodEventKind::Added
        };
        self.cache.insert(key.clone(), PodEntry { kind, snapshot });
        self.queue.add(key);
    }

    /// Process one key end to end. Errors here are transient and requeued by
    /// the caller.
    pub async fn process_key(&self, key: &PodKey) -> Result<()> {
        let Some(entry) = self.cache.get(key).map(|e| e.clone()) else {
            return Ok(());
        };
        if entry.kind == PodEventKind::Deleted {
            debug!(key = %key, "Pod deleted, clearing dedup state");
            self.store.remove_pod(&key.namespace, &key.name);
            self.cache.remove(key);
            return Ok(());
        }
        self.evaluate(entry.kind, entry.snapshot).await.map(|_| ())
    }

    /// Run both chains for one snapshot; returns the number of alerts
    /// dispatched.
    pub async fn evaluate(&self, kind: PodEventKind, snapshot: PodSnapshot) -> Result<usize> {
        let containers = snapshot.containers.clone();
        let mut ctx = EvaluationContext::new(
            kind,
            snapshot,
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::clone(&self.lookup),
        );

        let stopped = self.pod_chain.run(&mut ctx).await?;

        match ctx.issue {
            PodIssueKind::None => Ok(0),
            PodIssueKind::PodLevel => {
                // The sentinel record always tracks the latest known
                // condition; the alert only fires for a fresh one.
                self.store.put(
                    &ctx.pod.namespace,
                    &ctx.pod.name,
                    POD_LEVEL_KEY,
                    crate::store::ConditionRecord {
                        reason: ctx.pod_reason.clone(),
                        message: ctx.pod_message.clone(),
                        ..Default::default()
                    },
                );
                if stopped {
                    return Ok(0);
                }
                let payload = self.pod_payload(&mut ctx).await;
                self.dispatcher.dispatch(&payload).await;
                Ok(1)
            }
            PodIssueKind::ContainerLevel => {
                let mut dispatched = 0;
                for status in &containers {
                    ctx.container = ContainerContext::for_container(status);
                    let stopped = self.container_chain.run(&mut ctx).await?;
                    if ctx.container.ignored {
                        continue;
                    }
                    if ctx.container.recovered {
                        self.store
                            .remove(&ctx.pod.namespace, &ctx.pod.name, &ctx.container.name);
                        continue;
                    }
                    self.store.put(
                        &ctx.pod.namespace,
                        &ctx.pod.name,
                        &ctx.container.name,
                        ctx.container.to_record(),
                    );
                    if !stopped {
                        let payload = self.container_payload(&mut ctx).await;
                        self.dispatcher.dispatch(&payload).await;
                        dispatched += 1;
                    }
                }
                Ok(dispatched)
            }
        }
    }

    async fn pod_payload(&self, ctx: &mut EvaluationContext) -> AlertPayload {
        AlertPayload {
            cluster: self.config.cluster_name.clone(),
            namespace: ctx.pod.namespace.clone(),
            pod: ctx.pod.name.clone(),
            container: String::new(),
            reason: ctx.pod_reason.clone(),
            message: ctx.pod_message.clone(),
            logs: String::new(),
            events: self.event_excerpt(ctx).await,
            owner: ctx.owner().await,
            timestamp: chrono::Utc::now(),
        }
    }

    async fn container_payload(&self, ctx: &mut EvaluationContext) -> AlertPayload {
        AlertPayload {
            cluster: self.config.cluster_name.clone(),
            namespace: ctx.pod.namespace.clone(),
            pod: ctx.pod.name.clone(),
            container: ctx.container.name.clone(),
            reason: ctx.container.reason.clone(),
            message: ctx.container.message.clone(),
            logs: ctx.container.logs.clone(),
            events: self.event_excerpt(ctx).await,
            owner: ctx.cached_owner(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Event excerpts are enrichment; a failed fetch at dispatch time must
    /// not cost the alert.
    async fn event_excerpt(&self, ctx: &mut EvaluationContext) -> Vec<crate::cluster::WarningEvent> {
        match ctx.events().await {
            Ok(events) => events.to_vec(),
            Err(e) => {
                warn!(
                    namespace = %ctx.pod.namespace,
                    pod = %ctx.pod.name,
                    error = %e,
                    "Event fetch failed, alerting without excerpts"
                );
                vec![]
            }
        }
    }

    /// One node ready/not-ready transition, deduplicated by the node set.
    pub async fn observe_node(&self, node: NodeSnapshot, deleted: bool) {
        if deleted {
            self.store.del_node(&node.name);
            return;
        }
        if !node.ready && !self.store.has_node(&node.name) {
            self.store.add_node(&node.name);
            warn!(node = %node.name, "Node is not ready");
            self.dispatcher
                .dispatch_plain_message(&format!("Node `{}` is not ready", node.name))
                .await;
        } else if node.ready && self.store.has_node(&node.name) {
            self.store.del_node(&node.name);
            info!(node = %node.name, "Node is ready again");
            self.dispatcher
                .dispatch_plain_message(&format!("Node `{}` is ready again", node.name))
                .await;
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        debug!(worker_id, "Worker started");
        while let Some(key) = self.queue.pop().await {
            match self.process_key(&key).await {
                Ok(()) => {
                    self.queue.finish(&key, true);
                }
                Err(e) => {
                    warn!(worker_id, key = %key, error = %e, "Evaluation failed");
                    if let Finish::Abandoned { attempts } = self.queue.finish(&key, false) {
                        error!(key = %key, attempts, "Dropping key after retry budget");
                        let _ = self.errors_tx.send((key, e));
                    }
                }
            }
        }
        debug!(worker_id, "Worker stopped");
    }

    /// Establish the inbound watch streams and run until shutdown. Workers
    /// finish their current key before observing shutdown.
    pub async fn run(
        self: Arc<Self>,
        client: Client,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!(workers = self.config.workers, "Starting controller");

        let pods: Api<Pod> = Api::all(client.clone());
        let nodes: Api<Node> = Api::all(client);
        let watcher_config = watcher::Config::default().any_semantic();

        let pod_watch = tokio::spawn({
            let controller = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            let mut stream = watcher(pods, watcher_config.clone()).boxed();
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        event = stream.next() => match event {
                            Some(Ok(watcher::Event::Apply(pod) | watcher::Event::InitApply(pod))) => {
                                controller.observe_pod(PodSnapshot::from(&pod), false);
                            }
                            Some(Ok(watcher::Event::Delete(pod))) => {
                                controller.observe_pod(PodSnapshot::from(&pod), true);
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "Pod watch error, stream will retry");
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        let node_watch = tokio::spawn({
            let controller = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            let mut stream = watcher(nodes, watcher_config).boxed();
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        event = stream.next() => match event {
                            Some(Ok(watcher::Event::Apply(node) | watcher::Event::InitApply(node))) => {
                                controller.observe_node(NodeSnapshot::from(&node), false).await;
                            }
                            Some(Ok(watcher::Event::Delete(node))) => {
                                controller.observe_node(NodeSnapshot::from(&node), true).await;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "Node watch error, stream will retry");
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        let workers: Vec<_> = (0..self.config.workers)
            .map(|worker_id| tokio::spawn(Arc::clone(&self).worker_loop(worker_id)))
            .collect();

        let _ = shutdown.changed().await;
        info!("Shutdown signal received, draining workers");
        self.queue.shutdown();

        for worker in workers {
            let _ = worker.await;
        }
        pod_watch.abort();
        node_watch.abort();
        info!("Controller stopped");
        Ok(())
    }
}

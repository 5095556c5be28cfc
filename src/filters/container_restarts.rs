//! Computes whether the container restarted since the last stored pass.
//! Never stops the chain.

use async_trait::async_trait;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;

pub struct ContainerRestartsFilter;

#[async_trait]
impl Filter for ContainerRestartsFilter {
    fn name(&self) -> &'static str {
        "container-restarts"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        let stored = ctx
            .store
            .get(&ctx.pod.namespace, &ctx.pod.name, &ctx.container.name);
        // Strictly greater-than: a decreasing count (stale cache, restarted
        // kubelet) must compute false, not underflow or panic.
        ctx.container.has_restarts = stored
            .map_or(false, |r| ctx.container.restart_count > r.restart_count);
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{context_with, pod, running_container, scope_container, FakeLookup};
    use super::*;
    use crate::config::Config;
    use crate::store::{ConditionRecord, DedupStore};

    fn stored(restart_count: i32) -> ConditionRecord {
        ConditionRecord {
            restart_count,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn no_stored_record_means_no_restarts() {
        let mut ctx = context_with(
            pod("ns", "app"),
            FakeLookup::default(),
            Config::default_with_serde(),
            DedupStore::new(),
        );
        scope_container(&mut ctx, &running_container("app", 5));
        assert!(!ContainerRestartsFilter.execute(&mut ctx).await.unwrap());
        assert!(!ctx.container.has_restarts);
    }

    #[tokio::test]
    async fn higher_count_sets_has_restarts() {
        let store = DedupStore::new();
        store.put("ns", "app", "app", stored(1));
        let mut ctx = context_with(
            pod("ns", "app"),
            FakeLookup::default(),
            Config::default_with_serde(),
            store,
        );
        scope_container(&mut ctx, &running_container("app", 2));
        ContainerRestartsFilter.execute(&mut ctx).await.unwrap();
        assert!(ctx.container.has_restarts);
    }

    #[tokio::test]
    async fn decreasing_count_computes_false() {
        // Cannot happen in a real cluster, but must not misfire.
        let store = DedupStore::new();
        store.put("ns", "app", "app", stored(7));
        let mut ctx = context_with(
            pod("ns", "app"),
            FakeLookup::default(),
            Config::default_with_serde(),
            store,
        );
        scope_container(&mut ctx, &running_container("app", 3));
        ContainerRestartsFilter.execute(&mut ctx).await.unwrap();
        assert!(!ctx.container.has_restarts);
    }
}

//! Ignore-list for container names (sidecars, injected proxies).

use async_trait::async_trait;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;

pub struct ContainerNameFilter;

#[async_trait]
impl Filter for ContainerNameFilter {
    fn name(&self) -> &'static str {
        "container-name"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        if ctx
            .config
            .ignored_containers
            .iter()
            .any(|n| n == &ctx.container.name)
        {
            ctx.container.ignored = true;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{context_with, pod, running_container, scope_container, FakeLookup};
    use super::*;
    use crate::config::Config;
    use crate::store::DedupStore;

    #[tokio::test]
    async fn ignored_container_stops_and_is_marked() {
        let mut config = Config::default_with_serde();
        config.ignored_containers = vec!["istio-proxy".to_string()];
        let mut ctx = context_with(
            pod("ns", "app"),
            FakeLookup::default(),
            config,
            DedupStore::new(),
        );
        scope_container(&mut ctx, &running_container("istio-proxy", 0));
        assert!(ContainerNameFilter.execute(&mut ctx).await.unwrap());
        assert!(ctx.container.ignored);
    }

    #[tokio::test]
    async fn other_containers_pass() {
        let mut config = Config::default_with_serde();
        config.ignored_containers = vec!["istio-proxy".to_string()];
        let mut ctx = context_with(
            pod("ns", "app"),
            FakeLookup::default(),
            config,
            DedupStore::new(),
        );
        scope_container(&mut ctx, &running_container("app", 0));
        assert!(!ContainerNameFilter.execute(&mut ctx).await.unwrap());
        assert!(!ctx.container.ignored);
    }
}

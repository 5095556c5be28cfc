//! Attaches a bounded log tail to the context. Logs are enrichment, not a
//! filtering decision: this unit never stops the chain, and a failed fetch
//! degrades to empty logs instead of failing the pass (a container that
//! never started has none to give).

use async_trait::async_trait;
use tracing::warn;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::store::StatusLabel;

pub struct ContainerLogsFilter;

#[async_trait]
impl Filter for ContainerLogsFilter {
    fn name(&self) -> &'static str {
        "container-logs"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        // After a restart the failing output lives in the previous instance.
        let previous =
            ctx.container.has_restarts && ctx.container.status == StatusLabel::Running;
        let fetched = ctx
            .lookup()
            .clone()
            .container_logs(
                &ctx.pod.namespace,
                &ctx.pod.name,
                &ctx.container.name,
                previous,
                ctx.config.max_log_lines,
            )
            .await;
        match fetched {
            Ok(logs) => ctx.container.logs = logs,
            Err(e) => {
                warn!(
                    namespace = %ctx.pod.namespace,
                    pod = %ctx.pod.name,
                    container = %ctx.container.name,
                    error = %e,
                    "Log fetch failed, continuing without logs"
                );
                ctx.container.logs = String::new();
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{
        context_for, pod, running_container, scope_container, FakeLookup,
    };
    use super::*;

    #[tokio::test]
    async fn attaches_logs_and_never_stops() {
        let lookup = FakeLookup {
            logs: "panic: boom\n".to_string(),
            ..FakeLookup::default()
        };
        let mut ctx = context_for(pod("ns", "app"), lookup);
        scope_container(&mut ctx, &running_container("app", 1));
        assert!(!ContainerLogsFilter.execute(&mut ctx).await.unwrap());
        assert_eq!(ctx.container.logs, "panic: boom\n");
    }
}

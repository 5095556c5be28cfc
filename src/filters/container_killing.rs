//! Suppresses containers stopped by a controlled shutdown during rollouts.
//!
//! Only active when the ignore-failed-graceful-shutdown policy is set: a
//! "Killing" event saying "Stopping container <name>" marks the termination
//! as orchestrated, even when the exit code looks like a crash (137).

use async_trait::async_trait;

use super::Filter;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::store::StatusLabel;

pub struct ContainerKillingFilter;

#[async_trait]
impl Filter for ContainerKillingFilter {
    fn name(&self) -> &'static str {
        "container-killing"
    }

    async fn execute(&self, ctx: &mut EvaluationContext) -> Result<bool> {
        if !ctx.config.ignore_failed_graceful_shutdown {
            return Ok(false);
        }
        if !matches!(
            ctx.container.status,
            StatusLabel::Terminated | StatusLabel::Waiting
        ) {
            return Ok(false);
        }
        let needle = format!("Stopping container {}", ctx.container.name);
        let killed = ctx
            .events()
            .await?
            .iter()
            .any(|e| e.reason == "Killing" && e.message.contains(&needle));
        Ok(killed)
    }
}

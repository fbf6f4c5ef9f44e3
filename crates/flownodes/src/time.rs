use async_trait::async_trait;
use flowcore::{ActivityContext, ActivityError, ActivityExecutor};
use serde::Deserialize;
use tokio::time::{sleep, Duration};

fn default_duration() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DelayConfig {
    #[serde(default = "default_duration")]
    pub duration_ms: u64,
}

/// Delay execution for a specified duration
#[derive(Default)]
pub struct DelayExecutor;

#[async_trait]
impl ActivityExecutor for DelayExecutor {
    type Config = DelayConfig;

    async fn execute(&self, ctx: &ActivityContext<DelayConfig>) -> Result<(), ActivityError> {
        let duration_ms = ctx.activity().duration_ms;
        tracing::debug!("Delaying {} for {}ms", ctx.activity_id(), duration_ms);
        sleep(Duration::from_millis(duration_ms)).await;
        Ok(())
    }
}

use async_trait::async_trait;
use flowcore::{ActivityContext, ActivityError, ActivityExecutor};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DebugConfig {
    #[serde(default)]
    pub message: Option<String>,
}

/// Simple debug activity that logs its message
#[derive(Default)]
pub struct DebugExecutor;

#[async_trait]
impl ActivityExecutor for DebugExecutor {
    type Config = DebugConfig;

    async fn execute(&self, ctx: &ActivityContext<DebugConfig>) -> Result<(), ActivityError> {
        let message = ctx
            .activity()
            .message
            .clone()
            .unwrap_or_else(|| "(no message)".to_string());

        tracing::info!("DEBUG: {}", message);
        for (name, variable) in ctx.variables().await {
            tracing::debug!("  {}: {}", name, variable.to_text());
        }

        ctx.set_output_variable("message", message).await
    }
}

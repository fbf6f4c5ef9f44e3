use async_trait::async_trait;
use flowcore::{ActivityContext, ActivityError, ActivityExecutor};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SaveResourceConfig {
    /// Relative to the resource root.
    pub path: PathBuf,
    pub content: String,
}

#[derive(Default)]
pub struct SaveResourceExecutor;

#[async_trait]
impl ActivityExecutor for SaveResourceExecutor {
    type Config = SaveResourceConfig;

    async fn execute(&self, ctx: &ActivityContext<SaveResourceConfig>) -> Result<(), ActivityError> {
        let activity = ctx.activity();
        let stored = ctx
            .save_resource(&activity.path, activity.content.as_bytes())
            .await?;
        tracing::debug!("Saved resource {}", stored.display());
        ctx.set_output_variable("path", activity.path.to_string_lossy().into_owned())
            .await
    }
}

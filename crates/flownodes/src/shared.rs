use async_trait::async_trait;
use flowcore::{ActivityContext, ActivityError, ActivityExecutor, Value};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PutSharedDataConfig {
    pub namespace: String,
    pub key: String,
    pub value: Value,
}

#[derive(Default)]
pub struct PutSharedDataExecutor;

#[async_trait]
impl ActivityExecutor for PutSharedDataExecutor {
    type Config = PutSharedDataConfig;

    async fn execute(&self, ctx: &ActivityContext<PutSharedDataConfig>) -> Result<(), ActivityError> {
        let activity = ctx.activity();
        ctx.shared_data_store()
            .put(&activity.namespace, &activity.key, activity.value.clone())
            .await;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GetSharedDataConfig {
    pub namespace: String,
    pub key: String,
}

/// Outputs the entry as `value`, null when absent.
#[derive(Default)]
pub struct GetSharedDataExecutor;

#[async_trait]
impl ActivityExecutor for GetSharedDataExecutor {
    type Config = GetSharedDataConfig;

    async fn execute(&self, ctx: &ActivityContext<GetSharedDataConfig>) -> Result<(), ActivityError> {
        let activity = ctx.activity();
        let value = ctx
            .shared_data_store()
            .get(&activity.namespace, &activity.key)
            .await
            .unwrap_or(Value::Null);
        ctx.set_output_variable("value", value).await
    }
}

use async_trait::async_trait;
use flowcore::serde_ext::escaped_json;
use flowcore::{ActivityContext, ActivityError, ActivityExecutor, Value};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SetVariablesConfig {
    /// A map, or a string of JSON when it comes from another activity's output.
    #[serde(deserialize_with = "escaped_json::deserialize")]
    pub variables: HashMap<String, Value>,
}

/// Publishes every configured entry as an output of the activity.
#[derive(Default)]
pub struct SetVariablesExecutor;

#[async_trait]
impl ActivityExecutor for SetVariablesExecutor {
    type Config = SetVariablesConfig;

    async fn execute(&self, ctx: &ActivityContext<SetVariablesConfig>) -> Result<(), ActivityError> {
        let variables = ctx.activity().variables.clone();
        tracing::debug!("Setting {} variables", variables.len());
        ctx.set_output_variables(variables).await
    }
}

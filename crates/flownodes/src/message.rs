use async_trait::async_trait;
use flowcore::{ActivityContext, ActivityError, ActivityExecutor, EventPayload};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StreamTarget {
    pub stream_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SendMessageConfig {
    /// Defaults to the stream of the triggering message.
    #[serde(default)]
    pub to: Option<StreamTarget>,
    pub content: String,
}

/// Posts a message through the messaging gateway.
#[derive(Default)]
pub struct SendMessageExecutor;

#[async_trait]
impl ActivityExecutor for SendMessageExecutor {
    type Config = SendMessageConfig;

    async fn execute(&self, ctx: &ActivityContext<SendMessageConfig>) -> Result<(), ActivityError> {
        let activity = ctx.activity();
        let stream_id = match &activity.to {
            Some(target) => target.stream_id.clone(),
            None => reply_stream(ctx).ok_or_else(|| {
                ActivityError::Configuration(format!(
                    "activity {} has no target stream and was not triggered by a message",
                    ctx.activity_id()
                ))
            })?,
        };

        let message_id = ctx.bdk().send_message(&stream_id, &activity.content).await?;
        tracing::debug!("Sent message {} to {}", message_id, stream_id);

        let mut outputs = HashMap::new();
        outputs.insert("msgId".to_string(), message_id.into());
        outputs.insert("content".to_string(), activity.content.clone().into());
        ctx.set_output_variables(outputs).await
    }
}

fn reply_stream<C>(ctx: &ActivityContext<C>) -> Option<String> {
    match &ctx.event()?.source {
        EventPayload::MessageReceived(message) => Some(message.stream_id.clone()),
        _ => None,
    }
}

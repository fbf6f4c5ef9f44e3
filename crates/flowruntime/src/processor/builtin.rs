use super::RealTimeEventProcessor;
use crate::backend::{CorrelationResult, ExecutionBackend};
use async_trait::async_trait;
use flowcore::variable::EVENT;
use flowcore::{
    EventHolder, EventPayload, FlowError, FormRepliedEvent, MessageReceivedEvent,
    DeploymentId, RequestReceivedEvent, RuntimeEvent, Variable,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Hands the event to the backend under its correlation message, with the
/// event holder as the `event` variable. With `pinned`, new instances
/// start only in that deployment.
async fn correlate(
    backend: &dyn ExecutionBackend,
    message: &str,
    event: &RuntimeEvent<EventPayload>,
    pinned: Option<DeploymentId>,
) -> Result<CorrelationResult, FlowError> {
    let holder = EventHolder::from_event(event);
    let mut variables = HashMap::new();
    variables.insert(EVENT.to_string(), Variable::json(&holder)?);

    let result = match pinned {
        Some(deployment) => backend.correlate_in(deployment, message, variables).await?,
        None => backend.correlate(message, variables).await?,
    };
    tracing::debug!(
        "Message {} started {} and resumed {} instances",
        message,
        result.started.len(),
        result.resumed.len()
    );
    Ok(result)
}

/// Correlates an event from a listener feed, where a message nobody
/// listens on is not an error.
async fn correlate_feed(
    backend: &dyn ExecutionBackend,
    event: RuntimeEvent<EventPayload>,
) -> Result<(), FlowError> {
    let Some(message) = event.source.message_name() else {
        tracing::debug!("Event {} has no correlation message", event.source.event_type());
        return Ok(());
    };
    correlate(backend, &message, &event, None).await.map(|_| ())
}

pub struct RequestReceivedProcessor {
    backend: Arc<dyn ExecutionBackend>,
}

impl RequestReceivedProcessor {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RealTimeEventProcessor for RequestReceivedProcessor {
    type Source = RequestReceivedEvent;

    async fn process(&self, event: RuntimeEvent<RequestReceivedEvent>) -> Result<(), FlowError> {
        let pinned = event.source.deployment_id;
        let event = event.erase();
        let Some(message) = event.source.message_name() else {
            return Err(FlowError::dispatch("request has no workflow id"));
        };

        let result = correlate(self.backend.as_ref(), &message, &event, pinned).await?;
        if result.is_empty() {
            return Err(FlowError::dispatch(format!("no instance listens on {}", message)));
        }
        Ok(())
    }
}

pub struct MessageReceivedProcessor {
    backend: Arc<dyn ExecutionBackend>,
}

impl MessageReceivedProcessor {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RealTimeEventProcessor for MessageReceivedProcessor {
    type Source = MessageReceivedEvent;

    async fn process(&self, event: RuntimeEvent<MessageReceivedEvent>) -> Result<(), FlowError> {
        correlate_feed(self.backend.as_ref(), event.erase()).await
    }
}

pub struct FormRepliedProcessor {
    backend: Arc<dyn ExecutionBackend>,
}

impl FormRepliedProcessor {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RealTimeEventProcessor for FormRepliedProcessor {
    type Source = FormRepliedEvent;

    async fn process(&self, event: RuntimeEvent<FormRepliedEvent>) -> Result<(), FlowError> {
        tracing::debug!(
            "Form {} replied with {} values",
            event.source.form_id,
            event.source.values.len()
        );
        correlate_feed(self.backend.as_ref(), event.erase()).await
    }
}

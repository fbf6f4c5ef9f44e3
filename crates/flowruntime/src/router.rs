use crate::processor::ProcessorRegistry;
use flowcore::{EventPayload, FlowError, RuntimeEvent};
use std::sync::Arc;

/// Routes runtime events to the processor registered for their payload type.
#[derive(Clone)]
pub struct EventRouter {
    processors: Arc<ProcessorRegistry>,
}

impl EventRouter {
    pub fn new(processors: Arc<ProcessorRegistry>) -> Self {
        Self { processors }
    }

    /// Fire-and-forget entry point for event sources. Must be called from
    /// within a tokio runtime.
    pub fn on_event(&self, event: RuntimeEvent<EventPayload>) -> tokio::task::JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move { router.route_async(event).await })
    }

    /// Routes an event by its declared type. Envelope payloads are unwrapped
    /// first. Failures are logged, never returned.
    pub async fn route_async(&self, event: RuntimeEvent<EventPayload>) {
        let event = event.map(EventPayload::normalized);
        let event_type = event.source.event_type();

        let Some(processor) = self.processors.processor(event_type) else {
            tracing::error!("No processor registered for event type {}", event_type);
            return;
        };
        if let Err(e) = processor.process_erased(event).await {
            tracing::error!("Processing of {} event failed: {}", event_type, e);
        }
    }

    /// Routes an event by its concrete type and reports failures.
    pub async fn route_sync(&self, event: RuntimeEvent<EventPayload>) -> Result<(), FlowError> {
        let event_type = event.source.event_type();
        let processor = self.processors.processor(event_type).ok_or_else(|| {
            FlowError::dispatch(format!("No processor registered for event type {}", event_type))
        })?;
        processor.process_erased(event).await.map_err(|e| {
            FlowError::dispatch_caused_by(format!("Processing of {} event failed", event_type), e)
        })
    }
}

//! Runtime event processors and their type-keyed registry.

mod builtin;

pub use builtin::{FormRepliedProcessor, MessageReceivedProcessor, RequestReceivedProcessor};

use async_trait::async_trait;
use flowcore::{EventPayload, EventType, FlowError, RuntimeEvent, TypedPayload};
use std::collections::HashMap;
use std::sync::Arc;

/// Handles runtime events carrying one payload type.
#[async_trait]
pub trait RealTimeEventProcessor: Send + Sync + 'static {
    type Source: TypedPayload;

    async fn process(&self, event: RuntimeEvent<Self::Source>) -> Result<(), FlowError>;
}

/// Processor with its payload type erased.
#[async_trait]
pub trait ErasedProcessor: Send + Sync {
    fn source_type(&self) -> EventType;

    async fn process_erased(&self, event: RuntimeEvent<EventPayload>) -> Result<(), FlowError>;
}

#[async_trait]
impl<P: RealTimeEventProcessor> ErasedProcessor for P {
    fn source_type(&self) -> EventType {
        <P::Source as TypedPayload>::EVENT_TYPE
    }

    async fn process_erased(&self, event: RuntimeEvent<EventPayload>) -> Result<(), FlowError> {
        let RuntimeEvent {
            initiator,
            timestamp,
            source,
        } = event;
        let found = source.event_type();
        let source = P::Source::from_payload(source).ok_or_else(|| {
            FlowError::dispatch(format!(
                "processor for {} received a {} payload",
                self.source_type(),
                found
            ))
        })?;
        self.process(RuntimeEvent {
            initiator,
            timestamp,
            source,
        })
        .await
    }
}

/// Maps each payload type to the single processor handling it.
pub struct ProcessorRegistry {
    processors: HashMap<EventType, Arc<dyn ErasedProcessor>>,
}

impl ProcessorRegistry {
    pub fn builder() -> ProcessorRegistryBuilder {
        ProcessorRegistryBuilder::default()
    }

    pub fn processor(&self, event_type: EventType) -> Option<&Arc<dyn ErasedProcessor>> {
        self.processors.get(&event_type)
    }

    pub fn event_types(&self) -> Vec<EventType> {
        self.processors.keys().copied().collect()
    }
}

#[derive(Default)]
pub struct ProcessorRegistryBuilder {
    processors: Vec<Arc<dyn ErasedProcessor>>,
}

impl ProcessorRegistryBuilder {
    pub fn with<P: RealTimeEventProcessor>(mut self, processor: P) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn with_erased(mut self, processor: Arc<dyn ErasedProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Fails when two processors claim the same payload type.
    pub fn build(self) -> Result<ProcessorRegistry, FlowError> {
        let mut processors = HashMap::with_capacity(self.processors.len());
        for processor in self.processors {
            let event_type = processor.source_type();
            if processors.insert(event_type, processor).is_some() {
                return Err(FlowError::Configuration(format!(
                    "processor collision: more than one processor handles {}",
                    event_type
                )));
            }
            tracing::debug!("Registered processor for {}", event_type);
        }
        Ok(ProcessorRegistry { processors })
    }
}

mod common;

use async_trait::async_trait;
use common::{builder, EmitExecutor};
use flowcore::{
    ActivityContext, ActivityError, ActivityExecutor, FlowError, FormRepliedEvent, RuntimeEvent,
};
use flowruntime::processor::RealTimeEventProcessor;
use flowruntime::{ExecutorRegistry, ProcessorRegistry, Sharing, TypedExecutorFactory};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

#[derive(Deserialize)]
struct NoConfig {}

struct Counted;

impl Default for Counted {
    fn default() -> Self {
        CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        Counted
    }
}

#[async_trait]
impl ActivityExecutor for Counted {
    type Config = NoConfig;

    async fn execute(&self, _ctx: &ActivityContext<NoConfig>) -> Result<(), ActivityError> {
        Ok(())
    }
}

#[test]
fn test_shared_executor_is_created_once() {
    let mut registry = ExecutorRegistry::new();
    let factory = TypedExecutorFactory::<Counted>::new("counted").shared();
    assert_eq!(flowruntime::ExecutorFactory::sharing(&factory), Sharing::Shared);
    registry.register(Arc::new(factory));

    let implementation = registry
        .factory_for_kind("counted")
        .expect("registered")
        .implementation()
        .to_string();

    let before = CONSTRUCTED.load(Ordering::SeqCst);
    let first = registry.resolve(&implementation).expect("resolves");
    let second = registry.resolve(&implementation).expect("resolves");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst) - before, 1);
}

#[test]
fn test_kinds_and_metadata() {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(
        TypedExecutorFactory::<EmitExecutor>::new("emit").describe("Emits content", "test"),
    ));
    registry.register_instance("counted", Arc::new(Counted));

    assert_eq!(registry.list_kinds(), vec!["counted".to_string(), "emit".to_string()]);
    let metadata = registry.get_metadata("emit").expect("metadata");
    assert_eq!(metadata.description, "Emits content");
    assert_eq!(metadata.category, "test");
    assert!(registry.get_metadata("nope").is_none());
    assert!(matches!(
        registry.resolve("no::such::Executor"),
        Err(FlowError::Configuration(_))
    ));
}

#[test]
fn test_config_validation() {
    let factory = TypedExecutorFactory::<EmitExecutor>::new("emit");
    let validate = |value| flowruntime::ExecutorFactory::validate_config(&factory, &value);

    assert!(validate(serde_json::json!({ "content": "ok" })).is_ok());
    assert!(validate(serde_json::json!({ "content": "ok", "unknown": true })).is_ok());
    assert!(validate(serde_json::json!({ "content": ["not", "text"] })).is_err());
}

struct ExtraFormProcessor;

#[async_trait]
impl RealTimeEventProcessor for ExtraFormProcessor {
    type Source = FormRepliedEvent;

    async fn process(&self, _event: RuntimeEvent<FormRepliedEvent>) -> Result<(), FlowError> {
        Ok(())
    }
}

#[test]
fn test_processor_collision_fails_at_startup() {
    let result = ProcessorRegistry::builder()
        .with(ExtraFormProcessor)
        .with(ExtraFormProcessor)
        .build();
    assert!(matches!(result, Err(FlowError::Configuration(ref m)) if m.contains("form-replied")));

    let engine = builder().processor(Arc::new(ExtraFormProcessor)).build();
    assert!(matches!(engine, Err(FlowError::Configuration(_))));
}

#[test]
fn test_registry_lists_event_types() {
    let registry = ProcessorRegistry::builder().with(ExtraFormProcessor).build().expect("builds");
    assert_eq!(registry.event_types(), vec![flowcore::EventType::FormReplied]);
}

#[test]
fn test_duplicate_kind_keeps_first_registration() {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(TypedExecutorFactory::<EmitExecutor>::new("emit")));
    registry.register(Arc::new(TypedExecutorFactory::<Counted>::new("emit")));

    let implementation = registry.factory_for_kind("emit").expect("registered").implementation();
    assert!(implementation.ends_with("EmitExecutor"), "first wins: {}", implementation);
    match registry.check() {
        Err(FlowError::Configuration(message)) => {
            assert!(message.contains("activity kind emit"), "names the kind: {}", message)
        }
        other => panic!("expected a collision, got {:?}", other),
    }

    let engine = builder()
        .executor(Arc::new(TypedExecutorFactory::<Counted>::new("emit")))
        .build();
    assert!(matches!(engine, Err(FlowError::Configuration(_))));
}

#[test]
fn test_executor_under_two_kinds_is_rejected() {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(TypedExecutorFactory::<EmitExecutor>::new("emit")));
    registry.register(Arc::new(TypedExecutorFactory::<EmitExecutor>::new("shout")));

    assert_eq!(registry.list_kinds(), vec!["emit".to_string()]);
    match registry.check() {
        Err(FlowError::Configuration(message)) => {
            assert!(message.contains("kinds emit and shout"), "names both kinds: {}", message)
        }
        other => panic!("expected a collision, got {:?}", other),
    }

    let engine = builder()
        .executor(Arc::new(TypedExecutorFactory::<EmitExecutor>::new("shout")))
        .build();
    assert!(matches!(engine, Err(FlowError::Configuration(_))));
}

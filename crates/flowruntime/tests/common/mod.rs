#![allow(dead_code)]

use async_trait::async_trait;
use flowcore::{
    ActivityContext, ActivityError, ActivityExecutor, FlowError, MessageReceivedEvent, RuntimeEvent,
    Variable, WorkflowDefinition,
};
use flowruntime::processor::RealTimeEventProcessor;
use flowruntime::{EngineBuilder, InstanceSnapshot, TypedExecutorFactory, WorkflowEngine};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EmitConfig {
    #[serde(default)]
    pub content: Option<String>,
}

/// Outputs its configured content.
#[derive(Default)]
pub struct EmitExecutor;

#[async_trait]
impl ActivityExecutor for EmitExecutor {
    type Config = EmitConfig;

    async fn execute(&self, ctx: &ActivityContext<EmitConfig>) -> Result<(), ActivityError> {
        let content = ctx.activity().content.clone().unwrap_or_default();
        ctx.set_output_variable("content", content).await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FailConfig {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Always fails, with `reason` as the root cause.
#[derive(Default)]
pub struct FailingExecutor;

#[async_trait]
impl ActivityExecutor for FailingExecutor {
    type Config = FailConfig;

    async fn execute(&self, ctx: &ActivityContext<FailConfig>) -> Result<(), ActivityError> {
        let reason = ctx
            .activity()
            .reason
            .clone()
            .unwrap_or_else(|| "executor exploded".to_string());
        Err(ActivityError::caused_by(
            "failing activity",
            std::io::Error::new(std::io::ErrorKind::Other, reason),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SleepConfig {
    pub duration_ms: u64,
}

/// Holds its step for `duration-ms`.
#[derive(Default)]
pub struct SleepExecutor;

#[async_trait]
impl ActivityExecutor for SleepExecutor {
    type Config = SleepConfig;

    async fn execute(&self, ctx: &ActivityContext<SleepConfig>) -> Result<(), ActivityError> {
        tokio::time::sleep(Duration::from_millis(ctx.activity().duration_ms)).await;
        Ok(())
    }
}

/// Message processor whose downstream is unavailable.
pub struct RejectingProcessor;

#[async_trait]
impl RealTimeEventProcessor for RejectingProcessor {
    type Source = MessageReceivedEvent;

    async fn process(&self, _event: RuntimeEvent<MessageReceivedEvent>) -> Result<(), FlowError> {
        Err(FlowError::Configuration("listener offline".to_string()))
    }
}

pub fn builder() -> EngineBuilder {
    init_tracing();
    WorkflowEngine::builder()
        .executor(Arc::new(TypedExecutorFactory::<EmitExecutor>::new("emit")))
        .executor(Arc::new(TypedExecutorFactory::<FailingExecutor>::new("fail")))
        .executor(Arc::new(TypedExecutorFactory::<SleepExecutor>::new("sleep")))
}

pub fn engine() -> WorkflowEngine {
    builder().build().expect("engine builds")
}

pub fn definition(value: serde_json::Value) -> WorkflowDefinition {
    serde_json::from_value(value).expect("valid workflow definition")
}

pub async fn instances_of(engine: &WorkflowEngine, workflow_id: &str) -> Vec<InstanceSnapshot> {
    engine
        .backend()
        .instances()
        .await
        .into_iter()
        .filter(|instance| instance.workflow_id == workflow_id)
        .collect()
}

pub fn text(variable: Option<&Variable>) -> Option<String> {
    variable.map(Variable::to_text)
}

#[derive(Debug, Default, Clone)]
struct FieldMap(HashMap<String, String>);

impl Visit for FieldMap {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

#[derive(Debug, Clone)]
pub struct CapturedSpan {
    pub name: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    /// Enclosing spans, outermost first.
    pub spans: Vec<CapturedSpan>,
}

impl CapturedEvent {
    pub fn span(&self, name: &str) -> Option<&CapturedSpan> {
        self.spans.iter().find(|span| span.name == name)
    }
}

/// Records every event together with the fields of its enclosing spans.
#[derive(Clone, Default)]
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == Level::ERROR)
            .collect()
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = FieldMap::default();
        event.record(&mut fields);

        let spans = ctx
            .event_scope(event)
            .map(|scope| {
                scope
                    .from_root()
                    .map(|span| CapturedSpan {
                        name: span.name().to_string(),
                        fields: span
                            .extensions()
                            .get::<FieldMap>()
                            .map(|fields| fields.0.clone())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: fields.0.remove("message").unwrap_or_default(),
            spans,
        });
    }
}

/// Captures tracing output on the current thread until the guard drops.
pub fn capture_tracing() -> (CaptureLayer, tracing::subscriber::DefaultGuard) {
    let layer = CaptureLayer::default();
    let guard = tracing_subscriber::registry().with(layer.clone()).set_default();
    (layer, guard)
}

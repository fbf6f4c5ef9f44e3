#![allow(dead_code)]

use async_trait::async_trait;
use flowcore::services::{
    FsResourceProvider, InMemorySharedDataStore, MessagingGateway, ResourceProvider,
    SharedDataStore,
};
use flowcore::{
    ActivityContext, ActivityError, EventHolder, ExecutorServices, RunningInstance, Variable,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Running instance backed by a plain map.
#[derive(Default)]
pub struct MemoryInstance {
    variables: RwLock<HashMap<String, Variable>>,
}

impl MemoryInstance {
    pub async fn get(&self, name: &str) -> Option<Variable> {
        self.variables.read().await.get(name).cloned()
    }
}

#[async_trait]
impl RunningInstance for MemoryInstance {
    fn process_instance_id(&self) -> &str {
        "instance-1"
    }

    fn process_definition_id(&self) -> &str {
        "test:1"
    }

    fn activity_instance_id(&self) -> &str {
        "activity-1"
    }

    fn current_activity_id(&self) -> &str {
        "act"
    }

    async fn variable(&self, name: &str) -> Option<Variable> {
        self.variables.read().await.get(name).cloned()
    }

    async fn variables(&self) -> HashMap<String, Variable> {
        self.variables.read().await.clone()
    }

    async fn set_variable(&self, name: &str, value: Variable) {
        self.variables.write().await.insert(name.to_string(), value);
    }
}

/// Gateway remembering every message it was asked to send.
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_message(&self, stream_id: &str, content: &str) -> Result<String, ActivityError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((stream_id.to_string(), content.to_string()));
        Ok(format!("msg-{}", sent.len()))
    }
}

pub struct Harness {
    pub instance: Arc<MemoryInstance>,
    pub gateway: Arc<RecordingGateway>,
    pub shared: Arc<InMemorySharedDataStore>,
    pub resources: Arc<dyn ResourceProvider>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_resources(Arc::new(FsResourceProvider::new(std::env::temp_dir())))
    }

    pub fn with_resources(resources: Arc<dyn ResourceProvider>) -> Self {
        Self {
            instance: Arc::new(MemoryInstance::default()),
            gateway: Arc::new(RecordingGateway::default()),
            shared: Arc::new(InMemorySharedDataStore::new()),
            resources,
        }
    }

    /// Context with `config` decoded the way the dispatcher decodes it.
    pub fn context<C: DeserializeOwned>(
        &self,
        config: serde_json::Value,
        event: Option<EventHolder>,
    ) -> ActivityContext<C> {
        let shared: Arc<dyn SharedDataStore> = self.shared.clone();
        ActivityContext::new(
            self.instance.clone(),
            "act",
            serde_json::from_value(config).expect("valid configuration"),
            event,
            ExecutorServices::new(self.resources.clone(), self.gateway.clone(), shared),
        )
    }

    pub async fn output(&self, key: &str) -> Option<Variable> {
        self.instance.get(&format!("act.outputs.{}", key)).await
    }
}

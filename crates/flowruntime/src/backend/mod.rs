//! Seam between the dispatch layer and the engine that owns deployments and
//! running instances.

mod memory;
mod template;

pub use memory::{InMemoryBackend, InstanceSnapshot, InstanceStatus};
pub use template::interpolate;

use async_trait::async_trait;
use flowcore::{BackendError, Deployment, DeploymentId, RunningInstance, StepFailure, Variable};
use std::collections::HashMap;
use std::sync::Arc;

/// A graph and its resources, ready to be registered.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub name: String,
    pub resources: HashMap<String, Vec<u8>>,
}

impl DeploymentRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: HashMap::new(),
        }
    }

    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(name.into(), content.into());
        self
    }
}

/// Instances touched by one correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationResult {
    pub started: Vec<String>,
    pub resumed: Vec<String>,
}

impl CorrelationResult {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.resumed.is_empty()
    }
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn deploy(&self, request: DeploymentRequest) -> Result<Deployment, BackendError>;

    async fn list_active_deployments(&self) -> Result<Vec<Deployment>, BackendError>;

    async fn deployment(&self, id: DeploymentId) -> Result<Option<Deployment>, BackendError>;

    /// Removes a deployment; with `cascade` its running instances go too.
    async fn delete_deployment(&self, id: DeploymentId, cascade: bool) -> Result<(), BackendError>;

    /// Content of a deployment resource, `None` when it was never stored.
    async fn deployment_resource(
        &self,
        id: DeploymentId,
        name: &str,
    ) -> Result<Option<Vec<u8>>, BackendError>;

    /// Delivers `message`: starts instances listening on it and resumes
    /// instances waiting for it, with `variables` set on each.
    async fn correlate(
        &self,
        message: &str,
        variables: HashMap<String, Variable>,
    ) -> Result<CorrelationResult, BackendError>;

    /// Like [`correlate`](Self::correlate), but new instances start only in
    /// `deployment`, which must still exist.
    async fn correlate_in(
        &self,
        deployment: DeploymentId,
        message: &str,
        variables: HashMap<String, Variable>,
    ) -> Result<CorrelationResult, BackendError>;
}

/// One activity step handed over by the backend.
pub struct StepInvocation {
    /// Implementation identifier of the executor.
    pub executor: String,
    /// Interpolated activity envelope text.
    pub activity: String,
    pub instance: Arc<dyn RunningInstance>,
}

/// Per-step callback the backend invokes for every activity node.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, step: StepInvocation) -> Result<(), StepFailure>;
}

use crate::backend::{ExecutionBackend, InMemoryBackend, StepHandler};
use crate::deployment::DeploymentManager;
use crate::dispatcher::ActivityDispatcher;
use crate::gateway::{ExecutionGateway, ExecutionRequest};
use crate::graph::ExecutableGraph;
use crate::processor::{
    ErasedProcessor, FormRepliedProcessor, MessageReceivedProcessor, ProcessorRegistry,
    RequestReceivedProcessor,
};
use crate::registry::{ExecutorFactory, ExecutorRegistry};
use crate::router::EventRouter;
use crate::translator::WorkflowTranslator;
use flowcore::services::{FsResourceProvider, InMemorySharedDataStore, LogMessagingGateway};
use flowcore::{
    AuditEvent, AuditSink, AuditSinks, Deployment, DeploymentId, EventBus, EventPayload,
    ExecutorServices, FlowError, LogAuditSink, RuntimeEvent, WorkflowDefinition,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Facade over translation, deployment and dispatch.
pub struct WorkflowEngine<B: ExecutionBackend + 'static = InMemoryBackend> {
    config: EngineConfig,
    executors: Arc<ExecutorRegistry>,
    translator: WorkflowTranslator,
    deployments: Arc<DeploymentManager>,
    gateway: ExecutionGateway,
    router: EventRouter,
    backend: Arc<B>,
    audit_bus: Arc<EventBus>,
}

impl WorkflowEngine<InMemoryBackend> {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}

impl<B: ExecutionBackend + 'static> WorkflowEngine<B> {
    pub fn translate(&self, definition: &WorkflowDefinition) -> Result<ExecutableGraph, FlowError> {
        self.translator.translate(definition)
    }

    pub async fn deploy(&self, graph: &ExecutableGraph) -> Result<DeploymentId, FlowError> {
        self.deployments.deploy(graph).await
    }

    /// Translates and deploys in one go.
    pub async fn deploy_workflow(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<DeploymentId, FlowError> {
        let graph = self.translate(definition)?;
        self.deploy(&graph).await
    }

    pub async fn execute(&self, request: ExecutionRequest) -> Result<(), FlowError> {
        self.gateway.execute(request).await
    }

    /// Routes an event on a background task.
    pub fn on_event(&self, event: RuntimeEvent<EventPayload>) -> tokio::task::JoinHandle<()> {
        self.router.on_event(event)
    }

    /// Routes an event on the current task, with the same error policy as
    /// [`WorkflowEngine::on_event`].
    pub async fn route_event(&self, event: RuntimeEvent<EventPayload>) {
        self.router.route_async(event).await
    }

    pub async fn undeploy_by_workflow_id(&self, workflow_id: &str) -> Result<(), FlowError> {
        self.deployments.undeploy_by_name(workflow_id).await
    }

    pub async fn undeploy_by_deployment_id(&self, id: DeploymentId) -> Result<(), FlowError> {
        self.deployments.undeploy_by_deployment_id(id).await
    }

    pub async fn undeploy_all(&self) -> Result<(), FlowError> {
        self.deployments.undeploy_all().await
    }

    pub async fn active_graph(&self, workflow_id: &str) -> Result<Arc<ExecutableGraph>, FlowError> {
        self.deployments.active_graph(workflow_id).await
    }

    pub async fn active_deployments(&self) -> Result<Vec<Deployment>, FlowError> {
        self.deployments.active_deployments().await
    }

    pub fn subscribe_audit(&self) -> broadcast::Receiver<AuditEvent> {
        self.audit_bus.subscribe()
    }

    pub fn executors(&self) -> &Arc<ExecutorRegistry> {
        &self.executors
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

pub struct EngineBuilder {
    config: EngineConfig,
    executors: ExecutorRegistry,
    services: Option<ExecutorServices>,
    audit: AuditSinks,
    processors: Vec<Arc<dyn ErasedProcessor>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            executors: ExecutorRegistry::new(),
            services: None,
            audit: AuditSinks::new(),
            processors: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor(mut self, factory: Arc<dyn ExecutorFactory>) -> Self {
        self.executors.register(factory);
        self
    }

    pub fn executors(mut self, register: impl FnOnce(&mut ExecutorRegistry)) -> Self {
        register(&mut self.executors);
        self
    }

    pub fn services(mut self, services: ExecutorServices) -> Self {
        self.services = Some(services);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = self.audit.with(sink);
        self
    }

    /// Adds a processor next to the built-in ones.
    pub fn processor(mut self, processor: Arc<dyn ErasedProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn build(self) -> Result<WorkflowEngine<InMemoryBackend>, FlowError> {
        self.build_with(InMemoryBackend::new)
    }

    /// Builds the engine on a custom backend, handed the step handler it must
    /// call for every activity.
    pub fn build_with<B, F>(self, backend: F) -> Result<WorkflowEngine<B>, FlowError>
    where
        B: ExecutionBackend + 'static,
        F: FnOnce(Arc<dyn StepHandler>) -> B,
    {
        self.executors.check()?;
        let executors = Arc::new(self.executors);
        let services = match self.services {
            Some(services) => services,
            None => ExecutorServices::new(
                Arc::new(FsResourceProvider::new(&self.config.resources_dir)),
                Arc::new(LogMessagingGateway),
                Arc::new(InMemorySharedDataStore::new()),
            ),
        };

        let audit_bus = Arc::new(EventBus::new(self.config.audit_buffer_size));
        let audit: Arc<dyn AuditSink> = Arc::new(
            self.audit
                .with(Arc::new(LogAuditSink))
                .with(audit_bus.clone()),
        );

        let dispatcher: Arc<dyn StepHandler> = Arc::new(ActivityDispatcher::new(
            executors.clone(),
            services,
            audit.clone(),
        ));
        let backend = Arc::new(backend(dispatcher));
        let shared: Arc<dyn ExecutionBackend> = backend.clone();

        let mut processors = ProcessorRegistry::builder()
            .with(RequestReceivedProcessor::new(shared.clone()))
            .with(MessageReceivedProcessor::new(shared.clone()))
            .with(FormRepliedProcessor::new(shared.clone()));
        for processor in self.processors {
            processors = processors.with_erased(processor);
        }
        let router = EventRouter::new(Arc::new(processors.build()?));

        let deployments = Arc::new(DeploymentManager::new(
            shared,
            audit,
            Arc::new(RwLock::new(())),
        ));
        let gateway = ExecutionGateway::new(deployments.clone(), router.clone());

        tracing::info!(
            "Workflow engine ready with {} activity kinds",
            executors.list_kinds().len()
        );
        Ok(WorkflowEngine {
            config: self.config,
            translator: WorkflowTranslator::new(executors.clone()),
            executors,
            deployments,
            gateway,
            router,
            backend,
            audit_bus,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the resources activities read and write.
    pub resources_dir: PathBuf,
    pub audit_buffer_size: usize,
    pub bind_address: String,
    /// Workflows deployed at server startup.
    pub workflows_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from("resources"),
            audit_buffer_size: 1000,
            bind_address: "127.0.0.1:8080".to_string(),
            workflows_dir: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `FLOW_RESOURCES_DIR`, `FLOW_AUDIT_BUFFER`,
    /// `BIND_ADDRESS` and `FLOW_WORKFLOWS_DIR`.
    pub fn from_env() -> Result<Self, FlowError> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("FLOW_RESOURCES_DIR") {
            config.resources_dir = PathBuf::from(dir);
        }
        if let Ok(size) = std::env::var("FLOW_AUDIT_BUFFER") {
            config.audit_buffer_size = size.parse().map_err(|_| {
                FlowError::Configuration(format!("FLOW_AUDIT_BUFFER is not a number: {}", size))
            })?;
            if config.audit_buffer_size == 0 {
                return Err(FlowError::Configuration(
                    "FLOW_AUDIT_BUFFER must be positive".to_string(),
                ));
            }
        }
        if let Ok(address) = std::env::var("BIND_ADDRESS") {
            config.bind_address = address;
        }
        if let Ok(dir) = std::env::var("FLOW_WORKFLOWS_DIR") {
            config.workflows_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }
}

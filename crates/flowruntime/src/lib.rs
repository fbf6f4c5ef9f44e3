//! Workflow execution runtime
//!
//! This crate translates workflow definitions into executable graphs,
//! deploys them to an execution backend and dispatches requests, runtime
//! events and activity steps.

pub mod backend;
pub mod codec;
mod deployment;
mod dispatcher;
mod gateway;
mod graph;
mod loader;
pub mod processor;
mod registry;
mod router;
mod runtime;
mod translator;

pub use backend::{ExecutionBackend, InMemoryBackend, InstanceSnapshot, InstanceStatus, StepHandler, StepInvocation};
pub use deployment::DeploymentManager;
pub use dispatcher::{ActivityDispatcher, StepState};
pub use gateway::{authorize, ExecutionGateway, ExecutionRequest};
pub use graph::{ActivityNode, ExecutableGraph, GraphNode, Transition};
pub use loader::{load_file, WorkflowLoader};
pub use processor::{ProcessorRegistry, RealTimeEventProcessor};
pub use registry::{
    ErasedExecutor, ExecutorFactory, ExecutorMetadata, ExecutorRegistry, InvocationParts,
    PreparedActivity, Sharing, TypedExecutorFactory,
};
pub use router::EventRouter;
pub use runtime::{EngineBuilder, EngineConfig, WorkflowEngine};
pub use translator::WorkflowTranslator;

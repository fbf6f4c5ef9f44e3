//! Core abstractions for the workflow dispatch layer
//!
//! This crate provides the data model, error taxonomy and the traits that
//! activity executors and external collaborators implement. It has no
//! engine dependencies.

mod activity;
mod deployment;
mod error;
pub mod events;
pub mod serde_ext;
pub mod services;
mod value;
pub mod variable;
mod workflow;

pub use activity::{ActivityContext, ActivityExecutor, RunningInstance};
pub use deployment::{Deployment, DeploymentId, GRAPH_RESOURCE, TOKEN_RESOURCE};
pub use error::{innermost_message, ActivityError, BackendError, FlowError, StepFailure, FAILURE};
pub use events::*;
pub use services::ExecutorServices;
pub use value::Value;
pub use variable::{ExecutionErrorRecord, Variable};
pub use workflow::{correlation, ActivityId, ActivitySpec, EventTrigger, WorkflowDefinition, WorkflowId};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

use thiserror::Error;

/// Name of the backend-level failure signalled when an activity fails.
pub const FAILURE: &str = "FAILURE";

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Workflow {workflow_id} has duplicated activity ids: {}", .ids.join(", "))]
    DuplicateIdentifier { workflow_id: String, ids: Vec<String> },

    #[error("Workflow parsing process failed, \"{workflow_id}\" may not be a valid workflow: {reason}")]
    TranslationFailure { workflow_id: String, reason: String },

    #[error("No workflow found with id {0}")]
    NotFound(String),

    #[error("Request is not authorised")]
    Unauthorized,

    #[error("Dispatch failed: {message}")]
    Dispatch {
        message: String,
        #[source]
        source: Option<Box<FlowError>>,
    },

    #[error("Activity {activity_id} failed: {source}")]
    ActivityExecution {
        activity_id: String,
        #[source]
        source: ActivityError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    pub fn translation(workflow_id: impl Into<String>, reason: impl Into<String>) -> Self {
        FlowError::TranslationFailure {
            workflow_id: workflow_id.into(),
            reason: reason.into(),
        }
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        FlowError::Dispatch {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a processor failure on the synchronous request path.
    pub fn dispatch_caused_by(message: impl Into<String>, source: FlowError) -> Self {
        FlowError::Dispatch {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors raised by activity executors.
#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Missing variable: {0}")]
    MissingVariable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{message}")]
    ExecutionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    #[error("Resource error: {0}")]
    Resource(#[from] std::io::Error),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ActivityError {
    pub fn failed(message: impl Into<String>) -> Self {
        ActivityError::ExecutionFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ActivityError::ExecutionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Named failure handed back to the execution backend after a step failed.
///
/// The surrounding graph keys its error branches on `name`.
#[derive(Error, Debug)]
#[error("{name}: {source}")]
pub struct StepFailure {
    pub name: String,
    #[source]
    pub source: FlowError,
}

impl StepFailure {
    pub fn failure(source: FlowError) -> Self {
        Self {
            name: FAILURE.to_string(),
            source,
        }
    }
}

/// Message of the innermost error in a `source()` chain.
pub fn innermost_message(error: &(dyn std::error::Error + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

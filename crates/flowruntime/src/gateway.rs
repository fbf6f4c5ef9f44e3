use crate::deployment::DeploymentManager;
use crate::router::EventRouter;
use flowcore::{BackendError, FlowError, RequestReceivedEvent, RuntimeEvent, Value, TOKEN_RESOURCE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Synchronous request to run a deployed workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub workflow_id: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
    #[serde(default)]
    pub token: Option<String>,
}

impl ExecutionRequest {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Self::default()
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_arguments(mut self, arguments: HashMap<String, Value>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Entry point for execution requests: resolves the deployment, checks the
/// caller's token and routes a `request-received` event.
pub struct ExecutionGateway {
    deployments: Arc<DeploymentManager>,
    router: EventRouter,
}

impl ExecutionGateway {
    pub fn new(deployments: Arc<DeploymentManager>, router: EventRouter) -> Self {
        Self {
            deployments,
            router,
        }
    }

    pub async fn execute(&self, request: ExecutionRequest) -> Result<(), FlowError> {
        let deployment = {
            // held only while resolving, the routed event is pinned to the deployment instead
            let lock = self.deployments.lock().clone();
            let _guard = lock.read().await;

            let deployment = self.deployments.select_active(&request.workflow_id).await?;
            let stored = self
                .deployments
                .backend()
                .deployment_resource(deployment.id, TOKEN_RESOURCE)
                .await?
                .map(|raw| String::from_utf8_lossy(&raw).into_owned())
                .unwrap_or_default();
            authorize(&stored, request.token.as_deref())?;
            deployment
        };

        tracing::debug!(
            "Executing workflow {} from deployment {}",
            request.workflow_id,
            deployment.id
        );
        let workflow_id = request.workflow_id.clone();
        let event = RuntimeEvent::internal(RequestReceivedEvent {
            workflow_id: request.workflow_id,
            arguments: request.arguments,
            token: request.token,
            deployment_id: Some(deployment.id),
        });
        match self.router.route_sync(event.erase()).await {
            // undeployed between resolving and routing
            Err(FlowError::Dispatch {
                source: Some(source), ..
            }) if matches!(*source, FlowError::Backend(BackendError::DeploymentNotFound(_))) => {
                Err(FlowError::NotFound(workflow_id))
            }
            other => other,
        }
    }
}

/// Checks a caller token against the token stored with a deployment.
///
/// An empty stored token lets every caller through.
pub fn authorize(stored: &str, provided: Option<&str>) -> Result<(), FlowError> {
    if stored.is_empty() {
        return Ok(());
    }
    match provided {
        Some(token) if token == stored => Ok(()),
        _ => Err(FlowError::Unauthorized),
    }
}

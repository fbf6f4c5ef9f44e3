use crate::backend::{DeploymentRequest, ExecutionBackend};
use crate::graph::ExecutableGraph;
use dashmap::DashMap;
use flowcore::{
    AuditSink, BackendError, Deployment, DeploymentId, FlowError, GRAPH_RESOURCE, TOKEN_RESOURCE,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registers executable graphs with the backend and removes them again.
pub struct DeploymentManager {
    backend: Arc<dyn ExecutionBackend>,
    audit: Arc<dyn AuditSink>,
    lock: Arc<RwLock<()>>,
    graphs: DashMap<String, Arc<ExecutableGraph>>,
}

impl DeploymentManager {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        audit: Arc<dyn AuditSink>,
        lock: Arc<RwLock<()>>,
    ) -> Self {
        Self {
            backend,
            audit,
            lock,
            graphs: DashMap::new(),
        }
    }

    /// Deploys `graph` as a new deployment named after its workflow.
    ///
    /// Deploying a name that is already active adds another deployment.
    pub async fn deploy(&self, graph: &ExecutableGraph) -> Result<DeploymentId, FlowError> {
        let _guard = self.lock.write().await;

        let mut request = DeploymentRequest::new(&graph.workflow_id)
            .with_resource(GRAPH_RESOURCE, graph.encode()?);
        if let Some(token) = graph.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.with_resource(TOKEN_RESOURCE, token.as_bytes());
        }

        let deployment = self.backend.deploy(request).await?;
        self.graphs.remove(&deployment.name);

        tracing::info!("Deployed workflow {} {}", deployment.id, deployment.name);
        self.audit.deployed(&deployment);
        Ok(deployment.id)
    }

    /// Removes every active deployment of workflow `name`.
    pub async fn undeploy_by_name(&self, name: &str) -> Result<(), FlowError> {
        let _guard = self.lock.write().await;
        for deployment in self.backend.list_active_deployments().await? {
            if deployment.name == name {
                self.stop(&deployment).await?;
            }
        }
        Ok(())
    }

    pub async fn undeploy_by_deployment_id(&self, id: DeploymentId) -> Result<(), FlowError> {
        let _guard = self.lock.write().await;
        let deployment = self
            .backend
            .deployment(id)
            .await?
            .ok_or_else(|| BackendError::DeploymentNotFound(id.to_string()))?;
        self.stop(&deployment).await
    }

    pub async fn undeploy_all(&self) -> Result<(), FlowError> {
        let _guard = self.lock.write().await;
        for deployment in self.backend.list_active_deployments().await? {
            self.stop(&deployment).await?;
        }
        Ok(())
    }

    /// Graph of the active deployment of `name`.
    pub async fn active_graph(&self, name: &str) -> Result<Arc<ExecutableGraph>, FlowError> {
        if let Some(graph) = self.graphs.get(name) {
            return Ok(graph.clone());
        }

        let _guard = self.lock.read().await;
        let deployment = self.select_active(name).await?;
        let raw = self
            .backend
            .deployment_resource(deployment.id, GRAPH_RESOURCE)
            .await?
            .ok_or_else(|| {
                BackendError::Storage(format!("deployment {} has no graph", deployment.id))
            })?;
        let graph = Arc::new(ExecutableGraph::decode(&raw)?);
        self.graphs.insert(name.to_string(), graph.clone());
        Ok(graph)
    }

    pub async fn active_deployments(&self) -> Result<Vec<Deployment>, FlowError> {
        let mut deployments = self.backend.list_active_deployments().await?;
        deployments.sort_by(|a, b| a.deployed_at.cmp(&b.deployed_at));
        Ok(deployments)
    }

    /// Active deployment serving `name`; the caller holds the lock.
    ///
    /// When several are active the most recent one wins.
    pub(crate) async fn select_active(&self, name: &str) -> Result<Deployment, FlowError> {
        let mut matching: Vec<Deployment> = self
            .backend
            .list_active_deployments()
            .await?
            .into_iter()
            .filter(|deployment| deployment.name == name)
            .collect();
        matching.sort_by(|a, b| b.deployed_at.cmp(&a.deployed_at));

        let mut matching = matching.into_iter();
        let selected = matching
            .next()
            .ok_or_else(|| FlowError::NotFound(name.to_string()))?;
        let others: Vec<String> = matching.map(|d| d.id.to_string()).collect();
        if !others.is_empty() {
            tracing::warn!(
                "Workflow {} has several active deployments, using {} and ignoring {}",
                name,
                selected.id,
                others.join(", ")
            );
        }
        Ok(selected)
    }

    pub(crate) fn lock(&self) -> &Arc<RwLock<()>> {
        &self.lock
    }

    pub(crate) fn backend(&self) -> &Arc<dyn ExecutionBackend> {
        &self.backend
    }

    async fn stop(&self, deployment: &Deployment) -> Result<(), FlowError> {
        self.backend.delete_deployment(deployment.id, true).await?;
        self.graphs.clear();
        tracing::info!("Removed workflow {}", deployment.name);
        self.audit.undeployed(deployment);
        Ok(())
    }
}

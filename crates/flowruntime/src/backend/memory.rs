use super::template::interpolate;
use super::{CorrelationResult, DeploymentRequest, ExecutionBackend, StepHandler, StepInvocation};
use crate::graph::{ExecutableGraph, GraphNode, Transition};
use async_trait::async_trait;
use flowcore::{
    BackendError, Deployment, DeploymentId, RunningInstance, Variable, GRAPH_RESOURCE,
};
use futures::stream::{FuturesUnordered, StreamExt};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Where an instance stands after its last step chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum InstanceStatus {
    Running,
    Waiting { messages: Vec<String> },
    Completed,
    Failed { activity_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    pub id: String,
    pub workflow_id: String,
    pub deployment_id: DeploymentId,
    #[serde(flatten)]
    pub status: InstanceStatus,
    /// Activity ids in the order they were dispatched.
    pub executed: Vec<String>,
    pub variables: HashMap<String, Variable>,
}

struct DeploymentRecord {
    deployment: Deployment,
    graph: Arc<ExecutableGraph>,
    resources: HashMap<String, Vec<u8>>,
}

struct Progress {
    status: InstanceStatus,
    /// Node to continue from once a waited-for message arrives.
    resume_at: Option<NodeIndex>,
    executed: Vec<String>,
}

struct InstanceRecord {
    id: String,
    definition_id: String,
    deployment_id: DeploymentId,
    graph: Arc<ExecutableGraph>,
    variables: RwLock<HashMap<String, Variable>>,
    // held for a whole step chain, so steps of one instance never overlap
    progress: Mutex<Progress>,
}

#[derive(Default)]
struct BackendState {
    deployments: HashMap<DeploymentId, DeploymentRecord>,
    instances: HashMap<String, Arc<InstanceRecord>>,
}

/// Execution backend that keeps everything in memory and walks the
/// executable graph itself.
pub struct InMemoryBackend {
    handler: Arc<dyn StepHandler>,
    state: RwLock<BackendState>,
}

impl InMemoryBackend {
    pub fn new(handler: Arc<dyn StepHandler>) -> Self {
        Self {
            handler,
            state: RwLock::new(BackendState::default()),
        }
    }

    pub async fn instances(&self) -> Vec<InstanceSnapshot> {
        let records: Vec<Arc<InstanceRecord>> =
            self.state.read().await.instances.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(records.len());
        for record in records {
            snapshots.push(snapshot(&record).await);
        }
        snapshots
    }

    pub async fn instance(&self, id: &str) -> Option<InstanceSnapshot> {
        let record = self.state.read().await.instances.get(id).cloned()?;
        Some(snapshot(&record).await)
    }

    fn start_candidates(state: &BackendState, message: &str) -> Vec<(DeploymentId, Arc<ExecutableGraph>, NodeIndex)> {
        let mut latest: HashMap<&str, &DeploymentRecord> = HashMap::new();
        for record in state.deployments.values() {
            latest
                .entry(record.deployment.name.as_str())
                .and_modify(|current| {
                    if record.deployment.deployed_at > current.deployment.deployed_at {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        latest
            .into_values()
            .filter_map(|record| {
                record
                    .graph
                    .start_nodes(message)
                    .first()
                    .map(|start| (record.deployment.id, record.graph.clone(), *start))
            })
            .collect()
    }

    async fn start(
        &self,
        deployment_id: DeploymentId,
        graph: Arc<ExecutableGraph>,
        start: NodeIndex,
        variables: HashMap<String, Variable>,
    ) -> Result<Arc<InstanceRecord>, BackendError> {
        let mut initial = HashMap::with_capacity(graph.variables.len() + variables.len());
        for (name, value) in &graph.variables {
            initial.insert(name.clone(), Variable::from_value(value.clone())?);
        }
        initial.extend(variables);

        let record = Arc::new(InstanceRecord {
            id: Uuid::new_v4().to_string(),
            definition_id: format!("{}:{}", graph.workflow_id, deployment_id),
            deployment_id,
            graph,
            variables: RwLock::new(initial),
            progress: Mutex::new(Progress {
                status: InstanceStatus::Running,
                resume_at: Some(start),
                executed: Vec::new(),
            }),
        });

        self.state
            .write()
            .await
            .instances
            .insert(record.id.clone(), record.clone());
        tracing::debug!(
            "Started instance {} of workflow {}",
            record.id,
            record.graph.workflow_id
        );
        Ok(record)
    }

    /// Walks the graph from the instance's resume point until it waits,
    /// completes or fails.
    async fn run(&self, record: Arc<InstanceRecord>) {
        let mut progress = record.progress.lock().await;
        // another delivery already consumed the resume point
        let Some(resume_at) = progress.resume_at.take() else {
            return;
        };
        progress.status = InstanceStatus::Running;
        let mut cursor = Some(resume_at);

        while let Some(index) = cursor {
            let Some(node) = record.graph.node(index) else {
                tracing::error!("Instance {} reached a missing graph node", record.id);
                break;
            };
            match node {
                GraphNode::Start { .. } => cursor = record.graph.next(index, Transition::Next),
                GraphNode::Wait { messages } => {
                    tracing::debug!("Instance {} waiting for {:?}", record.id, messages);
                    progress.status = InstanceStatus::Waiting {
                        messages: messages.clone(),
                    };
                    progress.resume_at = record.graph.next(index, Transition::Next);
                    return;
                }
                GraphNode::End => break,
                GraphNode::Activity(activity) => {
                    let variables = record.variables.read().await.clone();
                    let step = StepInvocation {
                        executor: activity.executor.clone(),
                        activity: interpolate(&activity.activity, &variables),
                        instance: Arc::new(StepView {
                            record: record.clone(),
                            activity_id: activity.id.clone(),
                            activity_instance_id: format!("{}:{}", activity.id, Uuid::new_v4()),
                        }),
                    };
                    progress.executed.push(activity.id.clone());

                    match self.handler.handle(step).await {
                        Ok(()) => cursor = record.graph.next(index, Transition::Next),
                        Err(failure) => match record.graph.next(index, Transition::OnFailure) {
                            Some(handler) => {
                                tracing::debug!(
                                    "Instance {} caught {} from {}",
                                    record.id,
                                    failure.name,
                                    activity.id
                                );
                                cursor = Some(handler);
                            }
                            None => {
                                progress.status = InstanceStatus::Failed {
                                    activity_id: activity.id.clone(),
                                };
                                return;
                            }
                        },
                    }
                }
            }
        }

        tracing::debug!("Instance {} completed", record.id);
        progress.status = InstanceStatus::Completed;
    }
}

#[async_trait]
impl ExecutionBackend for InMemoryBackend {
    async fn deploy(&self, request: DeploymentRequest) -> Result<Deployment, BackendError> {
        let raw = request.resources.get(GRAPH_RESOURCE).ok_or_else(|| {
            BackendError::Storage(format!("deployment {} has no {} resource", request.name, GRAPH_RESOURCE))
        })?;
        let graph = Arc::new(ExecutableGraph::decode(raw)?);
        let deployment = Deployment::new(request.name);

        self.state.write().await.deployments.insert(
            deployment.id,
            DeploymentRecord {
                deployment: deployment.clone(),
                graph,
                resources: request.resources,
            },
        );
        Ok(deployment)
    }

    async fn list_active_deployments(&self) -> Result<Vec<Deployment>, BackendError> {
        Ok(self
            .state
            .read()
            .await
            .deployments
            .values()
            .map(|record| record.deployment.clone())
            .collect())
    }

    async fn deployment(&self, id: DeploymentId) -> Result<Option<Deployment>, BackendError> {
        Ok(self
            .state
            .read()
            .await
            .deployments
            .get(&id)
            .map(|record| record.deployment.clone()))
    }

    async fn delete_deployment(&self, id: DeploymentId, cascade: bool) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        if !state.deployments.contains_key(&id) {
            return Err(BackendError::DeploymentNotFound(id.to_string()));
        }

        let owned: Vec<String> = state
            .instances
            .values()
            .filter(|instance| instance.deployment_id == id)
            .map(|instance| instance.id.clone())
            .collect();
        if !owned.is_empty() && !cascade {
            return Err(BackendError::Storage(format!(
                "deployment {} still has {} instances",
                id,
                owned.len()
            )));
        }
        for instance in owned {
            state.instances.remove(&instance);
        }
        state.deployments.remove(&id);
        Ok(())
    }

    async fn deployment_resource(
        &self,
        id: DeploymentId,
        name: &str,
    ) -> Result<Option<Vec<u8>>, BackendError> {
        let state = self.state.read().await;
        let record = state
            .deployments
            .get(&id)
            .ok_or_else(|| BackendError::DeploymentNotFound(id.to_string()))?;
        Ok(record.resources.get(name).cloned())
    }

    async fn correlate(
        &self,
        message: &str,
        variables: HashMap<String, Variable>,
    ) -> Result<CorrelationResult, BackendError> {
        self.deliver(message, variables, None).await
    }

    async fn correlate_in(
        &self,
        deployment: DeploymentId,
        message: &str,
        variables: HashMap<String, Variable>,
    ) -> Result<CorrelationResult, BackendError> {
        self.deliver(message, variables, Some(deployment)).await
    }
}

impl InMemoryBackend {
    /// Starts new instances for `message`, in `pinned` only when given,
    /// and resumes every instance waiting for it.
    async fn deliver(
        &self,
        message: &str,
        variables: HashMap<String, Variable>,
        pinned: Option<DeploymentId>,
    ) -> Result<CorrelationResult, BackendError> {
        let (candidates, instances) = {
            let state = self.state.read().await;
            let candidates = match pinned {
                Some(id) => {
                    let record = state
                        .deployments
                        .get(&id)
                        .ok_or_else(|| BackendError::DeploymentNotFound(id.to_string()))?;
                    record
                        .graph
                        .start_nodes(message)
                        .first()
                        .map(|start| vec![(id, record.graph.clone(), *start)])
                        .unwrap_or_default()
                }
                None => Self::start_candidates(&state, message),
            };
            (candidates, state.instances.values().cloned().collect::<Vec<_>>())
        };

        let mut result = CorrelationResult::default();
        let mut runs = Vec::with_capacity(candidates.len());

        for (deployment_id, graph, start) in candidates {
            let record = self.start(deployment_id, graph, start, variables.clone()).await?;
            result.started.push(record.id.clone());
            runs.push(record);
        }

        let mut waiting = Vec::new();
        for instance in instances {
            // a locked instance is running a chain and not waiting
            let Ok(mut progress) = instance.progress.try_lock() else {
                continue;
            };
            if matches!(&progress.status, InstanceStatus::Waiting { messages } if messages.iter().any(|m| m == message))
            {
                // claimed, so a concurrent delivery of the same message skips it
                progress.status = InstanceStatus::Running;
                drop(progress);
                waiting.push(instance);
            }
        }

        for record in waiting {
            record.variables.write().await.extend(variables.clone());
            tracing::debug!("Resuming instance {} on {}", record.id, message);
            result.resumed.push(record.id.clone());
            runs.push(record);
        }

        let mut running: FuturesUnordered<_> =
            runs.into_iter().map(|record| self.run(record)).collect();
        while running.next().await.is_some() {}

        if result.is_empty() {
            tracing::debug!("No instance correlated for message {}", message);
        }
        Ok(result)
    }
}

async fn snapshot(record: &InstanceRecord) -> InstanceSnapshot {
    let progress = record.progress.lock().await;
    InstanceSnapshot {
        id: record.id.clone(),
        workflow_id: record.graph.workflow_id.clone(),
        deployment_id: record.deployment_id,
        status: progress.status.clone(),
        executed: progress.executed.clone(),
        variables: record.variables.read().await.clone(),
    }
}

/// The instance as seen by one activity step.
struct StepView {
    record: Arc<InstanceRecord>,
    activity_id: String,
    activity_instance_id: String,
}

#[async_trait]
impl RunningInstance for StepView {
    fn process_instance_id(&self) -> &str {
        &self.record.id
    }

    fn process_definition_id(&self) -> &str {
        &self.record.definition_id
    }

    fn activity_instance_id(&self) -> &str {
        &self.activity_instance_id
    }

    fn current_activity_id(&self) -> &str {
        &self.activity_id
    }

    async fn variable(&self, name: &str) -> Option<Variable> {
        self.record.variables.read().await.get(name).cloned()
    }

    async fn variables(&self) -> HashMap<String, Variable> {
        self.record.variables.read().await.clone()
    }

    async fn set_variable(&self, name: &str, value: Variable) {
        self.record
            .variables
            .write()
            .await
            .insert(name.to_string(), value);
    }
}

use crate::backend::{StepHandler, StepInvocation};
use crate::codec::StoredActivity;
use crate::registry::{ExecutorRegistry, InvocationParts};
use async_trait::async_trait;
use flowcore::variable::{ERROR, EVENT};
use flowcore::{
    innermost_message, ActivityError, AuditSink, EventHolder, ExecutionErrorRecord,
    ExecutorServices, FlowError, RunningInstance, StepFailure, Variable,
};
use std::sync::Arc;
use tracing::Instrument;

/// Stages of a single step, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    ResolvingExecutor,
    DeserializingConfig,
    Executing,
    Completed,
    Failed,
}

/// Runs one activity step on behalf of the execution backend.
pub struct ActivityDispatcher {
    executors: Arc<ExecutorRegistry>,
    services: ExecutorServices,
    audit: Arc<dyn AuditSink>,
}

impl ActivityDispatcher {
    pub fn new(
        executors: Arc<ExecutorRegistry>,
        services: ExecutorServices,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            executors,
            services,
            audit,
        }
    }

    async fn dispatch(&self, step: StepInvocation) -> Result<(), FlowError> {
        let mut state = StepState::Pending;
        tracing::trace!(?state, executor = %step.executor);

        let stored = StoredActivity::decode(&step.activity)?;

        state = StepState::ResolvingExecutor;
        tracing::trace!(?state, kind = %stored.kind);
        let executor = self.executors.resolve(&step.executor)?;

        let event = match step.instance.variable(EVENT).await {
            Some(variable) => Some(variable.decode::<EventHolder>()?),
            None => None,
        };

        state = StepState::DeserializingConfig;
        tracing::trace!(?state);
        let parts = InvocationParts {
            instance: step.instance.clone(),
            activity_id: stored.id.clone(),
            event,
            services: self.services.clone(),
        };
        let prepared = executor.prepare(stored.config, parts).map_err(|e| {
            FlowError::ActivityExecution {
                activity_id: stored.id.clone(),
                source: ActivityError::Configuration(e.to_string()),
            }
        })?;

        self.audit
            .activity_executed(step.instance.as_ref(), &stored.kind);

        state = StepState::Executing;
        tracing::trace!(?state);
        prepared
            .execute()
            .await
            .map_err(|source| FlowError::ActivityExecution {
                activity_id: stored.id.clone(),
                source,
            })?;

        state = StepState::Completed;
        tracing::trace!(?state);
        Ok(())
    }

    /// Records the failure on the instance before it is signalled.
    async fn fail(&self, instance: &dyn RunningInstance, error: FlowError) -> StepFailure {
        let record = ExecutionErrorRecord {
            message: innermost_message(&error),
            activity_inst_id: instance.activity_instance_id().to_string(),
            activity_id: instance.current_activity_id().to_string(),
        };
        tracing::error!(
            state = ?StepState::Failed,
            "Activity {} failed: {}",
            record.activity_id,
            error
        );

        match Variable::json(&record) {
            Ok(variable) => instance.set_variable(ERROR, variable).await,
            Err(e) => tracing::error!("Unable to record failure of {}: {}", record.activity_id, e),
        }
        StepFailure::failure(error)
    }
}

#[async_trait]
impl StepHandler for ActivityDispatcher {
    async fn handle(&self, step: StepInvocation) -> Result<(), StepFailure> {
        let instance = step.instance.clone();
        let span = tracing::info_span!(
            "activity",
            process_id = instance.process_instance_id(),
            activity_instance_id = instance.activity_instance_id(),
            activity_id = instance.current_activity_id(),
        );

        async move {
            match self.dispatch(step).await {
                Ok(()) => Ok(()),
                Err(error) => Err(self.fail(instance.as_ref(), error).await),
            }
        }
        .instrument(span)
        .await
    }
}

use crate::activity::RunningInstance;
use crate::deployment::{Deployment, DeploymentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Audit trail entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    Deployed {
        deployment_id: DeploymentId,
        name: String,
        timestamp: DateTime<Utc>,
    },
    Undeployed {
        deployment_id: DeploymentId,
        name: String,
        timestamp: DateTime<Utc>,
    },
    ActivityExecuted {
        process_instance_id: String,
        activity_instance_id: String,
        activity_id: String,
        activity_kind: String,
        timestamp: DateTime<Utc>,
    },
}

/// Receives audit notifications. Fire-and-forget: implementations must not
/// fail the operation being audited.
pub trait AuditSink: Send + Sync {
    fn deployed(&self, deployment: &Deployment);

    fn undeployed(&self, deployment: &Deployment);

    fn activity_executed(&self, instance: &dyn RunningInstance, activity_kind: &str);
}

/// Writes the audit trail to the `audit_trail` tracing target.
#[derive(Debug, Default, Clone)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn deployed(&self, deployment: &Deployment) {
        tracing::info!(target: "audit_trail", deployment_id = %deployment.id, name = %deployment.name, "deployed");
    }

    fn undeployed(&self, deployment: &Deployment) {
        tracing::info!(target: "audit_trail", deployment_id = %deployment.id, name = %deployment.name, "undeployed");
    }

    fn activity_executed(&self, instance: &dyn RunningInstance, activity_kind: &str) {
        tracing::info!(
            target: "audit_trail",
            process_instance_id = instance.process_instance_id(),
            activity_id = instance.current_activity_id(),
            activity_kind,
            "activity executed"
        );
    }
}

/// Fans notifications out to several sinks.
#[derive(Default, Clone)]
pub struct AuditSinks {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for AuditSinks {
    fn deployed(&self, deployment: &Deployment) {
        self.sinks.iter().for_each(|s| s.deployed(deployment));
    }

    fn undeployed(&self, deployment: &Deployment) {
        self.sinks.iter().for_each(|s| s.undeployed(deployment));
    }

    fn activity_executed(&self, instance: &dyn RunningInstance, activity_kind: &str) {
        self.sinks
            .iter()
            .for_each(|s| s.activity_executed(instance, activity_kind));
    }
}

/// Broadcasts audit events to live subscribers
pub struct EventBus {
    sender: broadcast::Sender<AuditEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: AuditEvent) {
        // no subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl AuditSink for EventBus {
    fn deployed(&self, deployment: &Deployment) {
        self.emit(AuditEvent::Deployed {
            deployment_id: deployment.id,
            name: deployment.name.clone(),
            timestamp: Utc::now(),
        });
    }

    fn undeployed(&self, deployment: &Deployment) {
        self.emit(AuditEvent::Undeployed {
            deployment_id: deployment.id,
            name: deployment.name.clone(),
            timestamp: Utc::now(),
        });
    }

    fn activity_executed(&self, instance: &dyn RunningInstance, activity_kind: &str) {
        self.emit(AuditEvent::ActivityExecuted {
            process_instance_id: instance.process_instance_id().to_string(),
            activity_instance_id: instance.activity_instance_id().to_string(),
            activity_id: instance.current_activity_id().to_string(),
            activity_kind: activity_kind.to_string(),
            timestamp: Utc::now(),
        });
    }
}

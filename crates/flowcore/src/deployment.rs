use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type DeploymentId = Uuid;

/// Resource holding the serialized executable graph.
pub const GRAPH_RESOURCE: &str = "graph.json";
/// Resource holding the security token, absent when none was set.
pub const TOKEN_RESOURCE: &str = "token";

/// A registered, independently removable executable graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    /// Workflow id the graph was translated from.
    pub name: String,
    pub deployed_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            deployed_at: Utc::now(),
        }
    }
}

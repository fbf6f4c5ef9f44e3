use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type WorkflowId = String;
pub type ActivityId = String;

/// Complete workflow definition, as supplied by the definition source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Variables every new instance starts with.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    pub activities: Vec<ActivitySpec>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            variables: HashMap::new(),
            activities: Vec::new(),
        }
    }

    pub fn with_activity(mut self, activity: ActivitySpec) -> Self {
        self.activities.push(activity);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn find_activity(&self, id: &str) -> Option<&ActivitySpec> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Every activity id used more than once, sorted.
    pub fn duplicated_activity_ids(&self) -> Vec<ActivityId> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for activity in &self.activities {
            *counts.entry(activity.id.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

/// One activity of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActivitySpec {
    pub id: ActivityId,
    /// Activity-kind discriminator, e.g. `send-message`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<EventTrigger>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl ActivitySpec {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            on: None,
            config: serde_json::Map::new(),
        }
    }

    pub fn on(mut self, trigger: EventTrigger) -> Self {
        self.on = Some(trigger);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Event an activity waits for before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum EventTrigger {
    RequestReceived {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    MessageReceived { content: String },
    FormReplied { form_id: String },
    ActivityFailed { activity_id: ActivityId },
    OneOf(Vec<EventTrigger>),
}

impl EventTrigger {
    /// Leaf triggers, with `one-of` groups expanded.
    pub fn leaves(&self) -> Vec<&EventTrigger> {
        match self {
            EventTrigger::OneOf(triggers) => triggers.iter().flat_map(|t| t.leaves()).collect(),
            leaf => vec![leaf],
        }
    }

    /// Correlation message a leaf trigger listens on.
    pub fn message_name(&self, workflow_id: &str) -> Option<String> {
        match self {
            EventTrigger::RequestReceived { .. } => Some(correlation::request_received(workflow_id)),
            EventTrigger::MessageReceived { content } => Some(correlation::message_received(content)),
            EventTrigger::FormReplied { form_id } => Some(correlation::form_replied(form_id)),
            EventTrigger::ActivityFailed { .. } | EventTrigger::OneOf(_) => None,
        }
    }

    pub fn failed_activity(&self) -> Option<&str> {
        match self {
            EventTrigger::ActivityFailed { activity_id } => Some(activity_id),
            _ => None,
        }
    }
}

/// Message names shared by the translator and the event processors.
pub mod correlation {
    pub fn request_received(workflow_id: &str) -> String {
        format!("request-received_{}", workflow_id)
    }

    pub fn message_received(content: &str) -> String {
        format!("message-received_{}", content)
    }

    pub fn form_replied(form_id: &str) -> String {
        format!("form-replied_{}", form_id)
    }
}

use crate::codec::StoredActivity;
use crate::graph::{ActivityNode, ExecutableGraph, GraphNode, Transition};
use crate::registry::ExecutorRegistry;
use flowcore::{ActivitySpec, EventTrigger, FlowError, WorkflowDefinition};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Turns workflow definitions into executable graphs.
///
/// Translation is pure: it reads the executor registry to resolve activity
/// kinds but never touches deployed state.
pub struct WorkflowTranslator {
    executors: Arc<ExecutorRegistry>,
}

impl WorkflowTranslator {
    pub fn new(executors: Arc<ExecutorRegistry>) -> Self {
        Self { executors }
    }

    pub fn translate(&self, definition: &WorkflowDefinition) -> Result<ExecutableGraph, FlowError> {
        check_uniqueness_of_activity_ids(definition)?;
        self.build(definition)
            .map_err(|reason| FlowError::translation(&definition.id, reason))
    }

    fn build(&self, definition: &WorkflowDefinition) -> Result<ExecutableGraph, String> {
        if definition.id.trim().is_empty() {
            return Err("workflow id is empty".to_string());
        }
        if definition.activities.is_empty() {
            return Err("workflow has no activities".to_string());
        }

        let mut graph = ExecutableGraph::new(&definition.id);
        graph.token = request_token(definition)?;
        graph.variables = definition.variables.clone();

        let (handlers, main): (Vec<&ActivitySpec>, Vec<&ActivitySpec>) = definition
            .activities
            .iter()
            .partition(|activity| failure_target(activity).is_some());

        let end = graph.add_node(GraphNode::End);
        let mut previous: Option<NodeIndex> = None;

        for activity in main {
            let messages = trigger_messages(&definition.id, activity)?;
            let node = graph.add_node(self.activity_node(activity)?);

            match previous {
                None => {
                    if messages.is_empty() {
                        return Err(format!(
                            "first activity {} must declare a start event",
                            activity.id
                        ));
                    }
                    for message in messages {
                        let start = graph.add_node(GraphNode::Start { message });
                        graph.connect(start, node, Transition::Next);
                    }
                }
                Some(previous) if messages.is_empty() => {
                    graph.connect(previous, node, Transition::Next);
                }
                Some(previous) => {
                    let wait = graph.add_node(GraphNode::Wait { messages });
                    graph.connect(previous, wait, Transition::Next);
                    graph.connect(wait, node, Transition::Next);
                }
            }
            previous = Some(node);
        }

        match previous {
            Some(last) => graph.connect(last, end, Transition::Next),
            None => return Err("workflow has no activity reachable from a start event".to_string()),
        }

        // a handler reachable only through its own failure never runs
        let targets: HashMap<&str, &str> = handlers
            .iter()
            .filter_map(|handler| failure_target(handler).map(|target| (handler.id.as_str(), target)))
            .collect();
        for handler in &handlers {
            let mut seen = HashSet::new();
            let mut current = handler.id.as_str();
            while let Some(target) = targets.get(current) {
                if !seen.insert(current) {
                    return Err(format!(
                        "failure handler {} can never run: its activity-failed chain loops",
                        handler.id
                    ));
                }
                current = *target;
            }
        }

        // handler nodes first, so handlers may guard other handlers
        let mut handler_nodes = Vec::with_capacity(handlers.len());
        for handler in &handlers {
            let node = graph.add_node(self.activity_node(handler)?);
            graph.connect(node, end, Transition::Next);
            handler_nodes.push(node);
        }

        let mut guarded: HashMap<String, String> = HashMap::new();
        for (handler, node) in handlers.iter().zip(handler_nodes) {
            let target_id = failure_target(handler).unwrap_or_default();
            let target = graph.activity_index(target_id).ok_or_else(|| {
                format!(
                    "activity {} handles failures of unknown activity {}",
                    handler.id, target_id
                )
            })?;
            if let Some(existing) = guarded.insert(target_id.to_string(), handler.id.clone()) {
                return Err(format!(
                    "activity {} already handles failures of {}",
                    existing, target_id
                ));
            }
            graph.connect(target, node, Transition::OnFailure);
        }

        tracing::debug!(
            "Translated workflow {} into {} graph nodes",
            definition.id,
            graph.node_count()
        );
        Ok(graph)
    }

    fn activity_node(&self, activity: &ActivitySpec) -> Result<GraphNode, String> {
        let factory = self.executors.factory_for_kind(&activity.kind).ok_or_else(|| {
            format!(
                "unknown activity kind '{}' for activity {}",
                activity.kind, activity.id
            )
        })?;

        let config = serde_json::Value::Object(activity.config.clone());
        // templated values are only known once the instance runs
        if !has_placeholder(&config) {
            factory.validate_config(&config).map_err(|e| {
                format!("invalid configuration for activity {}: {}", activity.id, e)
            })?;
        }

        let stored = StoredActivity {
            id: activity.id.clone(),
            kind: activity.kind.clone(),
            config,
        };
        Ok(GraphNode::Activity(ActivityNode {
            id: activity.id.clone(),
            kind: activity.kind.clone(),
            executor: factory.implementation().to_string(),
            activity: stored.encode().map_err(|e| e.to_string())?,
        }))
    }
}

fn check_uniqueness_of_activity_ids(definition: &WorkflowDefinition) -> Result<(), FlowError> {
    let ids = definition.duplicated_activity_ids();
    if ids.is_empty() {
        Ok(())
    } else {
        Err(FlowError::DuplicateIdentifier {
            workflow_id: definition.id.clone(),
            ids,
        })
    }
}

/// Activity id whose failure `activity` handles, when it is a failure handler.
fn failure_target(activity: &ActivitySpec) -> Option<&str> {
    activity.on.as_ref().and_then(EventTrigger::failed_activity)
}

fn trigger_messages(workflow_id: &str, activity: &ActivitySpec) -> Result<Vec<String>, String> {
    let Some(trigger) = &activity.on else {
        return Ok(Vec::new());
    };
    let leaves = trigger.leaves();
    if leaves.iter().any(|leaf| leaf.failed_activity().is_some()) {
        return Err(format!(
            "activity {} combines activity-failed with other events",
            activity.id
        ));
    }
    Ok(leaves
        .into_iter()
        .filter_map(|leaf| leaf.message_name(workflow_id))
        .collect())
}

fn request_token(definition: &WorkflowDefinition) -> Result<Option<String>, String> {
    let tokens: BTreeSet<&str> = definition
        .activities
        .iter()
        .filter_map(|activity| activity.on.as_ref())
        .flat_map(|trigger| trigger.leaves())
        .filter_map(|leaf| match leaf {
            EventTrigger::RequestReceived { token: Some(token) } if !token.is_empty() => {
                Some(token.as_str())
            }
            _ => None,
        })
        .collect();

    if tokens.len() > 1 {
        return Err("request-received events declare different tokens".to_string());
    }
    Ok(tokens.into_iter().next().map(str::to_string))
}

fn has_placeholder(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => s.contains("${"),
        serde_json::Value::Array(items) => items.iter().any(has_placeholder),
        serde_json::Value::Object(map) => map.values().any(has_placeholder),
        _ => false,
    }
}

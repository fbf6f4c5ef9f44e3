use flowcore::Value;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node of an executable graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "kebab-case")]
pub enum GraphNode {
    /// Starts a new instance when `message` is correlated.
    Start { message: String },
    Activity(ActivityNode),
    /// Suspends the instance until one of `messages` is correlated.
    Wait { messages: Vec<String> },
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityNode {
    pub id: String,
    pub kind: String,
    /// Implementation identifier resolved through the executor registry.
    pub executor: String,
    /// Serialized activity envelope, see [`crate::codec::StoredActivity`].
    pub activity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    Next,
    /// Taken when the source activity signals a failure.
    OnFailure,
}

/// Backend-native form of a translated workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableGraph {
    pub workflow_id: String,
    pub token: Option<String>,
    /// Variables every new instance starts with.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    graph: DiGraph<GraphNode, Transition>,
}

impl ExecutableGraph {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            token: None,
            variables: HashMap::new(),
            graph: DiGraph::new(),
        }
    }

    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex, transition: Transition) {
        self.graph.add_edge(from, to, transition);
    }

    pub fn node(&self, index: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(index)
    }

    /// Successor of `index` along `transition`.
    pub fn next(&self, index: NodeIndex, transition: Transition) -> Option<NodeIndex> {
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .find(|edge| *edge.weight() == transition)
            .map(|edge| edge.target())
    }

    /// Start nodes listening on `message`.
    pub fn start_nodes(&self, message: &str) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|idx| matches!(&self.graph[*idx], GraphNode::Start { message: m } if m == message))
            .collect()
    }

    pub fn start_messages(&self) -> Vec<&str> {
        self.graph
            .node_weights()
            .filter_map(|node| match node {
                GraphNode::Start { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn activity_index(&self, activity_id: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|idx| matches!(&self.graph[*idx], GraphNode::Activity(a) if a.id == activity_id))
    }

    pub fn activities(&self) -> impl Iterator<Item = &ActivityNode> {
        self.graph.node_weights().filter_map(|node| match node {
            GraphNode::Activity(activity) => Some(activity),
            _ => None,
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

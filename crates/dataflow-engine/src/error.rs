//! Error types for the dataflow engine

use thiserror::Error;

use crate::types::{LinkId, NodeId};

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while mutating or running a graph
///
/// Rejected connections are not errors: `connect` reports them as
/// `Ok(None)` and leaves the graph untouched.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node id could not be resolved in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A link id could not be resolved in the graph
    #[error("Link not found: {0}")]
    LinkNotFound(LinkId),

    /// The registry has no entry for a node type
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// The graph already holds the configured maximum number of nodes
    #[error("Graph is full: at most {0} nodes allowed")]
    TooManyNodes(usize),

    /// A builder connection was refused by the validator or a node hook
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    /// A node behavior failed while executing or handling an action
    #[error("Node {node} failed: {message}")]
    Execution { node: NodeId, message: String },

    /// Snapshot data could not be interpreted
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create an execution error for a node with a message
    pub fn failed(node: &NodeId, msg: impl Into<String>) -> Self {
        Self::Execution {
            node: node.clone(),
            message: msg.into(),
        }
    }
}

//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use dataflow_engine::{EngineConfig, Graph, GraphBuilder, NodeId, NodeRegistry};
use serde_json::Value;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Registry with every built-in node type
pub fn builtins() -> Arc<NodeRegistry> {
    init_logging();
    Arc::new(NodeRegistry::with_builtins())
}

/// Empty graph over the built-in types
pub fn graph() -> Graph {
    Graph::new(EngineConfig::default(), builtins())
}

pub fn builder() -> GraphBuilder {
    GraphBuilder::new(builtins(), EngineConfig::default())
}

/// Property value of a node, or `Null` when absent
pub fn property(graph: &Graph, id: &NodeId, name: &str) -> Value {
    graph
        .node(id)
        .and_then(|n| n.property(name))
        .cloned()
        .unwrap_or(Value::Null)
}

//! Dataflow Engine - typed node graphs with event-driven execution
//!
//! This crate provides a single-threaded dataflow graph engine in the
//! style of visual node editors. It supports:
//!
//! - Typed slots with a connection validator (`*`, events, `a,b` unions)
//! - Topological execution order with priorities and levels
//! - A step loop polling `Always` nodes, with lifecycle hooks
//! - Event triggers and actions, optionally deferred by one pass
//! - Ancestor refresh before triggered nodes run
//! - Re-entrancy guards and per-call uniqueness
//! - JSON snapshots that tolerate unknown node types
//!
//! # Architecture
//!
//! - `Graph`: owns nodes and links; every structural mutation goes through it
//! - `NodeBehavior`: per-type logic, queried for `Executable`/`Actionable`
//! - `NodeRegistry`: explicit type table, filled by hand or from `inventory`
//! - `EventSink`: observation channel for editors and tests
//!
//! # Example
//!
//! ```ignore
//! use dataflow_engine::{EngineConfig, Graph, NodeRegistry};
//!
//! let registry = Arc::new(NodeRegistry::with_builtins());
//! let mut graph = Graph::new(EngineConfig::default(), registry);
//! let a = graph.add_new("basic/const")?;
//! let b = graph.add_new("basic/watch")?;
//! graph.connect(&a, 0, &b, 0)?;
//! graph.start();
//! graph.tick()?;
//! ```

pub mod behavior;
pub mod builder;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod graph;
pub mod link;
pub mod node;
pub mod registry;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export key types
pub use behavior::{Actionable, ExecOptions, Executable, NodeBehavior, NodeContext};
pub use builder::{BuiltGraph, GraphBuilder};
pub use config::{EngineConfig, ErrorPolicy, IdScheme};
pub use descriptor::{NodeDescriptor, NodeTypeMetadata, SlotSpec};
pub use error::{GraphError, Result};
pub use events::{EventSink, GraphEvent, NullEventSink, VecEventSink};
pub use graph::{
    AncestorFilter, ConnectByTypeOptions, Graph, GraphParam, GraphSnapshot, Layout, Lifecycle,
};
pub use link::Link;
pub use node::{InputSlot, Node, NodeSnapshot, OutputSlot};
pub use registry::{BehaviorFactory, NodeRegistry, NodeTypeFn};
pub use types::{GraphStatus, Id, LinkId, NodeId, NodeMode, SlotKind, SlotRef, SlotType};
pub use validation::{is_valid_connection, is_valid_connection_str, validate_graph, ValidationError};

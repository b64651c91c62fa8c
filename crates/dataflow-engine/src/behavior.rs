//! Node behaviors and the execution context handed to them
//!
//! A node's runtime logic lives in a boxed [`NodeBehavior`]. Capabilities
//! are discovered through [`NodeBehavior::as_executable`] and
//! [`NodeBehavior::as_actionable`]; everything else is an optional hook
//! with a no-op default.
//!
//! While a behavior runs it is detached from its node and receives a
//! [`NodeContext`] with mutable access to the owning graph.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Clone, Default)]
//! struct Doubler;
//!
//! impl NodeBehavior for Doubler {
//!     fn as_executable(&mut self) -> Option<&mut dyn Executable> {
//!         Some(self)
//!     }
//! }
//!
//! impl Executable for Doubler {
//!     fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _: &Value, _: &ExecOptions) -> Result<()> {
//!         let x = ctx.input_data(0).and_then(|v| v.as_f64()).unwrap_or(0.0);
//!         ctx.set_output_data(0, json!(x * 2.0));
//!         Ok(())
//!     }
//! }
//! ```

use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::link::Link;
use crate::node::Node;
use crate::types::{LinkId, NodeId, SlotKind, SlotType};

/// Per-call options threaded through execution and action delivery
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOptions {
    /// Identifier of the logical call, used by the uniqueness guards
    pub action_call: Option<String>,
    /// Input slot an action arrived on
    pub target_slot: Option<usize>,
    /// Link an event travelled through
    pub link_id: Option<LinkId>,
}

impl ExecOptions {
    /// Options carrying an explicit call id
    pub fn with_call(call: impl Into<String>) -> Self {
        Self {
            action_call: Some(call.into()),
            ..Self::default()
        }
    }
}

/// Polling entry point of a node
pub trait Executable {
    fn on_execute(
        &mut self,
        ctx: &mut NodeContext<'_>,
        param: &Value,
        options: &ExecOptions,
    ) -> Result<()>;
}

/// Action entry point of a node
pub trait Actionable {
    /// Handle an action named after the input slot it arrived on
    fn on_action(
        &mut self,
        ctx: &mut NodeContext<'_>,
        action: &str,
        param: &Value,
        options: &ExecOptions,
    ) -> Result<()>;
}

/// Boxed cloning for behaviors
pub trait CloneBehavior {
    fn clone_box(&self) -> Box<dyn NodeBehavior>;
}

impl<T> CloneBehavior for T
where
    T: NodeBehavior + Clone,
{
    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }
}

/// Runtime logic of a node type
pub trait NodeBehavior: CloneBehavior + Send + 'static {
    /// Polling capability, if the node has one
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        None
    }

    /// Action capability, if the node has one
    fn as_actionable(&mut self) -> Option<&mut dyn Actionable> {
        None
    }

    /// Type-level priority; overrides the node's own priority when set
    fn class_priority(&self) -> Option<i32> {
        None
    }

    fn on_added(&mut self, _ctx: &mut NodeContext<'_>) {}

    fn on_removed(&mut self) {}

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {}

    fn on_stop(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// A slot of this node gained or lost a link
    fn on_connections_change(
        &mut self,
        _kind: SlotKind,
        _slot: usize,
        _connected: bool,
        _link: &Link,
    ) {
    }

    /// Veto a connection to one of this node's slots
    fn accepts_connection(&self, _kind: SlotKind, _slot: usize, _other: &SlotType) -> bool {
        true
    }

    /// Return false to restore the previous value
    fn on_property_changed(
        &mut self,
        _name: &str,
        _value: &Value,
        _previous: Option<&Value>,
    ) -> bool {
        true
    }

    /// Called with the raw node snapshot after it has been applied
    fn on_configure(&mut self, _data: &Value) {}

    /// Add extra fields to the node snapshot
    fn on_serialize(&self, _data: &mut Map<String, Value>) {}
}

/// A node's view of its graph while one of its hooks runs
pub struct NodeContext<'g> {
    graph: &'g mut Graph,
    node_id: NodeId,
}

impl<'g> NodeContext<'g> {
    pub(crate) fn new(graph: &'g mut Graph, node_id: NodeId) -> Self {
        Self { graph, node_id }
    }

    /// Id of the node being run
    pub fn id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut *self.graph
    }

    /// The node's slots and properties (its behavior is detached while running)
    pub fn node(&self) -> Option<&Node> {
        self.graph.node(&self.node_id)
    }

    /// Last value on the link feeding an input slot
    pub fn input_data(&self, slot: usize) -> Option<Value> {
        self.graph.input_data(&self.node_id, slot)
    }

    pub fn input_data_by_name(&self, name: &str) -> Option<Value> {
        self.graph.input_data_by_name(&self.node_id, name)
    }

    /// Run the upstream node (and optionally its ancestors) before reading
    pub fn pull_input_data(&mut self, slot: usize, refresh_tree: bool) -> Result<Option<Value>> {
        let id = self.node_id.clone();
        self.graph.pull_input_data(&id, slot, refresh_tree)
    }

    /// Linked input data when connected, otherwise the property of that name
    pub fn input_or_property(&self, name: &str) -> Option<Value> {
        self.graph.input_or_property(&self.node_id, name)
    }

    pub fn is_input_connected(&self, slot: usize) -> bool {
        self.node().is_some_and(|n| n.is_input_connected(slot))
    }

    pub fn set_output_data(&mut self, slot: usize, value: Value) {
        let id = self.node_id.clone();
        self.graph.set_output_data(&id, slot, value);
    }

    pub fn set_output_data_by_name(&mut self, name: &str, value: Value) {
        let slot = self.node().and_then(|n| n.find_output_slot(name));
        if let Some(slot) = slot {
            self.set_output_data(slot, value);
        }
    }

    pub fn output_data(&self, slot: usize) -> Option<&Value> {
        self.graph.output_data(&self.node_id, slot)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.node().and_then(|n| n.property(name))
    }

    /// Set a property without invoking the change hook
    pub fn set_property(&mut self, name: &str, value: Value) {
        if let Some(node) = self.graph.node_mut(&self.node_id) {
            node.properties_mut().insert(name.to_string(), value);
        }
    }

    /// Fire event outputs named `event`, or all event outputs for `None`
    pub fn trigger(&mut self, event: Option<&str>, param: Value) -> Result<()> {
        self.trigger_with_options(event, param, &ExecOptions::default())
    }

    pub fn trigger_with_options(
        &mut self,
        event: Option<&str>,
        param: Value,
        options: &ExecOptions,
    ) -> Result<()> {
        let id = self.node_id.clone();
        self.graph.trigger(&id, event, &param, options)
    }

    pub fn trigger_slot(&mut self, slot: usize, param: Value) -> Result<()> {
        let id = self.node_id.clone();
        self.graph
            .trigger_slot(&id, slot, &param, None, &ExecOptions::default())
    }

    /// Value of a graph-level input
    pub fn graph_input(&self, name: &str) -> Option<&Value> {
        self.graph.graph_input_data(name)
    }

    /// Write a graph-level output
    pub fn set_graph_output(&mut self, name: &str, value: Value) -> bool {
        self.graph.set_graph_output_data(name, value)
    }

    /// Fixed-step clock in seconds
    pub fn fixed_time(&self) -> f64 {
        self.graph.fixed_time()
    }

    pub fn iteration(&self) -> u64 {
        self.graph.iteration()
    }

    /// Execution error attributed to this node
    pub fn fail(&self, msg: impl Into<String>) -> GraphError {
        GraphError::failed(&self.node_id, msg)
    }
}

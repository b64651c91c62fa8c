//! The graph: node and link store, scheduler and event propagation
//!
//! The graph owns every node and link. All structural mutations go through
//! it so that both ends of a link stay consistent and the execution order
//! stays current.
//!
//! - `connect`: slot connection protocol
//! - `order`: execution order and level layout
//! - `step`: run state and the step loop
//! - `exec`: guarded execution, actions and event propagation
//! - `ancestors`: upstream traversal and recomputation
//! - `snapshot`: serialize / configure

mod ancestors;
mod connect;
mod exec;
mod order;
mod snapshot;
mod step;

pub use ancestors::AncestorFilter;
pub use connect::ConnectByTypeOptions;
pub use order::Layout;
pub use snapshot::GraphSnapshot;
pub use step::Lifecycle;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::behavior::{NodeBehavior, NodeContext};
use crate::config::{EngineConfig, IdScheme};
use crate::error::{GraphError, Result};
use crate::events::{EventSink, GraphEvent, NullEventSink};
use crate::link::Link;
use crate::node::Node;
use crate::registry::NodeRegistry;
use crate::types::{GraphStatus, Id, LinkId, NodeId, SlotType};

/// A named graph-level input or output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: SlotType,
    pub value: Value,
}

/// Per-step re-entrancy bookkeeping, cleared after every step
#[derive(Debug, Default)]
struct Guards {
    executing: HashSet<NodeId>,
    actioning: HashMap<NodeId, String>,
    ancestors_calculated: HashSet<NodeId>,
    executed_action: HashMap<NodeId, String>,
}

impl Guards {
    fn clear(&mut self) {
        self.executing.clear();
        self.actioning.clear();
        self.ancestors_calculated.clear();
        self.executed_action.clear();
    }
}

#[derive(Debug, Clone, Copy)]
enum ParamSide {
    Input,
    Output,
}

/// A dataflow graph
pub struct Graph {
    config: EngineConfig,
    registry: Arc<NodeRegistry>,
    events: Arc<dyn EventSink>,

    nodes: HashMap<NodeId, Node>,
    node_list: Vec<NodeId>,
    links: BTreeMap<LinkId, Link>,
    last_node_id: u64,
    last_link_id: u64,
    version: u64,

    status: GraphStatus,
    iteration: u64,
    pass: u64,
    call_seq: u64,
    guards: Guards,
    ancestors_call: bool,
    errors_in_execution: bool,

    nodes_in_order: Vec<NodeId>,
    nodes_executable: Vec<NodeId>,
    batch_depth: usize,
    order_dirty: bool,

    inputs: BTreeMap<String, GraphParam>,
    outputs: BTreeMap<String, GraphParam>,
    groups: Vec<Value>,
    config_data: Map<String, Value>,
    extra: Map<String, Value>,
    vars: Map<String, Value>,

    clock: Instant,
    globaltime: f64,
    fixedtime: f64,
    elapsed_time: f64,
    execution_time: f64,
    starttime: f64,
    last_update_time: f64,
    last_trigger_time: Option<f64>,
}

impl Graph {
    /// Create an empty graph
    pub fn new(config: EngineConfig, registry: Arc<NodeRegistry>) -> Self {
        Self {
            config,
            registry,
            events: Arc::new(NullEventSink),
            nodes: HashMap::new(),
            node_list: Vec::new(),
            links: BTreeMap::new(),
            last_node_id: 0,
            last_link_id: 0,
            version: 0,
            status: GraphStatus::Stopped,
            iteration: 0,
            pass: 0,
            call_seq: 0,
            guards: Guards::default(),
            ancestors_call: false,
            errors_in_execution: false,
            nodes_in_order: Vec::new(),
            nodes_executable: Vec::new(),
            batch_depth: 0,
            order_dirty: false,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            groups: Vec::new(),
            config_data: Map::new(),
            extra: Map::new(),
            vars: Map::new(),
            clock: Instant::now(),
            globaltime: 0.0,
            fixedtime: 0.0,
            elapsed_time: 0.0,
            execution_time: 0.0,
            starttime: 0.0,
            last_update_time: 0.0,
            last_trigger_time: None,
        }
    }

    /// Attach an observer for graph events
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.events = sink;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn status(&self) -> GraphStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == GraphStatus::Running
    }

    /// Number of completed steps
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Structural change counter
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Clock time at the start of the last step, in seconds
    pub fn globaltime(&self) -> f64 {
        self.globaltime
    }

    /// Fixed-step clock, advanced once per inner step iteration
    pub fn fixed_time(&self) -> f64 {
        self.fixedtime
    }

    /// Seconds between the last two steps
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    /// Wall time spent in the last step, in seconds
    pub fn execution_time(&self) -> f64 {
        self.execution_time
    }

    /// Clock time of the last fired event
    pub fn last_trigger_time(&self) -> Option<f64> {
        self.last_trigger_time
    }

    /// Set when a contained error stopped the graph
    pub fn errors_in_execution(&self) -> bool {
        self.errors_in_execution
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_list.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_list
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    /// Links ordered by id
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Cached execution order of all nodes
    pub fn nodes_in_order(&self) -> &[NodeId] {
        &self.nodes_in_order
    }

    /// Cached execution order restricted to executable nodes
    pub fn nodes_executable(&self) -> &[NodeId] {
        &self.nodes_executable
    }

    pub fn groups(&self) -> &[Value] {
        &self.groups
    }

    /// Opaque `config` section of snapshots
    pub fn config_data(&self) -> &Map<String, Value> {
        &self.config_data
    }

    pub fn config_data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.config_data
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn extra_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extra
    }

    /// Scratch variables shared by nodes; not serialized
    pub fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.vars
    }

    /// Seconds since the graph was created
    pub fn now(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    fn emit(&self, event: GraphEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Failed to deliver graph event: {}", e);
        }
    }

    /// Bump the version and announce a structural change
    fn changed(&mut self, action: &str) {
        self.version += 1;
        self.emit(GraphEvent::changed(action, self.version));
    }

    pub fn set_dirty_canvas(&self, foreground: bool, background: bool) {
        self.emit(GraphEvent::DirtyCanvas {
            foreground,
            background,
        });
    }

    fn next_node_id(&mut self) -> NodeId {
        match self.config.id_scheme {
            IdScheme::Sequential => {
                self.last_node_id += 1;
                Id::Num(self.last_node_id)
            }
            IdScheme::Uuid => Id::new_uuid(),
        }
    }

    fn next_link_id(&mut self) -> LinkId {
        match self.config.id_scheme {
            IdScheme::Sequential => {
                self.last_link_id += 1;
                Id::Num(self.last_link_id)
            }
            IdScheme::Uuid => Id::new_uuid(),
        }
    }

    fn next_call_id(&mut self, node: &NodeId, kind: &str) -> String {
        self.call_seq += 1;
        format!("{}_{}_{}", node, kind, self.call_seq)
    }

    /// Run `f` with the node's behavior detached from the node
    ///
    /// Returns `None` when the node is missing or its behavior is already
    /// running further up the stack.
    fn with_behavior<R>(
        &mut self,
        id: &NodeId,
        f: impl FnOnce(&mut dyn NodeBehavior, &mut NodeContext<'_>) -> R,
    ) -> Option<R> {
        let mut behavior = self.nodes.get_mut(id)?.behavior.take()?;
        let result = {
            let mut ctx = NodeContext::new(self, id.clone());
            f(behavior.as_mut(), &mut ctx)
        };
        match self.nodes.get_mut(id) {
            Some(node) => node.behavior = Some(behavior),
            None => behavior.on_removed(),
        }
        Some(result)
    }

    /// Apply several mutations with a single execution order update
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 && self.order_dirty {
            self.order_dirty = false;
            self.update_execution_order();
        }
        result
    }

    fn connection_change(&mut self) {
        if self.batch_depth > 0 {
            self.order_dirty = true;
        } else {
            self.update_execution_order();
        }
    }

    /// Build a detached node of a registered type
    pub fn create_node(&self, node_type: &str) -> Result<Node> {
        self.registry
            .create_node(node_type, None)
            .ok_or_else(|| GraphError::UnknownNodeType(node_type.to_string()))
    }

    /// Create a node of a registered type and add it
    pub fn add_new(&mut self, node_type: &str) -> Result<NodeId> {
        let node = self.create_node(node_type)?;
        self.add(node)
    }

    /// Add a node, assigning an id if it has none or its id is taken
    pub fn add(&mut self, mut node: Node) -> Result<NodeId> {
        if self.nodes.len() >= self.config.max_nodes {
            return Err(GraphError::TooManyNodes(self.config.max_nodes));
        }

        let id = match node.id().cloned() {
            Some(id) if self.nodes.contains_key(&id) => {
                log::warn!("Node id {} is already in use, assigning a new one", id);
                self.next_node_id()
            }
            Some(id) => {
                if let Id::Num(n) = id {
                    self.last_node_id = self.last_node_id.max(n);
                }
                id
            }
            None => self.next_node_id(),
        };

        node.set_id(Some(id.clone()));
        log::debug!("Adding node {} of type '{}'", id, node.type_name());
        self.nodes.insert(id.clone(), node);
        self.node_list.push(id.clone());

        self.with_behavior(&id, |behavior, ctx| behavior.on_added(ctx));
        self.changed("nodeAdd");
        self.emit(GraphEvent::NodeAdded {
            node_id: id.clone(),
        });
        self.connection_change();
        self.set_dirty_canvas(true, false);
        Ok(id)
    }

    /// Remove a node, disconnecting all of its links first
    ///
    /// The detached node is returned without its id.
    pub fn remove(&mut self, id: &NodeId) -> Result<Node> {
        let (input_count, output_count) = match self.nodes.get(id) {
            Some(node) => (node.inputs().len(), node.outputs().len()),
            None => return Err(GraphError::NodeNotFound(id.clone())),
        };

        self.batch(|graph| -> Result<()> {
            for slot in 0..input_count {
                graph.disconnect_input(id, slot)?;
            }
            for slot in 0..output_count {
                graph.disconnect_output(id, slot, None)?;
            }
            Ok(())
        })?;

        let mut node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        self.node_list.retain(|n| n != id);
        if let Some(behavior) = node.behavior.as_mut() {
            behavior.on_removed();
        }
        node.set_id(None);
        node.waiting_actions.clear();

        log::debug!("Removed node {}", id);
        self.changed("nodeRemove");
        self.emit(GraphEvent::NodeRemoved {
            node_id: id.clone(),
        });
        self.connection_change();
        self.set_dirty_canvas(true, true);
        Ok(node)
    }

    /// Remove every node and link and reset all counters
    pub fn clear(&mut self) {
        self.stop();
        for id in std::mem::take(&mut self.node_list) {
            if let Some(mut node) = self.nodes.remove(&id) {
                if let Some(behavior) = node.behavior.as_mut() {
                    behavior.on_removed();
                }
            }
        }
        self.nodes.clear();
        self.links.clear();
        self.last_node_id = 0;
        self.last_link_id = 0;
        self.iteration = 0;
        self.guards.clear();
        self.ancestors_call = false;
        self.errors_in_execution = false;
        self.inputs.clear();
        self.outputs.clear();
        self.groups.clear();
        self.config_data.clear();
        self.extra.clear();
        self.vars.clear();
        self.globaltime = 0.0;
        self.fixedtime = 0.0;
        self.elapsed_time = 0.0;
        self.execution_time = 0.0;
        self.starttime = 0.0;
        self.last_update_time = 0.0;
        self.last_trigger_time = None;

        self.changed("clear");
        self.connection_change();
        self.set_dirty_canvas(true, true);
    }

    /// Nodes whose type matches, ignoring case
    pub fn find_nodes_by_type(&self, node_type: &str) -> Vec<NodeId> {
        let wanted = node_type.to_lowercase();
        self.nodes()
            .filter(|n| n.type_name().to_lowercase() == wanted)
            .filter_map(|n| n.id().cloned())
            .collect()
    }

    pub fn find_node_by_title(&self, title: &str) -> Option<NodeId> {
        self.nodes()
            .find(|n| n.title == title)
            .and_then(|n| n.id().cloned())
    }

    pub fn find_nodes_by_title(&self, title: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.title == title)
            .filter_map(|n| n.id().cloned())
            .collect()
    }

    /// Add an input slot to a node in the graph
    pub fn add_node_input(&mut self, id: &NodeId, name: &str, slot_type: SlotType) -> Result<usize> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let slot = node.add_input(name, slot_type);
        self.set_dirty_canvas(true, true);
        Ok(slot)
    }

    /// Add an output slot to a node in the graph
    pub fn add_node_output(&mut self, id: &NodeId, name: &str, slot_type: SlotType) -> Result<usize> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let slot = node.add_output(name, slot_type);
        self.set_dirty_canvas(true, true);
        Ok(slot)
    }

    /// Set a node property through its change hook
    pub fn set_node_property(&mut self, id: &NodeId, name: &str, value: Value) -> Result<bool> {
        self.nodes
            .get_mut(id)
            .map(|node| node.set_property(name, value))
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    /// Write an output value and mirror it into every outgoing link
    pub fn set_output_data(&mut self, id: &NodeId, slot: usize, value: Value) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(output) = node.outputs_mut().get_mut(slot) else {
            return;
        };
        for link_id in &output.links {
            if let Some(link) = self.links.get_mut(link_id) {
                link.data = value.clone();
            }
        }
        output.data = value;
    }

    pub fn output_data(&self, id: &NodeId, slot: usize) -> Option<&Value> {
        self.nodes.get(id)?.output(slot).map(|o| &o.data)
    }

    /// Change an output's type along with the type of its links
    pub fn set_output_data_type(&mut self, id: &NodeId, slot: usize, slot_type: SlotType) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(output) = node.outputs_mut().get_mut(slot) else {
            return;
        };
        for link_id in &output.links {
            if let Some(link) = self.links.get_mut(link_id) {
                link.link_type = slot_type.clone();
            }
        }
        output.slot_type = slot_type;
    }

    /// Last value carried by the link feeding an input
    pub fn input_data(&self, id: &NodeId, slot: usize) -> Option<Value> {
        self.input_link(id, slot).map(|link| link.data.clone())
    }

    pub fn input_data_by_name(&self, id: &NodeId, name: &str) -> Option<Value> {
        let slot = self.nodes.get(id)?.find_input_slot(name)?;
        self.input_data(id, slot)
    }

    /// Type of the output feeding an input
    pub fn input_data_type(&self, id: &NodeId, slot: usize) -> Option<SlotType> {
        let link = self.input_link(id, slot)?;
        match self.nodes.get(&link.origin_id) {
            Some(origin) => origin
                .output(link.origin_slot)
                .map(|o| o.slot_type.clone()),
            None => Some(link.link_type.clone()),
        }
    }

    /// Linked input data when connected, otherwise the property of that name
    pub fn input_or_property(&self, id: &NodeId, name: &str) -> Option<Value> {
        let node = self.nodes.get(id)?;
        if let Some(slot) = node.find_input_slot(name) {
            if let Some(link) = self.input_link(id, slot) {
                return Some(link.data.clone());
            }
        }
        node.property(name).cloned()
    }

    pub fn input_link(&self, id: &NodeId, slot: usize) -> Option<&Link> {
        let link_id = self.nodes.get(id)?.input(slot)?.link.as_ref()?;
        self.links.get(link_id)
    }

    /// Node feeding an input
    pub fn input_node(&self, id: &NodeId, slot: usize) -> Option<NodeId> {
        let link = self.input_link(id, slot)?;
        self.nodes
            .contains_key(&link.origin_id)
            .then(|| link.origin_id.clone())
    }

    /// Nodes fed by an output
    pub fn output_nodes(&self, id: &NodeId, slot: usize) -> Vec<NodeId> {
        let Some(output) = self.nodes.get(id).and_then(|n| n.output(slot)) else {
            return Vec::new();
        };
        output
            .links
            .iter()
            .filter_map(|l| self.links.get(l))
            .filter(|l| self.nodes.contains_key(&l.target_id))
            .map(|l| l.target_id.clone())
            .collect()
    }

    fn params(&self, side: ParamSide) -> &BTreeMap<String, GraphParam> {
        match side {
            ParamSide::Input => &self.inputs,
            ParamSide::Output => &self.outputs,
        }
    }

    fn params_mut(&mut self, side: ParamSide) -> &mut BTreeMap<String, GraphParam> {
        match side {
            ParamSide::Input => &mut self.inputs,
            ParamSide::Output => &mut self.outputs,
        }
    }

    fn add_param(&mut self, side: ParamSide, name: &str, param_type: SlotType, value: Value, action: &str) -> bool {
        let params = self.params_mut(side);
        if params.contains_key(name) {
            return false;
        }
        params.insert(
            name.to_string(),
            GraphParam {
                name: name.to_string(),
                param_type,
                value,
            },
        );
        self.changed(action);
        true
    }

    fn set_param(&mut self, side: ParamSide, name: &str, value: Value) -> bool {
        match self.params_mut(side).get_mut(name) {
            Some(param) => {
                param.value = value;
                true
            }
            None => false,
        }
    }

    fn rename_param(&mut self, side: ParamSide, old_name: &str, name: &str, action: &str) -> bool {
        if old_name == name {
            return true;
        }
        let params = self.params_mut(side);
        if params.contains_key(name) {
            log::error!("There is already a graph parameter named '{}'", name);
            return false;
        }
        let Some(mut param) = params.remove(old_name) else {
            return false;
        };
        param.name = name.to_string();
        params.insert(name.to_string(), param);
        self.changed(action);
        true
    }

    fn change_param_type(&mut self, side: ParamSide, name: &str, param_type: SlotType, action: &str) -> bool {
        let Some(param) = self.params_mut(side).get_mut(name) else {
            return false;
        };
        if param.param_type == param_type {
            return true;
        }
        param.param_type = param_type;
        self.changed(action);
        true
    }

    fn remove_param(&mut self, side: ParamSide, name: &str, action: &str) -> bool {
        if self.params_mut(side).remove(name).is_none() {
            return false;
        }
        self.changed(action);
        true
    }

    pub fn graph_inputs(&self) -> &BTreeMap<String, GraphParam> {
        self.params(ParamSide::Input)
    }

    /// Declare a graph input; false if the name is taken
    pub fn add_graph_input(&mut self, name: &str, param_type: SlotType, value: Value) -> bool {
        self.add_param(ParamSide::Input, name, param_type, value, "addInput")
    }

    pub fn set_graph_input_data(&mut self, name: &str, value: Value) -> bool {
        self.set_param(ParamSide::Input, name, value)
    }

    pub fn graph_input_data(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).map(|p| &p.value)
    }

    pub fn rename_graph_input(&mut self, old_name: &str, name: &str) -> bool {
        self.rename_param(ParamSide::Input, old_name, name, "renameInput")
    }

    pub fn change_graph_input_type(&mut self, name: &str, param_type: SlotType) -> bool {
        self.change_param_type(ParamSide::Input, name, param_type, "changeInputType")
    }

    pub fn remove_graph_input(&mut self, name: &str) -> bool {
        self.remove_param(ParamSide::Input, name, "removeInput")
    }

    pub fn graph_outputs(&self) -> &BTreeMap<String, GraphParam> {
        self.params(ParamSide::Output)
    }

    /// Declare a graph output; false if the name is taken
    pub fn add_graph_output(&mut self, name: &str, param_type: SlotType, value: Value) -> bool {
        self.add_param(ParamSide::Output, name, param_type, value, "addOutput")
    }

    pub fn set_graph_output_data(&mut self, name: &str, value: Value) -> bool {
        self.set_param(ParamSide::Output, name, value)
    }

    pub fn graph_output_data(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name).map(|p| &p.value)
    }

    pub fn rename_graph_output(&mut self, old_name: &str, name: &str) -> bool {
        self.rename_param(ParamSide::Output, old_name, name, "renameOutput")
    }

    pub fn change_graph_output_type(&mut self, name: &str, param_type: SlotType) -> bool {
        self.change_param_type(ParamSide::Output, name, param_type, "changeOutputType")
    }

    pub fn remove_graph_output(&mut self, name: &str) -> bool {
        self.remove_param(ParamSide::Output, name, "removeOutput")
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Arc::new(NodeRegistry::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecEventSink;
    use crate::test_support::{recorder_graph, recorder_registry, Recorder};
    use serde_json::json;

    #[test]
    fn test_sequential_ids() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b")]);
        assert_eq!(ids, vec![Id::Num(1), Id::Num(2)]);

        graph.remove(&ids[1]).unwrap();
        let next = graph.add(Recorder::number("c").into_node()).unwrap();
        assert_eq!(next, Id::Num(3));
    }

    #[test]
    fn test_uuid_ids() {
        let config = EngineConfig::default().with_id_scheme(IdScheme::Uuid);
        let mut graph = Graph::new(config, Arc::new(recorder_registry()));
        let a = graph.add_new("test/recorder").unwrap();
        let b = graph.add_new("test/recorder").unwrap();
        assert!(matches!(a, Id::Uuid(_)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_id_is_reassigned() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a")]);
        let mut node = Recorder::number("b").into_node();
        node.set_id(Some(ids[0].clone()));
        let id = graph.add(node).unwrap();
        assert_ne!(id, ids[0]);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_explicit_id_advances_counter() {
        let (mut graph, _) = recorder_graph(&[]);
        let mut node = Recorder::number("a").into_node();
        node.set_id(Some(Id::Num(40)));
        graph.add(node).unwrap();
        assert_eq!(graph.add_new("test/recorder").unwrap(), Id::Num(41));
    }

    #[test]
    fn test_max_nodes() {
        let config = EngineConfig::default().with_max_nodes(2);
        let mut graph = Graph::new(config, Arc::new(recorder_registry()));
        graph.add_new("test/recorder").unwrap();
        graph.add_new("test/recorder").unwrap();
        assert!(matches!(
            graph.add_new("test/recorder"),
            Err(GraphError::TooManyNodes(2))
        ));
    }

    #[test]
    fn test_unknown_type() {
        let (mut graph, _) = recorder_graph(&[]);
        assert!(matches!(
            graph.add_new("nope/nope"),
            Err(GraphError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_remove_disconnects_links() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b"), Recorder::number("c")]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.connect(&ids[1], 0, &ids[2], 0).unwrap().unwrap();

        let removed = graph.remove(&ids[1]).unwrap();
        assert!(removed.id().is_none());
        assert_eq!(graph.link_count(), 0);
        assert!(!graph.node(&ids[0]).unwrap().is_output_connected(0));
        assert!(!graph.node(&ids[2]).unwrap().is_input_connected(0));
        assert_eq!(graph.nodes_in_order().len(), 2);
        assert!(matches!(graph.remove(&ids[1]), Err(GraphError::NodeNotFound(_))));
    }

    #[test]
    fn test_change_events_and_version() {
        let sink = Arc::new(VecEventSink::new());
        let mut graph = Graph::new(EngineConfig::default(), Arc::new(recorder_registry()))
            .with_event_sink(sink.clone());

        let a = graph.add_new("test/recorder").unwrap();
        let b = graph.add_new("test/recorder").unwrap();
        graph.connect(&a, 0, &b, 0).unwrap();
        graph.disconnect_input(&b, 0).unwrap();
        graph.remove(&a).unwrap();

        assert_eq!(
            sink.change_actions(),
            vec!["nodeAdd", "nodeAdd", "connect", "disconnectInput", "nodeRemove"]
        );
        assert_eq!(graph.version(), 5);
    }

    #[test]
    fn test_output_data_mirrors_into_links() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b"), Recorder::number("c")]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.connect(&ids[0], 0, &ids[2], 0).unwrap().unwrap();

        graph.set_output_data(&ids[0], 0, json!(7));
        assert_eq!(graph.input_data(&ids[1], 0), Some(json!(7)));
        assert_eq!(graph.input_data(&ids[2], 0), Some(json!(7)));
        assert_eq!(graph.output_data(&ids[0], 0), Some(&json!(7)));
        assert_eq!(graph.input_data_by_name(&ids[1], "in"), Some(json!(7)));
        assert_eq!(graph.input_node(&ids[1], 0), Some(ids[0].clone()));
        assert_eq!(graph.output_nodes(&ids[0], 0), vec![ids[1].clone(), ids[2].clone()]);
    }

    #[test]
    fn test_input_or_property() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b")]);
        graph.node_mut(&ids[1]).unwrap().add_property("in", json!("fallback"));
        assert_eq!(graph.input_or_property(&ids[1], "in"), Some(json!("fallback")));

        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.set_output_data(&ids[0], 0, json!(1));
        assert_eq!(graph.input_or_property(&ids[1], "in"), Some(json!(1)));
    }

    #[test]
    fn test_output_type_change_updates_links() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b")]);
        let link = graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.set_output_data_type(&ids[0], 0, SlotType::named("float"));
        assert_eq!(graph.link(&link).unwrap().link_type, SlotType::named("float"));
        assert_eq!(graph.input_data_type(&ids[1], 0), Some(SlotType::named("float")));
    }

    #[test]
    fn test_find_nodes() {
        let (graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b")]);
        assert_eq!(graph.find_nodes_by_type("TEST/Recorder"), ids);
        assert_eq!(graph.find_node_by_title("b"), Some(ids[1].clone()));
        assert!(graph.find_nodes_by_title("zzz").is_empty());
    }

    #[test]
    fn test_graph_params() {
        let sink = Arc::new(VecEventSink::new());
        let mut graph = Graph::default().with_event_sink(sink.clone());

        assert!(graph.add_graph_input("speed", SlotType::named("number"), json!(1)));
        assert!(!graph.add_graph_input("speed", SlotType::named("number"), json!(2)));
        assert!(graph.set_graph_input_data("speed", json!(5)));
        assert_eq!(graph.graph_input_data("speed"), Some(&json!(5)));

        assert!(graph.rename_graph_input("speed", "velocity"));
        assert_eq!(graph.graph_inputs()["velocity"].name, "velocity");
        assert!(graph.change_graph_input_type("velocity", SlotType::named("vec2")));
        assert!(graph.remove_graph_input("velocity"));
        assert!(!graph.remove_graph_input("velocity"));

        assert!(graph.add_graph_output("result", SlotType::Any, Value::Null));
        assert!(graph.set_graph_output_data("result", json!("done")));
        assert_eq!(graph.graph_output_data("result"), Some(&json!("done")));
        assert!(!graph.set_graph_output_data("missing", json!(0)));

        assert_eq!(
            sink.change_actions(),
            vec!["addInput", "renameInput", "changeInputType", "removeInput", "addOutput"]
        );
    }

    #[test]
    fn test_clear() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b")]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap();
        graph.clear();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.link_count(), 0);
        assert!(graph.nodes_in_order().is_empty());
        assert_eq!(graph.add_new("test/recorder").unwrap(), Id::Num(1));
    }
}

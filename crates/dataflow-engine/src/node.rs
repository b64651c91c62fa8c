//! Nodes and their slots
//!
//! A node owns ordered input and output slots, a property map and its
//! behavior. Slots refer to links by id; the links themselves live in the
//! graph. Anything that touches links goes through [`Graph`](crate::Graph).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::behavior::{ExecOptions, NodeBehavior};
use crate::error::Result;
use crate::types::{LinkId, NodeId, NodeMode, SlotRef, SlotType};

/// Height of one slot row
pub const SLOT_HEIGHT: f64 = 20.0;
/// Minimum node width
pub const NODE_WIDTH: f64 = 140.0;
/// Height of the title bar
pub const TITLE_HEIGHT: f64 = 30.0;
const TEXT_SIZE: f64 = 14.0;

/// Name of the input added by trigger mode
pub const ON_TRIGGER_INPUT: &str = "onTrigger";
/// Name of the output fired after every execution when present
pub const ON_EXECUTED_OUTPUT: &str = "onExecuted";

/// An input slot; holds at most one link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    pub name: String,
    #[serde(rename = "type", default)]
    pub slot_type: SlotType,
    #[serde(default)]
    pub link: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
            link: None,
            label: None,
            extra: Map::new(),
        }
    }
}

/// An output slot; fans out to any number of links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub name: String,
    #[serde(rename = "type", default)]
    pub slot_type: SlotType,
    #[serde(default, deserialize_with = "nullable_links")]
    pub links: Vec<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Last value written to this output
    #[serde(skip)]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OutputSlot {
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
            links: Vec::new(),
            label: None,
            data: Value::Null,
            extra: Map::new(),
        }
    }
}

fn nullable_links<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<LinkId>, D::Error> {
    Ok(Option::<Vec<LinkId>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `[x, y]` as well as `{"0": x, "1": y}`
fn vec2<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<[f64; 2]>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let pair = match &value {
        Some(Value::Array(items)) if items.len() >= 2 => (items[0].as_f64(), items[1].as_f64()),
        Some(Value::Object(map)) => (
            map.get("0").and_then(Value::as_f64),
            map.get("1").and_then(Value::as_f64),
        ),
        _ => (None, None),
    };
    match pair {
        (Some(x), Some(y)) => Ok(Some([x, y])),
        _ => Ok(None),
    }
}

/// Serialized form of a node as read back from a snapshot
///
/// Every field is optional; missing ones leave the node's current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeSnapshot {
    #[serde(default)]
    pub id: Option<NodeId>,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "vec2")]
    pub pos: Option<[f64; 2]>,
    #[serde(default, deserialize_with = "vec2")]
    pub size: Option<[f64; 2]>,
    #[serde(default)]
    pub flags: Option<Map<String, Value>>,
    #[serde(default)]
    pub order: Option<usize>,
    #[serde(default)]
    pub mode: Option<NodeMode>,
    #[serde(default)]
    pub inputs: Option<Vec<InputSlot>>,
    #[serde(default)]
    pub outputs: Option<Vec<OutputSlot>>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// Fields the engine does not interpret (colors, widget values, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An action waiting for the next step pass
#[derive(Debug, Clone)]
pub(crate) struct PendingAction {
    pub action: String,
    pub param: Value,
    pub options: ExecOptions,
    /// Pass counter at enqueue time
    pub pass: u64,
}

/// Capabilities read once from the behavior at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub executable: bool,
    pub actionable: bool,
    pub class_priority: Option<i32>,
}

impl Capabilities {
    fn recorder(behavior: &mut dyn NodeBehavior) -> Self {
        Self {
            executable: behavior.as_executable().is_some(),
            actionable: behavior.as_actionable().is_some(),
            class_priority: behavior.class_priority(),
        }
    }
}

/// A graph node
pub struct Node {
    id: Option<NodeId>,
    type_name: String,
    pub title: String,
    default_title: String,
    mode: NodeMode,
    inputs: Vec<InputSlot>,
    outputs: Vec<OutputSlot>,
    properties: Map<String, Value>,
    pub pos: [f64; 2],
    pub size: [f64; 2],
    pub flags: Map<String, Value>,
    /// Instance priority; lower runs earlier among ready nodes
    pub priority: Option<i32>,
    pub(crate) order: usize,
    pub(crate) level: u32,
    pub(crate) exec_version: Option<u64>,
    pub(crate) action_call: Option<String>,
    pub(crate) waiting_actions: Vec<PendingAction>,
    extra: Map<String, Value>,
    last_serialization: Option<Value>,
    has_errors: bool,
    capabilities: Capabilities,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("title", &self.title)
            .field("mode", &self.mode)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("order", &self.order)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Create a detached node around a behavior
    pub fn new(
        type_name: impl Into<String>,
        title: impl Into<String>,
        mut behavior: Box<dyn NodeBehavior>,
    ) -> Self {
        let capabilities = Capabilities::recorder(behavior.as_mut());
        let title = title.into();
        let mut node = Self::empty(type_name.into(), title, capabilities);
        node.behavior = Some(behavior);
        node
    }

    /// Inert stand-in for a node whose type is not registered
    ///
    /// It keeps its snapshot and serializes back to it unchanged.
    pub(crate) fn placeholder(type_name: &str, snapshot: Value) -> Self {
        let mut node = Self::empty(type_name.to_string(), type_name.to_string(), Capabilities::default());
        node.last_serialization = Some(snapshot);
        node.has_errors = true;
        node
    }

    fn empty(type_name: String, title: String, capabilities: Capabilities) -> Self {
        let mut node = Self {
            id: None,
            type_name,
            default_title: title.clone(),
            title,
            mode: NodeMode::Always,
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: Map::new(),
            pos: [10.0, 10.0],
            size: [NODE_WIDTH, SLOT_HEIGHT],
            flags: Map::new(),
            priority: None,
            order: 0,
            level: 0,
            exec_version: None,
            action_call: None,
            waiting_actions: Vec::new(),
            extra: Map::new(),
            last_serialization: None,
            has_errors: false,
            capabilities,
            behavior: None,
        };
        node.size = node.compute_size();
        node
    }

    pub fn id(&self) -> Option<&NodeId> {
        self.id.as_ref()
    }

    pub(crate) fn set_id(&mut self, id: Option<NodeId>) {
        self.id = id;
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    /// Switch mode; trigger mode adds the trigger input and executed output
    pub fn change_mode(&mut self, mode: NodeMode) {
        if mode == NodeMode::OnTrigger {
            self.add_on_trigger_input();
            self.add_on_executed_output();
        }
        self.mode = mode;
    }

    pub fn inputs(&self) -> &[InputSlot] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputSlot] {
        &self.outputs
    }

    pub fn input(&self, slot: usize) -> Option<&InputSlot> {
        self.inputs.get(slot)
    }

    pub fn output(&self, slot: usize) -> Option<&OutputSlot> {
        self.outputs.get(slot)
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut Vec<InputSlot> {
        &mut self.inputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut Vec<OutputSlot> {
        &mut self.outputs
    }

    /// Append an input slot and return its index
    pub fn add_input(&mut self, name: impl Into<String>, slot_type: SlotType) -> usize {
        self.add_input_with(name, slot_type, Map::new())
    }

    pub fn add_input_with(
        &mut self,
        name: impl Into<String>,
        slot_type: SlotType,
        extra: Map<String, Value>,
    ) -> usize {
        let mut slot = InputSlot::new(name, slot_type);
        slot.extra = extra;
        self.inputs.push(slot);
        self.size = self.compute_size();
        self.inputs.len() - 1
    }

    /// Append an output slot and return its index
    pub fn add_output(&mut self, name: impl Into<String>, slot_type: SlotType) -> usize {
        self.add_output_with(name, slot_type, Map::new())
    }

    pub fn add_output_with(
        &mut self,
        name: impl Into<String>,
        slot_type: SlotType,
        extra: Map<String, Value>,
    ) -> usize {
        let mut slot = OutputSlot::new(name, slot_type);
        slot.extra = extra;
        self.outputs.push(slot);
        self.size = self.compute_size();
        self.outputs.len() - 1
    }

    pub fn add_inputs(&mut self, slots: &[(&str, SlotType)]) {
        for (name, slot_type) in slots {
            self.add_input(*name, slot_type.clone());
        }
    }

    pub fn add_outputs(&mut self, slots: &[(&str, SlotType)]) {
        for (name, slot_type) in slots {
            self.add_output(*name, slot_type.clone());
        }
    }

    /// Index of the trigger input, adding it if missing
    pub fn add_on_trigger_input(&mut self) -> usize {
        match self.find_input_slot(ON_TRIGGER_INPUT) {
            Some(slot) => slot,
            None => {
                let mut extra = Map::new();
                extra.insert("removable".into(), Value::Bool(true));
                extra.insert("nameLocked".into(), Value::Bool(true));
                self.add_input_with(ON_TRIGGER_INPUT, SlotType::Event, extra)
            }
        }
    }

    /// Index of the executed output, adding it if missing
    pub fn add_on_executed_output(&mut self) -> usize {
        match self.find_output_slot(ON_EXECUTED_OUTPUT) {
            Some(slot) => slot,
            None => {
                let mut extra = Map::new();
                extra.insert("optional".into(), Value::Bool(true));
                extra.insert("nameLocked".into(), Value::Bool(true));
                self.add_output_with(ON_EXECUTED_OUTPUT, SlotType::ACTION, extra)
            }
        }
    }

    pub fn find_input_slot(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    pub fn find_output_slot(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == name)
    }

    /// First unconnected input whose type is not in `types_not_accepted`
    pub fn find_input_slot_free(&self, types_not_accepted: &[SlotType]) -> Option<usize> {
        self.inputs
            .iter()
            .position(|s| s.link.is_none() && !types_not_accepted.contains(&s.slot_type))
    }

    /// First unconnected output whose type is not in `types_not_accepted`
    pub fn find_output_slot_free(&self, types_not_accepted: &[SlotType]) -> Option<usize> {
        self.outputs
            .iter()
            .position(|s| s.links.is_empty() && !types_not_accepted.contains(&s.slot_type))
    }

    /// Input whose declared type list shares an entry with `slot_type`
    ///
    /// With `prefer_free` occupied slots are skipped on the first pass; a
    /// second pass accepts them unless `do_not_use_occupied` is set.
    pub fn find_input_slot_by_type(
        &self,
        slot_type: &SlotType,
        prefer_free: bool,
        do_not_use_occupied: bool,
    ) -> Option<usize> {
        let slots: Vec<(&SlotType, bool)> = self
            .inputs
            .iter()
            .map(|s| (&s.slot_type, s.link.is_some()))
            .collect();
        find_slot_by_type(&slots, slot_type, prefer_free, do_not_use_occupied)
    }

    /// Output counterpart of [`find_input_slot_by_type`](Self::find_input_slot_by_type)
    pub fn find_output_slot_by_type(
        &self,
        slot_type: &SlotType,
        prefer_free: bool,
        do_not_use_occupied: bool,
    ) -> Option<usize> {
        let slots: Vec<(&SlotType, bool)> = self
            .outputs
            .iter()
            .map(|s| (&s.slot_type, !s.links.is_empty()))
            .collect();
        find_slot_by_type(&slots, slot_type, prefer_free, do_not_use_occupied)
    }

    pub(crate) fn resolve_input(&self, slot: &SlotRef) -> Option<usize> {
        match slot {
            SlotRef::Index(i) if *i < self.inputs.len() => Some(*i),
            SlotRef::Name(name) => self.find_input_slot(name),
            _ => None,
        }
    }

    pub(crate) fn resolve_output(&self, slot: &SlotRef) -> Option<usize> {
        match slot {
            SlotRef::Index(i) if *i < self.outputs.len() => Some(*i),
            SlotRef::Name(name) => self.find_output_slot(name),
            _ => None,
        }
    }

    pub fn is_input_connected(&self, slot: usize) -> bool {
        self.inputs.get(slot).is_some_and(|s| s.link.is_some())
    }

    pub fn is_output_connected(&self, slot: usize) -> bool {
        self.outputs.get(slot).is_some_and(|s| !s.links.is_empty())
    }

    pub fn is_any_output_connected(&self) -> bool {
        self.outputs.iter().any(|s| !s.links.is_empty())
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Declare a property with its default value
    pub fn add_property(&mut self, name: impl Into<String>, default: Value) {
        self.properties.insert(name.into(), default);
    }

    /// Set a property, letting the behavior veto the change
    ///
    /// Returns false when the previous value was restored.
    pub fn set_property(&mut self, name: &str, value: Value) -> bool {
        let previous = self.properties.insert(name.to_string(), value.clone());
        let accepted = match self.behavior.as_mut() {
            Some(behavior) => behavior.on_property_changed(name, &value, previous.as_ref()),
            None => true,
        };
        if !accepted {
            match previous {
                Some(prev) => self.properties.insert(name.to_string(), prev),
                None => self.properties.remove(name),
            };
        }
        accepted
    }

    /// Position in the last computed execution order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Column assigned by the last level computation
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Priority used to break ties in the execution order
    pub fn effective_priority(&self) -> i32 {
        self.capabilities
            .class_priority
            .or(self.priority)
            .unwrap_or(0)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_executable(&self) -> bool {
        self.capabilities.executable
    }

    pub fn is_actionable(&self) -> bool {
        self.capabilities.actionable
    }

    /// Iteration of the last completed execution
    pub fn exec_version(&self) -> Option<u64> {
        self.exec_version
    }

    /// Call id of the last completed execution or action
    pub fn last_action_call(&self) -> Option<&str> {
        self.action_call.as_deref()
    }

    pub fn pending_action_count(&self) -> usize {
        self.waiting_actions.len()
    }

    /// True for placeholders created from unknown snapshot types
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Snapshot fields the engine does not interpret
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Minimum size fitting the title and slot labels
    pub fn compute_size(&self) -> [f64; 2] {
        fn text_width(text: &str) -> f64 {
            text.chars().count() as f64 * TEXT_SIZE * 0.6
        }

        let rows = self.inputs.len().max(self.outputs.len()).max(1);
        let input_width = self
            .inputs
            .iter()
            .map(|s| text_width(s.label.as_deref().unwrap_or(&s.name)))
            .fold(0.0, f64::max);
        let output_width = self
            .outputs
            .iter()
            .map(|s| text_width(s.label.as_deref().unwrap_or(&s.name)))
            .fold(0.0, f64::max);

        let width = (input_width + output_width + 10.0)
            .max(text_width(&self.title))
            .max(NODE_WIDTH);
        [width, rows as f64 * SLOT_HEIGHT]
    }

    /// Copy of this node with a cloned behavior, no id and no links
    ///
    /// Placeholders cannot be cloned.
    pub fn clone_detached(&self) -> Option<Node> {
        let behavior = self.behavior.as_ref()?.clone_box();
        let mut node = Node::new(self.type_name.clone(), self.default_title.clone(), behavior);
        node.title = self.title.clone();
        node.mode = self.mode;
        node.inputs = self
            .inputs
            .iter()
            .cloned()
            .map(|mut s| {
                s.link = None;
                s
            })
            .collect();
        node.outputs = self
            .outputs
            .iter()
            .cloned()
            .map(|mut s| {
                s.links.clear();
                s.data = Value::Null;
                s
            })
            .collect();
        node.properties = self.properties.clone();
        node.pos = self.pos;
        node.size = self.size;
        node.flags = self.flags.clone();
        node.priority = self.priority;
        node.extra = self.extra.clone();
        Some(node)
    }

    /// Encode the node for a snapshot
    pub fn serialize(&self) -> Result<Value> {
        if let Some(snapshot) = &self.last_serialization {
            if self.behavior.is_none() {
                return Ok(snapshot.clone());
            }
        }

        let mut o = self.extra.clone();
        o.insert("id".into(), serde_json::to_value(&self.id)?);
        o.insert("type".into(), Value::String(self.type_name.clone()));
        o.insert("pos".into(), serde_json::to_value(self.pos)?);
        o.insert("size".into(), serde_json::to_value(self.size)?);
        o.insert("flags".into(), Value::Object(self.flags.clone()));
        o.insert("order".into(), serde_json::to_value(self.order)?);
        o.insert("mode".into(), serde_json::to_value(self.mode)?);
        o.insert("inputs".into(), serde_json::to_value(&self.inputs)?);
        o.insert("outputs".into(), serde_json::to_value(&self.outputs)?);
        if self.title != self.default_title {
            o.insert("title".into(), Value::String(self.title.clone()));
        }
        o.insert("properties".into(), Value::Object(self.properties.clone()));
        if let Some(priority) = self.priority {
            o.insert("priority".into(), Value::from(priority));
        }
        if let Some(behavior) = &self.behavior {
            behavior.on_serialize(&mut o);
        }
        Ok(Value::Object(o))
    }

    /// Overwrite fields present in a snapshot
    pub(crate) fn apply_snapshot(&mut self, snapshot: &NodeSnapshot) {
        if let Some(title) = &snapshot.title {
            self.title = title.clone();
        }
        if let Some(pos) = snapshot.pos {
            self.pos = pos;
        }
        if let Some(size) = snapshot.size {
            self.size = size;
        }
        if let Some(flags) = &snapshot.flags {
            self.flags = flags.clone();
        }
        if let Some(order) = snapshot.order {
            self.order = order;
        }
        if let Some(mode) = snapshot.mode {
            self.mode = mode;
        }
        if let Some(inputs) = &snapshot.inputs {
            self.inputs = inputs.clone();
        }
        if let Some(outputs) = &snapshot.outputs {
            self.outputs = outputs.clone();
        }
        if let Some(properties) = &snapshot.properties {
            for (name, value) in properties {
                self.properties.insert(name.clone(), value.clone());
            }
        }
        if snapshot.priority.is_some() {
            self.priority = snapshot.priority;
        }
        for (key, value) in &snapshot.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Lowercased type tokens with wildcard and event spellings normalized
fn type_tokens(slot_type: &SlotType) -> Vec<String> {
    match slot_type {
        SlotType::Any => vec!["*".to_string()],
        SlotType::Event => vec!["_event_".to_string()],
        SlotType::Named(names) => names
            .split(',')
            .map(|t| match t.trim() {
                "" | "*" | "0" => "*".to_string(),
                "-1" | "_event_" => "_event_".to_string(),
                other => other.to_lowercase(),
            })
            .collect(),
    }
}

fn find_slot_by_type(
    slots: &[(&SlotType, bool)],
    wanted: &SlotType,
    prefer_free: bool,
    do_not_use_occupied: bool,
) -> Option<usize> {
    let wanted = type_tokens(wanted);
    let matches = |slot_type: &SlotType| {
        type_tokens(slot_type)
            .iter()
            .any(|token| wanted.contains(token))
    };

    let first = slots
        .iter()
        .position(|(slot_type, occupied)| matches(slot_type) && !(prefer_free && *occupied));
    if first.is_some() {
        return first;
    }

    if prefer_free && !do_not_use_occupied {
        return slots.iter().position(|(slot_type, _)| matches(slot_type));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Recorder;
    use serde_json::json;

    fn node() -> Node {
        Recorder::number("recorder").into_node()
    }

    #[test]
    fn test_slot_lookup() {
        let mut node = node();
        node.add_input("b", SlotType::named("string"));
        assert_eq!(node.find_input_slot("in"), Some(0));
        assert_eq!(node.find_input_slot("b"), Some(1));
        assert_eq!(node.find_output_slot("out"), Some(0));
        assert_eq!(node.find_input_slot("missing"), None);
    }

    #[test]
    fn test_find_slot_by_type_lists_and_wildcards() {
        let mut node = node();
        node.add_input("multi", SlotType::named("vec3,String"));
        node.add_input("any", SlotType::Any);
        node.add_input("ev", SlotType::Event);

        assert_eq!(node.find_input_slot_by_type(&SlotType::named("string"), false, false), Some(1));
        assert_eq!(node.find_input_slot_by_type(&SlotType::Any, false, false), Some(2));
        assert_eq!(node.find_input_slot_by_type(&SlotType::named("_event_"), false, false), Some(3));
        assert_eq!(node.find_input_slot_by_type(&SlotType::named("image"), false, false), None);
    }

    #[test]
    fn test_find_slot_by_type_prefers_free() {
        let mut node = node();
        node.add_input("second", SlotType::named("number"));
        node.inputs[0].link = Some(crate::types::Id::Num(1));

        assert_eq!(node.find_input_slot_by_type(&SlotType::named("number"), true, false), Some(1));
        node.inputs[1].link = Some(crate::types::Id::Num(2));
        assert_eq!(node.find_input_slot_by_type(&SlotType::named("number"), true, false), Some(0));
        assert_eq!(node.find_input_slot_by_type(&SlotType::named("number"), true, true), None);
    }

    #[test]
    fn test_free_slot_skips_rejected_types() {
        let mut node = node();
        node.add_on_trigger_input();
        node.inputs[0].link = Some(crate::types::Id::Num(3));
        assert_eq!(node.find_input_slot_free(&[SlotType::Event]), None);
        assert_eq!(node.find_input_slot_free(&[]), Some(1));
    }

    #[test]
    fn test_trigger_mode_adds_slots_once() {
        let mut node = node();
        node.change_mode(NodeMode::OnTrigger);
        node.change_mode(NodeMode::OnTrigger);
        assert_eq!(node.mode(), NodeMode::OnTrigger);
        assert_eq!(node.inputs().len(), 2);
        assert_eq!(node.outputs().len(), 2);
        assert_eq!(node.input(1).unwrap().slot_type, SlotType::Event);
        assert_eq!(node.output(1).unwrap().name, ON_EXECUTED_OUTPUT);
    }

    #[test]
    fn test_property_veto() {
        let mut node = node();
        assert!(node.set_property("value", json!(3)));
        assert!(!node.set_property("locked", json!(1)));
        assert_eq!(node.property("value"), Some(&json!(3)));
        assert_eq!(node.property("locked"), None);
    }

    #[test]
    fn test_clone_detached_drops_links() {
        let mut node = node();
        node.set_id(Some(crate::types::Id::Num(5)));
        node.inputs[0].link = Some(crate::types::Id::Num(1));
        node.outputs[0].links.push(crate::types::Id::Num(2));
        node.title = "Renamed".into();

        let copy = node.clone_detached().unwrap();
        assert!(copy.id().is_none());
        assert!(copy.inputs()[0].link.is_none());
        assert!(copy.outputs()[0].links.is_empty());
        assert_eq!(copy.title, "Renamed");
        assert!(copy.is_executable());
    }

    #[test]
    fn test_serialize_shape() {
        let mut node = node();
        node.set_id(Some(crate::types::Id::Num(2)));
        node.add_property("value", json!(1.5));
        let data = node.serialize().unwrap();

        assert_eq!(data["id"], json!(2));
        assert_eq!(data["type"], json!("test/recorder"));
        assert_eq!(data["mode"], json!(0));
        assert_eq!(data["inputs"][0]["name"], json!("in"));
        assert_eq!(data["outputs"][0]["links"], json!([]));
        assert_eq!(data["properties"]["value"], json!(1.5));
        assert!(data.get("title").is_none());
    }

    #[test]
    fn test_snapshot_accepts_object_vectors() {
        let snapshot: NodeSnapshot = serde_json::from_value(json!({
            "id": 1, "type": "test/recorder", "pos": [5, 6], "size": {"0": 200, "1": 40},
            "color": "#333", "outputs": [{"name": "out", "type": "number", "links": null}]
        }))
        .unwrap();
        assert_eq!(snapshot.pos, Some([5.0, 6.0]));
        assert_eq!(snapshot.size, Some([200.0, 40.0]));
        assert_eq!(snapshot.extra.get("color"), Some(&json!("#333")));
        assert!(snapshot.outputs.unwrap()[0].links.is_empty());
        assert!(snapshot.inputs.is_none());
    }

    #[test]
    fn test_placeholder_round_trips_snapshot() {
        let raw = json!({"id": 4, "type": "gone/node", "custom": [1, 2]});
        let node = Node::placeholder("gone/node", raw.clone());
        assert!(node.has_errors());
        assert!(node.clone_detached().is_none());
        assert_eq!(node.serialize().unwrap(), raw);
    }
}

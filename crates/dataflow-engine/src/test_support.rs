//! Shared fixtures for unit tests

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::behavior::{Actionable, ExecOptions, Executable, NodeBehavior, NodeContext};
use crate::config::EngineConfig;
use crate::descriptor::{NodeTypeMetadata, SlotSpec};
use crate::error::Result;
use crate::graph::Graph;
use crate::link::Link;
use crate::node::Node;
use crate::registry::NodeRegistry;
use crate::types::{NodeId, SlotKind, SlotType};

pub(crate) const RECORDER_TYPE: &str = "test/recorder";

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Node behavior that records its hook calls into shared logs
///
/// Clones share the logs, so a test can keep one copy and hand the other
/// to a graph. Link hooks go to a separate log from the run hooks.
#[derive(Clone)]
pub(crate) struct Recorder {
    label: String,
    calls: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<Vec<String>>>,
    params: Arc<Mutex<Vec<Value>>>,
    executable: bool,
    fail: bool,
    emit: Option<Value>,
    fire: Option<String>,
    refuse_inputs: bool,
    class_priority: Option<i32>,
}

impl Recorder {
    /// Executable recorder with one number input and one number output
    pub(crate) fn number(label: &str) -> Self {
        Self {
            label: label.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            connections: Arc::new(Mutex::new(Vec::new())),
            params: Arc::new(Mutex::new(Vec::new())),
            executable: true,
            fail: false,
            emit: None,
            fire: None,
            refuse_inputs: false,
            class_priority: None,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Without an execute capability
    pub(crate) fn passive(mut self) -> Self {
        self.executable = false;
        self
    }

    /// Execution returns an error
    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Execution writes `value` to output 0
    pub(crate) fn emitting(mut self, value: Value) -> Self {
        self.emit = Some(value);
        self
    }

    /// Execution fires the named event output
    pub(crate) fn firing_on_execute(mut self, event: &str) -> Self {
        self.fire = Some(event.to_string());
        self
    }

    /// Vetoes every connection to its inputs
    pub(crate) fn refusing_inputs(mut self) -> Self {
        self.refuse_inputs = true;
        self
    }

    pub(crate) fn with_class_priority(mut self, priority: i32) -> Self {
        self.class_priority = Some(priority);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Link hook calls, as `label:connect:Kind:slot`
    pub(crate) fn connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().clone()
    }

    pub(crate) fn params(&self) -> Vec<Value> {
        self.params.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// A detached node titled after the label
    pub(crate) fn into_node(&self) -> Node {
        let mut node = Node::new(RECORDER_TYPE, self.label.clone(), Box::new(self.clone()));
        node.add_input("in", SlotType::named("number"));
        node.add_output("out", SlotType::named("number"));
        node
    }
}

impl NodeBehavior for Recorder {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        if self.executable {
            Some(self)
        } else {
            None
        }
    }

    fn as_actionable(&mut self) -> Option<&mut dyn Actionable> {
        Some(self)
    }

    fn class_priority(&self) -> Option<i32> {
        self.class_priority
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {
        self.record(format!("{}:start", self.label));
    }

    fn on_stop(&mut self, _ctx: &mut NodeContext<'_>) {
        self.record(format!("{}:stop", self.label));
    }

    fn on_connections_change(&mut self, kind: SlotKind, slot: usize, connected: bool, _link: &Link) {
        let verb = if connected { "connect" } else { "disconnect" };
        self.connections
            .lock()
            .unwrap()
            .push(format!("{}:{}:{:?}:{}", self.label, verb, kind, slot));
    }

    fn accepts_connection(&self, kind: SlotKind, _slot: usize, _other: &SlotType) -> bool {
        !(self.refuse_inputs && kind == SlotKind::Input)
    }

    fn on_property_changed(&mut self, name: &str, _value: &Value, _previous: Option<&Value>) -> bool {
        name != "locked"
    }
}

impl Executable for Recorder {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, param: &Value, _options: &ExecOptions) -> Result<()> {
        self.record(format!("{}:exec", self.label));
        self.params.lock().unwrap().push(param.clone());
        if self.fail {
            return Err(ctx.fail("scripted failure"));
        }
        if let Some(value) = &self.emit {
            ctx.set_output_data(0, value.clone());
        }
        if let Some(event) = &self.fire {
            ctx.trigger(Some(event), Value::Null)?;
        }
        Ok(())
    }
}

impl Actionable for Recorder {
    fn on_action(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        action: &str,
        param: &Value,
        _options: &ExecOptions,
    ) -> Result<()> {
        self.record(format!("{}:action:{}", self.label, action));
        self.params.lock().unwrap().push(param.clone());
        Ok(())
    }
}

/// Registry with the recorder type, built from `Recorder::number("recorder")`
pub(crate) fn recorder_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(
        NodeTypeMetadata::new(RECORDER_TYPE, "Recorder")
            .with_input(SlotSpec::new("in", SlotType::named("number")))
            .with_output(SlotSpec::new("out", SlotType::named("number"))),
        Arc::new(|| Box::new(Recorder::number("recorder")) as Box<dyn NodeBehavior>),
    );
    registry
}

/// Graph holding one node per recorder, in order
pub(crate) fn recorder_graph(recorders: &[Recorder]) -> (Graph, Vec<NodeId>) {
    recorder_graph_with(EngineConfig::default(), recorders)
}

pub(crate) fn recorder_graph_with(config: EngineConfig, recorders: &[Recorder]) -> (Graph, Vec<NodeId>) {
    init_logging();
    let mut graph = Graph::new(config, Arc::new(recorder_registry()));
    let ids = recorders
        .iter()
        .map(|p| graph.add(p.into_node()).unwrap())
        .collect();
    (graph, ids)
}

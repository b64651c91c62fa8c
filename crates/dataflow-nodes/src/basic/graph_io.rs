//! Graph input and output nodes
//!
//! Bridge between a graph's named parameters and its node network. The
//! parameter must exist on the graph (`add_graph_input` /
//! `add_graph_output`); an unknown name leaves the value untouched.

use dataflow_engine::{
    ExecOptions, Executable, NodeBehavior, NodeContext, NodeDescriptor, NodeTypeMetadata, Result,
    SlotSpec, SlotType,
};
use serde_json::{json, Value};

/// Property naming the graph parameter
const PROP_NAME: &str = "name";

fn param_name(ctx: &NodeContext<'_>) -> Option<String> {
    ctx.property(PROP_NAME)
        .and_then(|v| v.as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Reads a graph input onto its output
#[derive(Debug, Clone, Default)]
pub struct GraphInput;

impl GraphInput {
    pub const TYPE: &'static str = "basic/graph_input";
    pub const PORT_VALUE: &'static str = "value";

    fn create() -> Box<dyn NodeBehavior> {
        Box::new(Self)
    }
}

impl NodeDescriptor for GraphInput {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::TYPE, "Input")
            .with_description("Input of the graph")
            .with_output(SlotSpec::new(Self::PORT_VALUE, SlotType::Any))
            .with_property(PROP_NAME, json!(""))
    }
}

inventory::submit!(dataflow_engine::NodeTypeFn {
    descriptor: GraphInput::descriptor,
    factory: GraphInput::create,
});

impl NodeBehavior for GraphInput {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        Some(self)
    }
}

impl Executable for GraphInput {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _param: &Value, _options: &ExecOptions) -> Result<()> {
        let Some(name) = param_name(ctx) else {
            return Ok(());
        };
        match ctx.graph_input(&name).cloned() {
            Some(value) => ctx.set_output_data(0, value),
            None => log::debug!("Graph input '{}' is not defined", name),
        }
        Ok(())
    }
}

/// Writes its input into a graph output
#[derive(Debug, Clone, Default)]
pub struct GraphOutput;

impl GraphOutput {
    pub const TYPE: &'static str = "basic/graph_output";
    pub const PORT_VALUE: &'static str = "value";

    fn create() -> Box<dyn NodeBehavior> {
        Box::new(Self)
    }
}

impl NodeDescriptor for GraphOutput {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::TYPE, "Output")
            .with_description("Output of the graph")
            .with_input(SlotSpec::new(Self::PORT_VALUE, SlotType::Any))
            .with_property(PROP_NAME, json!(""))
    }
}

inventory::submit!(dataflow_engine::NodeTypeFn {
    descriptor: GraphOutput::descriptor,
    factory: GraphOutput::create,
});

impl NodeBehavior for GraphOutput {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        Some(self)
    }
}

impl Executable for GraphOutput {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _param: &Value, _options: &ExecOptions) -> Result<()> {
        let Some(name) = param_name(ctx) else {
            return Ok(());
        };
        let value = ctx.input_data(0).unwrap_or(Value::Null);
        if !ctx.set_graph_output(&name, value) {
            log::debug!("Graph output '{}' is not defined", name);
        }
        Ok(())
    }
}

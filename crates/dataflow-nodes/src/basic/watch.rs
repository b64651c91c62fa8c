//! Watch node
//!
//! Copies whatever arrives on its input into its `value` property so an
//! editor (or a test) can inspect it.

use dataflow_engine::{
    ExecOptions, Executable, NodeBehavior, NodeContext, NodeDescriptor, NodeTypeMetadata, Result,
    SlotSpec, SlotType,
};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct Watch;

impl Watch {
    pub const TYPE: &'static str = "basic/watch";
    pub const PORT_VALUE: &'static str = "value";
    /// Property mirroring the last input
    pub const PROP_VALUE: &'static str = "value";

    fn create() -> Box<dyn NodeBehavior> {
        Box::new(Self)
    }
}

impl NodeDescriptor for Watch {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::TYPE, "Watch")
            .with_description("Show value of input")
            .with_input(SlotSpec::new(Self::PORT_VALUE, SlotType::Any))
            .with_property(Self::PROP_VALUE, Value::Null)
    }
}

inventory::submit!(dataflow_engine::NodeTypeFn {
    descriptor: Watch::descriptor,
    factory: Watch::create,
});

impl NodeBehavior for Watch {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        Some(self)
    }
}

impl Executable for Watch {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _param: &Value, _options: &ExecOptions) -> Result<()> {
        if let Some(value) = ctx.input_data(0) {
            ctx.set_property(Self::PROP_VALUE, value);
        }
        Ok(())
    }
}

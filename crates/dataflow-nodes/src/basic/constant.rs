//! Constant number node

use dataflow_engine::{
    ExecOptions, Executable, NodeBehavior, NodeContext, NodeDescriptor, NodeTypeMetadata, Result,
    SlotSpec, SlotType,
};
use serde_json::{json, Value};

/// Emits its `value` property every time it runs
#[derive(Debug, Clone, Default)]
pub struct ConstNumber;

impl ConstNumber {
    /// Node type path
    pub const TYPE: &'static str = "basic/const";
    /// Output carrying the constant
    pub const PORT_VALUE: &'static str = "value";
    /// Property holding the constant
    pub const PROP_VALUE: &'static str = "value";

    fn create() -> Box<dyn NodeBehavior> {
        Box::new(Self)
    }
}

impl NodeDescriptor for ConstNumber {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::TYPE, "Const Number")
            .with_description("Constant number")
            .with_output(SlotSpec::new(Self::PORT_VALUE, SlotType::named("number")))
            .with_property(Self::PROP_VALUE, json!(1.0))
    }
}

inventory::submit!(dataflow_engine::NodeTypeFn {
    descriptor: ConstNumber::descriptor,
    factory: ConstNumber::create,
});

impl NodeBehavior for ConstNumber {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        Some(self)
    }

    fn on_property_changed(&mut self, name: &str, value: &Value, _previous: Option<&Value>) -> bool {
        name != Self::PROP_VALUE || value.is_number()
    }
}

impl Executable for ConstNumber {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _param: &Value, _options: &ExecOptions) -> Result<()> {
        let value = ctx.property(Self::PROP_VALUE).cloned().unwrap_or(Value::Null);
        ctx.set_output_data(0, value);
        Ok(())
    }
}

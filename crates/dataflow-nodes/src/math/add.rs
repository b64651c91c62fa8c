//! Addition node

use dataflow_engine::{
    ExecOptions, Executable, NodeBehavior, NodeContext, NodeDescriptor, NodeTypeMetadata, Result,
    SlotSpec, SlotType,
};
use serde_json::{json, Value};

/// Adds its two number inputs
///
/// # Inputs
/// - `A`, `B` - operands; an unconnected or non-numeric input falls back
///   to the property of the same name
///
/// # Outputs
/// - `A+B` - the sum
#[derive(Debug, Clone, Default)]
pub struct MathAdd;

impl MathAdd {
    pub const TYPE: &'static str = "math/add";
    pub const PORT_A: &'static str = "A";
    pub const PORT_B: &'static str = "B";
    pub const PORT_SUM: &'static str = "A+B";

    fn create() -> Box<dyn NodeBehavior> {
        Box::new(Self)
    }

    fn operand(ctx: &NodeContext<'_>, slot: usize, name: &str) -> f64 {
        ctx.input_data(slot)
            .and_then(|v| v.as_f64())
            .or_else(|| ctx.property(name).and_then(|v| v.as_f64()))
            .unwrap_or(0.0)
    }
}

impl NodeDescriptor for MathAdd {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::TYPE, "Add")
            .with_description("Sum of A and B")
            .with_input(SlotSpec::new(Self::PORT_A, SlotType::named("number")))
            .with_input(SlotSpec::new(Self::PORT_B, SlotType::named("number")))
            .with_output(SlotSpec::new(Self::PORT_SUM, SlotType::named("number")))
            .with_property(Self::PORT_A, json!(1.0))
            .with_property(Self::PORT_B, json!(1.0))
    }
}

inventory::submit!(dataflow_engine::NodeTypeFn {
    descriptor: MathAdd::descriptor,
    factory: MathAdd::create,
});

impl NodeBehavior for MathAdd {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        Some(self)
    }
}

impl Executable for MathAdd {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _param: &Value, _options: &ExecOptions) -> Result<()> {
        let a = Self::operand(ctx, 0, Self::PORT_A);
        let b = Self::operand(ctx, 1, Self::PORT_B);
        ctx.set_output_data(0, json!(a + b));
        Ok(())
    }
}

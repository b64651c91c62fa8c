//! Event counter node

use dataflow_engine::{
    Actionable, ExecOptions, Executable, NodeBehavior, NodeContext, NodeDescriptor,
    NodeTypeMetadata, Result, SlotSpec, SlotType,
};
use serde_json::{json, Value};

/// Counts `inc`/`dec` actions
///
/// The count lives in the `num` property so it survives snapshots. Every
/// change fires `change` with the new count.
///
/// # Inputs
/// - `inc`, `dec`, `reset` - actions
///
/// # Outputs
/// - `change` - event carrying the new count
/// - `num` - current count, written when the node executes
#[derive(Debug, Clone, Default)]
pub struct EventCounter;

impl EventCounter {
    pub const TYPE: &'static str = "events/counter";
    pub const ACTION_INC: &'static str = "inc";
    pub const ACTION_DEC: &'static str = "dec";
    pub const ACTION_RESET: &'static str = "reset";
    pub const PORT_CHANGE: &'static str = "change";
    pub const PORT_NUM: &'static str = "num";

    fn create() -> Box<dyn NodeBehavior> {
        Box::new(Self)
    }

    fn count(ctx: &NodeContext<'_>) -> i64 {
        ctx.property(Self::PORT_NUM)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }
}

impl NodeDescriptor for EventCounter {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::TYPE, "Counter")
            .with_description("Counts events")
            .with_input(SlotSpec::action(Self::ACTION_INC))
            .with_input(SlotSpec::action(Self::ACTION_DEC))
            .with_input(SlotSpec::action(Self::ACTION_RESET))
            .with_output(SlotSpec::event(Self::PORT_CHANGE))
            .with_output(SlotSpec::new(Self::PORT_NUM, SlotType::named("number")))
            .with_property(Self::PORT_NUM, json!(0))
    }
}

inventory::submit!(dataflow_engine::NodeTypeFn {
    descriptor: EventCounter::descriptor,
    factory: EventCounter::create,
});

impl NodeBehavior for EventCounter {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        Some(self)
    }

    fn as_actionable(&mut self) -> Option<&mut dyn Actionable> {
        Some(self)
    }
}

impl Executable for EventCounter {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _param: &Value, _options: &ExecOptions) -> Result<()> {
        let num = Self::count(ctx);
        ctx.set_output_data_by_name(Self::PORT_NUM, json!(num));
        Ok(())
    }
}

impl Actionable for EventCounter {
    fn on_action(
        &mut self,
        ctx: &mut NodeContext<'_>,
        action: &str,
        _param: &Value,
        options: &ExecOptions,
    ) -> Result<()> {
        let before = Self::count(ctx);
        let after = match action {
            Self::ACTION_INC => before + 1,
            Self::ACTION_DEC => before - 1,
            Self::ACTION_RESET => 0,
            // onTrigger and other extra inputs do not change the count
            _ => before,
        };
        if after == before {
            return Ok(());
        }

        ctx.set_property(Self::PORT_NUM, json!(after));
        ctx.set_output_data_by_name(Self::PORT_NUM, json!(after));
        ctx.trigger_with_options(Some(Self::PORT_CHANGE), json!(after), options)
    }
}

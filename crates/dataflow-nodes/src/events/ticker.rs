//! Ticker node
//!
//! Fires its `tick` event every `every` executions. The payload is the
//! graph iteration the tick happened in.

use dataflow_engine::{
    ExecOptions, Executable, NodeBehavior, NodeContext, NodeDescriptor, NodeTypeMetadata, Result,
    SlotSpec,
};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default)]
pub struct Ticker {
    /// Executions since the last tick
    pending: u64,
}

impl Ticker {
    pub const TYPE: &'static str = "events/ticker";
    pub const PORT_TICK: &'static str = "tick";
    /// Executions between ticks; values below 1 count as 1
    pub const PROP_EVERY: &'static str = "every";

    fn create() -> Box<dyn NodeBehavior> {
        Box::new(Self::default())
    }
}

impl NodeDescriptor for Ticker {
    fn descriptor() -> NodeTypeMetadata {
        NodeTypeMetadata::new(Self::TYPE, "Ticker")
            .with_description("Fires an event every N steps")
            .with_output(SlotSpec::event(Self::PORT_TICK))
            .with_property(Self::PROP_EVERY, json!(1))
    }
}

inventory::submit!(dataflow_engine::NodeTypeFn {
    descriptor: Ticker::descriptor,
    factory: Ticker::create,
});

impl NodeBehavior for Ticker {
    fn as_executable(&mut self) -> Option<&mut dyn Executable> {
        Some(self)
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {
        self.pending = 0;
    }
}

impl Executable for Ticker {
    fn on_execute(&mut self, ctx: &mut NodeContext<'_>, _param: &Value, _options: &ExecOptions) -> Result<()> {
        let every = ctx
            .property(Self::PROP_EVERY)
            .and_then(|v| v.as_u64())
            .unwrap_or(1)
            .max(1);

        self.pending += 1;
        if self.pending < every {
            return Ok(());
        }
        self.pending = 0;

        let iteration = ctx.iteration();
        log::trace!("Ticker {} fired in iteration {}", ctx.id(), iteration);
        ctx.trigger(Some(Self::PORT_TICK), json!(iteration))
    }
}

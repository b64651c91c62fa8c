//! Event nodes
//!
//! Nodes that fire events from the step loop or react to actions.

mod counter;
mod ticker;

pub use counter::EventCounter;
pub use ticker::Ticker;

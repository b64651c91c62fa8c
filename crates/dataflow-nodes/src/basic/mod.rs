//! Basic nodes
//!
//! Constants, watchers and the bridge to graph-level inputs and outputs.

mod constant;
mod graph_io;
mod watch;

pub use constant::ConstNumber;
pub use graph_io::{GraphInput, GraphOutput};
pub use watch::Watch;

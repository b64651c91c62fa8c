//! Dataflow Nodes
//!
//! Built-in node types for the dataflow engine. Every type registers itself
//! through `inventory`, so `NodeRegistry::with_builtins()` picks it up.
//!
//! # Categories
//!
//! - **Basic**: constants, watchers and graph-level inputs/outputs
//! - **Math**: arithmetic on numbers
//! - **Events**: nodes that fire events or react to actions

pub mod basic;
pub mod events;
pub mod math;

// Re-export all nodes for convenience
pub use basic::*;
pub use events::*;
pub use math::*;

#[cfg(test)]
mod tests {
    use dataflow_engine::NodeRegistry;

    #[test]
    fn test_inventory_collects_all_builtins() {
        let registry = NodeRegistry::with_builtins();
        let all = registry.all_metadata();
        assert_eq!(all.len(), 7, "Expected 7 built-in nodes");

        // Spot-check known types
        assert!(registry.has_node_type("basic/const"));
        assert!(registry.has_node_type("basic/watch"));
        assert!(registry.has_node_type("basic/graph_input"));
        assert!(registry.has_node_type("math/add"));
        assert!(registry.has_node_type("events/ticker"));
        assert!(registry.has_node_type("events/counter"));

        assert_eq!(registry.categories(), vec!["basic", "events", "math"]);
    }
}

//! Fluent builder for dataflow graphs
//!
//! Provides a fluent API for constructing graphs programmatically from
//! registered node types. Nodes are referred to by caller-chosen keys; the
//! ids the graph assigns are returned alongside the built graph.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::registry::NodeRegistry;
use crate::types::{NodeId, NodeMode, SlotRef};

struct NodeSpec {
    key: String,
    node_type: String,
    title: Option<String>,
    mode: Option<NodeMode>,
    pos: Option<[f64; 2]>,
    properties: Vec<(String, Value)>,
}

struct LinkSpec {
    origin: String,
    origin_slot: SlotRef,
    target: String,
    target_slot: SlotRef,
}

/// Fluent builder for constructing graphs
///
/// # Example
///
/// ```ignore
/// let built = GraphBuilder::new(registry, EngineConfig::default())
///     .add_node("a", "basic/const")
///     .with_property("value", json!(2))
///     .add_node("sum", "math/add")
///     .connect("a", "value", "sum", "A")
///     .build()?;
///
/// let sum = built.id("sum").unwrap();
/// ```
pub struct GraphBuilder {
    registry: Arc<NodeRegistry>,
    config: EngineConfig,
    nodes: Vec<NodeSpec>,
    links: Vec<LinkSpec>,
}

/// A built graph and the ids assigned to each builder key
pub struct BuiltGraph {
    pub graph: Graph,
    pub ids: HashMap<String, NodeId>,
}

impl BuiltGraph {
    /// Id of the node added under `key`
    pub fn id(&self, key: &str) -> Option<&NodeId> {
        self.ids.get(key)
    }
}

impl GraphBuilder {
    /// Create a new graph builder
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Add a node of a registered type under `key`
    pub fn add_node(mut self, key: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.nodes.push(NodeSpec {
            key: key.into(),
            node_type: node_type.into(),
            title: None,
            mode: None,
            pos: None,
            properties: Vec::new(),
        });
        self
    }

    /// Set a property on the most recently added node
    ///
    /// Must be called after `add_node`.
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.properties.push((name.into(), value));
        }
        self
    }

    /// Set the mode of the most recently added node
    pub fn with_mode(mut self, mode: NodeMode) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.mode = Some(mode);
        }
        self
    }

    /// Set the title of the most recently added node
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.title = Some(title.into());
        }
        self
    }

    /// Set the canvas position of the most recently added node
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.pos = Some([x, y]);
        }
        self
    }

    /// Link two nodes by slot name
    pub fn connect(
        self,
        origin: impl Into<String>,
        origin_slot: &str,
        target: impl Into<String>,
        target_slot: &str,
    ) -> Self {
        self.link(origin.into(), origin_slot.into(), target.into(), target_slot.into())
    }

    /// Link two nodes by slot index
    pub fn connect_index(
        self,
        origin: impl Into<String>,
        origin_slot: usize,
        target: impl Into<String>,
        target_slot: usize,
    ) -> Self {
        self.link(origin.into(), origin_slot.into(), target.into(), target_slot.into())
    }

    /// Link an event output to the target's trigger input
    pub fn connect_event(
        self,
        origin: impl Into<String>,
        origin_slot: &str,
        target: impl Into<String>,
    ) -> Self {
        self.link(origin.into(), origin_slot.into(), target.into(), SlotRef::Event)
    }

    fn link(mut self, origin: String, origin_slot: SlotRef, target: String, target_slot: SlotRef) -> Self {
        self.links.push(LinkSpec {
            origin,
            origin_slot,
            target,
            target_slot,
        });
        self
    }

    /// Create the nodes and links
    ///
    /// Fails on an unknown node type, an unknown node key or a connection
    /// that the graph refuses.
    pub fn build(self) -> Result<BuiltGraph> {
        let GraphBuilder {
            registry,
            config,
            nodes,
            links,
        } = self;
        let mut graph = Graph::new(config, registry);

        let ids = graph.batch(|graph| -> Result<HashMap<String, NodeId>> {
            let mut ids = HashMap::new();
            for spec in nodes {
                let mut node = graph.create_node(&spec.node_type)?;
                if let Some(title) = spec.title {
                    node.title = title;
                }
                if let Some(mode) = spec.mode {
                    node.change_mode(mode);
                }
                if let Some(pos) = spec.pos {
                    node.pos = pos;
                }
                for (name, value) in spec.properties {
                    if !node.set_property(&name, value) {
                        log::warn!("Node '{}' rejected property '{}'", spec.key, name);
                    }
                }
                let id = graph.add(node)?;
                if ids.insert(spec.key.clone(), id).is_some() {
                    log::warn!("Builder key '{}' used twice, keeping the later node", spec.key);
                }
            }

            for link in links {
                let origin = lookup(&ids, &link.origin)?;
                let target = lookup(&ids, &link.target)?;
                let linked = graph.connect_slots(
                    &origin,
                    link.origin_slot.clone(),
                    &target,
                    link.target_slot.clone(),
                )?;
                if linked.is_none() {
                    return Err(GraphError::ConnectionRejected(format!(
                        "{}:{:?} -> {}:{:?}",
                        link.origin, link.origin_slot, link.target, link.target_slot
                    )));
                }
            }
            Ok(ids)
        })?;

        log::debug!(
            "Built graph with {} node(s) and {} link(s)",
            graph.node_count(),
            graph.link_count()
        );
        Ok(BuiltGraph { graph, ids })
    }
}

fn lookup(ids: &HashMap<String, NodeId>, key: &str) -> Result<NodeId> {
    ids.get(key)
        .cloned()
        .ok_or_else(|| GraphError::ConnectionRejected(format!("no node added under key '{}'", key)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{init_logging, recorder_registry};

    fn builder() -> GraphBuilder {
        init_logging();
        GraphBuilder::new(Arc::new(recorder_registry()), EngineConfig::default())
    }

    #[test]
    fn test_build_nodes_and_links() {
        let built = builder()
            .add_node("a", "test/recorder")
            .with_title("Source")
            .with_property("gain", json!(2))
            .add_node("b", "test/recorder")
            .with_mode(NodeMode::OnEvent)
            .with_position(200.0, 0.0)
            .connect("a", "out", "b", "in")
            .build()
            .unwrap();

        let a = built.id("a").unwrap();
        let b = built.id("b").unwrap();
        let graph = &built.graph;
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.link_count(), 1);
        assert_eq!(graph.input_node(b, 0).as_ref(), Some(a));
        assert_eq!(graph.node(a).unwrap().title, "Source");
        assert_eq!(graph.node(a).unwrap().property("gain"), Some(&json!(2)));
        assert_eq!(graph.node(b).unwrap().mode(), NodeMode::OnEvent);
        assert_eq!(graph.node(b).unwrap().pos, [200.0, 0.0]);
        assert_eq!(graph.nodes_in_order(), &[a.clone(), b.clone()]);
    }

    #[test]
    fn test_connect_by_index() {
        let built = builder()
            .add_node("a", "test/recorder")
            .add_node("b", "test/recorder")
            .connect_index("a", 0, "b", 0)
            .build()
            .unwrap();
        assert_eq!(built.graph.link_count(), 1);
    }

    #[test]
    fn test_unknown_type_fails() {
        let result = builder().add_node("a", "nope/missing").build();
        assert!(matches!(result, Err(GraphError::UnknownNodeType(t)) if t == "nope/missing"));
    }

    #[test]
    fn test_refused_connection_fails() {
        let result = builder()
            .add_node("a", "test/recorder")
            .add_node("b", "test/recorder")
            .connect("a", "out", "b", "missing")
            .build();
        assert!(matches!(result, Err(GraphError::ConnectionRejected(_))));

        let result = builder()
            .add_node("a", "test/recorder")
            .connect("a", "out", "ghost", "in")
            .build();
        assert!(matches!(result, Err(GraphError::ConnectionRejected(_))));
    }

    #[test]
    fn test_property_veto_is_not_fatal() {
        let built = builder()
            .add_node("a", "test/recorder")
            .with_property("locked", json!(true))
            .build()
            .unwrap();
        let a = built.id("a").unwrap();
        assert!(built.graph.node(a).unwrap().property("locked").is_none());
    }
}

//! Serialize / configure

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{Graph, GraphParam};
use crate::error::{GraphError, Result};
use crate::link::Link;
use crate::node::{Node, NodeSnapshot};
use crate::types::{Id, NodeId, SlotKind};

/// Snapshot format version written by [`Graph::serialize`]
pub const SNAPSHOT_VERSION: f64 = 0.4;

fn default_version() -> f64 {
    SNAPSHOT_VERSION
}

/// Accepts a number, a numeric string or null
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

/// Serialized form of a whole graph
///
/// Nodes are kept as raw JSON so that unknown node types survive a round
/// trip unchanged. Links use the positional tuple form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub last_node_id: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub last_link_id: u64,
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub links: Vec<Value>,
    #[serde(default)]
    pub groups: Vec<Value>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, GraphParam>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, GraphParam>,
    #[serde(default = "default_version")]
    pub version: f64,
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self {
            last_node_id: 0,
            last_link_id: 0,
            nodes: Vec::new(),
            links: Vec::new(),
            groups: Vec::new(),
            config: Map::new(),
            extra: Map::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            version: SNAPSHOT_VERSION,
        }
    }
}

impl Graph {
    /// Encode the graph
    pub fn serialize(&self) -> Result<GraphSnapshot> {
        let nodes = self
            .nodes()
            .map(Node::serialize)
            .collect::<Result<Vec<_>>>()?;
        let links = self.links.values().map(Link::to_value).collect();

        Ok(GraphSnapshot {
            last_node_id: self.last_node_id,
            last_link_id: self.last_link_id,
            nodes,
            links,
            groups: self.groups.clone(),
            config: self.config_data.clone(),
            extra: self.extra.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            version: SNAPSHOT_VERSION,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.serialize()?)?)
    }

    /// Parse a JSON snapshot and [`configure`](Self::configure) from it
    pub fn configure_json(&mut self, json: &str, keep_old: bool) -> Result<bool> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(GraphError::InvalidSnapshot(
                "expected a JSON object at the top level".to_string(),
            ));
        }
        let snapshot: GraphSnapshot = serde_json::from_value(value)?;
        self.configure(snapshot, keep_old)
    }

    /// Load a snapshot, replacing the graph unless `keep_old` is set
    ///
    /// Malformed links are skipped and unknown node types become inert
    /// placeholders. Returns true when anything had to be recovered that
    /// way.
    pub fn configure(&mut self, snapshot: GraphSnapshot, keep_old: bool) -> Result<bool> {
        if !keep_old {
            self.clear();
        }
        let mut had_errors = false;

        self.last_node_id = self.last_node_id.max(snapshot.last_node_id);
        self.last_link_id = self.last_link_id.max(snapshot.last_link_id);

        for raw in &snapshot.links {
            match Link::from_value(raw) {
                Some(link) => {
                    if let Id::Num(n) = link.id {
                        self.last_link_id = self.last_link_id.max(n);
                    }
                    self.links.insert(link.id.clone(), link);
                }
                None => {
                    log::warn!("Skipping malformed link in snapshot: {}", raw);
                    had_errors = true;
                }
            }
        }

        let mut parsed = Vec::with_capacity(snapshot.nodes.len());
        for raw in &snapshot.nodes {
            match serde_json::from_value::<NodeSnapshot>(raw.clone()) {
                Ok(info) => parsed.push((info, raw)),
                Err(e) => {
                    log::warn!("Skipping malformed node in snapshot: {}", e);
                    had_errors = true;
                }
            }
        }

        self.batch(|graph| -> Result<()> {
            let mut added = Vec::with_capacity(parsed.len());
            for (info, raw) in &parsed {
                let mut node = match graph.registry.create_node(&info.node_type, info.title.as_deref()) {
                    Some(node) => node,
                    None => {
                        log::warn!("Node type '{}' is not registered", info.node_type);
                        had_errors = true;
                        Node::placeholder(&info.node_type, (*raw).clone())
                    }
                };
                node.set_id(info.id.clone());
                added.push(graph.add(node)?);
            }

            // Apply after every node exists so hooks can reach each other
            for (id, (info, raw)) in added.iter().zip(&parsed) {
                let Some(node) = graph.nodes.get_mut(id) else {
                    continue;
                };
                node.apply_snapshot(info);
                if let Some(behavior) = node.behavior.as_mut() {
                    behavior.on_configure(raw);
                }
            }
            for id in &added {
                graph.announce_links(id);
            }
            Ok(())
        })?;

        self.groups = snapshot.groups;
        self.config_data = snapshot.config;
        self.extra = snapshot.extra;
        if !keep_old {
            self.inputs = snapshot.inputs;
            self.outputs = snapshot.outputs;
        } else {
            self.inputs.extend(snapshot.inputs);
            self.outputs.extend(snapshot.outputs);
        }

        log::debug!(
            "Configured graph with {} node(s) and {} link(s)",
            self.nodes.len(),
            self.links.len()
        );
        self.changed("configure");
        self.update_execution_order();
        self.set_dirty_canvas(true, true);
        Ok(had_errors)
    }

    /// Tell a freshly configured node about the links it already holds
    fn announce_links(&mut self, id: &NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let mut held = Vec::new();
        for (slot, input) in node.inputs().iter().enumerate() {
            if let Some(link) = input.link.as_ref().and_then(|l| self.links.get(l)) {
                held.push((SlotKind::Input, slot, link.clone()));
            }
        }
        for (slot, output) in node.outputs().iter().enumerate() {
            for link in output.links.iter().filter_map(|l| self.links.get(l)) {
                held.push((SlotKind::Output, slot, link.clone()));
            }
        }

        if let Some(behavior) = self.nodes.get_mut(id).and_then(|n| n.behavior.as_mut()) {
            for (kind, slot, link) in &held {
                behavior.on_connections_change(*kind, *slot, true, link);
            }
        }
    }
}

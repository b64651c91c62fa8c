//! Node type descriptor trait and metadata types
//!
//! A node type describes its slots, default properties and mode through
//! `NodeDescriptor`. The registry uses that metadata to build fresh nodes,
//! so a type's behavior and its shape are defined in one place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{NodeMode, SlotType};

/// Trait for node types that can describe their metadata
///
/// # Example
///
/// ```ignore
/// impl NodeDescriptor for MathAdd {
///     fn descriptor() -> NodeTypeMetadata {
///         NodeTypeMetadata::new("math/add", "Add")
///             .with_input(SlotSpec::new("A", SlotType::named("number")))
///             .with_input(SlotSpec::new("B", SlotType::named("number")))
///             .with_output(SlotSpec::new("A+B", SlotType::named("number")))
///     }
/// }
/// ```
pub trait NodeDescriptor {
    /// Get the static metadata for this node type
    fn descriptor() -> NodeTypeMetadata
    where
        Self: Sized;
}

/// Complete metadata for a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeMetadata {
    /// Unique type path, e.g. "math/add"
    pub node_type: String,
    /// Default title of new nodes
    pub title: String,
    /// Category for grouping; the type path prefix when not set explicitly
    pub category: String,
    /// Description of what the node does
    pub description: String,
    /// Input slot definitions
    pub inputs: Vec<SlotSpec>,
    /// Output slot definitions
    pub outputs: Vec<SlotSpec>,
    /// Properties and their default values
    pub properties: Map<String, Value>,
    /// Mode of new nodes
    pub mode: NodeMode,
}

impl NodeTypeMetadata {
    /// Metadata with the category taken from the type path
    pub fn new(node_type: impl Into<String>, title: impl Into<String>) -> Self {
        let node_type = node_type.into();
        let category = node_type
            .rsplit_once('/')
            .map(|(category, _)| category.to_string())
            .unwrap_or_default();
        Self {
            node_type,
            title: title.into(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: Map::new(),
            mode: NodeMode::Always,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, slot: SlotSpec) -> Self {
        self.inputs.push(slot);
        self
    }

    pub fn with_output(mut self, slot: SlotSpec) -> Self {
        self.outputs.push(slot);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, default: Value) -> Self {
        self.properties.insert(name.into(), default);
        self
    }

    pub fn with_mode(mut self, mode: NodeMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Metadata for one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
            label: None,
        }
    }

    /// Event output
    pub fn event(name: impl Into<String>) -> Self {
        Self::new(name, SlotType::Event)
    }

    /// Action input
    pub fn action(name: impl Into<String>) -> Self {
        Self::new(name, SlotType::ACTION)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_path() {
        assert_eq!(NodeTypeMetadata::new("math/trig/sin", "Sin").category, "math/trig");
        assert_eq!(NodeTypeMetadata::new("flat", "Flat").category, "");
    }

    #[test]
    fn test_metadata_serialization() {
        let metadata = NodeTypeMetadata::new("events/counter", "Counter")
            .with_input(SlotSpec::action("inc"))
            .with_output(SlotSpec::new("num", SlotType::named("number")))
            .with_property("start", serde_json::json!(0));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["nodeType"], "events/counter"); // camelCase
        assert_eq!(json["inputs"][0]["type"], -1);
        assert_eq!(json["mode"], 0);
    }
}

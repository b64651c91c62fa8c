//! Node type registry
//!
//! Maps node type paths to metadata and behavior factories. A registry is
//! an explicit object passed to each graph; there is no global table.
//!
//! # Usage
//!
//! ```ignore
//! let mut registry = NodeRegistry::new();
//! registry.register_type::<MathAdd>();
//!
//! let graph = Graph::new(EngineConfig::default(), Arc::new(registry));
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::behavior::NodeBehavior;
use crate::descriptor::{NodeDescriptor, NodeTypeMetadata};
use crate::node::Node;

/// Factory producing a fresh behavior for a node type
pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync>;

/// Link-time registration of a built-in node type
///
/// # Example
///
/// ```ignore
/// inventory::submit!(dataflow_engine::NodeTypeFn {
///     descriptor: MathAdd::descriptor,
///     factory: || Box::new(MathAdd::default()),
/// });
/// ```
pub struct NodeTypeFn {
    /// Returns the type's metadata
    pub descriptor: fn() -> NodeTypeMetadata,
    /// Creates the type's behavior
    pub factory: fn() -> Box<dyn NodeBehavior>,
}

inventory::collect!(NodeTypeFn);

/// A registration entry combining metadata with its factory
struct RegistryEntry {
    metadata: NodeTypeMetadata,
    factory: BehaviorFactory,
}

/// Registry of node types
///
/// # Composability
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = NodeRegistry::with_builtins();
/// registry.merge(plugin_registry); // Add plugin nodes
/// ```
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry holding every type submitted through `inventory`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in inventory::iter::<NodeTypeFn> {
            registry.register_fn(entry);
        }
        log::debug!("Registered {} built-in node types", registry.entries.len());
        registry
    }

    /// Register a type from its descriptor and factory functions
    pub fn register_fn(&mut self, entry: &NodeTypeFn) {
        let factory = entry.factory;
        self.register((entry.descriptor)(), Arc::new(factory));
    }

    /// Register a node type; replaces an existing entry of the same path
    pub fn register(&mut self, metadata: NodeTypeMetadata, factory: BehaviorFactory) {
        if self.entries.contains_key(&metadata.node_type) {
            log::warn!("Replacing registered node type '{}'", metadata.node_type);
        }
        self.entries.insert(
            metadata.node_type.clone(),
            RegistryEntry { metadata, factory },
        );
    }

    /// Register a type that describes itself and has a default state
    pub fn register_type<T>(&mut self)
    where
        T: NodeDescriptor + NodeBehavior + Clone + Default,
    {
        self.register(T::descriptor(), Arc::new(|| Box::new(T::default()) as Box<dyn NodeBehavior>));
    }

    /// Remove a node type; returns false if it was not registered
    pub fn unregister(&mut self, node_type: &str) -> bool {
        self.entries.remove(node_type).is_some()
    }

    /// Get metadata for a node type
    pub fn metadata(&self, node_type: &str) -> Option<&NodeTypeMetadata> {
        self.entries.get(node_type).map(|e| &e.metadata)
    }

    /// Get all registered metadata
    pub fn all_metadata(&self) -> Vec<&NodeTypeMetadata> {
        self.entries.values().map(|e| &e.metadata).collect()
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type paths, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Types in a category, sorted
    pub fn types_in_category(&self, category: &str) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .entries
            .values()
            .filter(|e| e.metadata.category == category)
            .map(|e| e.metadata.node_type.as_str())
            .collect();
        types.sort_unstable();
        types
    }

    /// All distinct categories, sorted
    pub fn categories(&self) -> Vec<&str> {
        self.entries
            .values()
            .map(|e| e.metadata.category.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Build a detached node of a registered type
    pub fn create_node(&self, node_type: &str, title: Option<&str>) -> Option<Node> {
        let entry = self.entries.get(node_type)?;
        let metadata = &entry.metadata;

        let mut node = Node::new(
            metadata.node_type.clone(),
            metadata.title.clone(),
            (entry.factory)(),
        );
        for spec in &metadata.inputs {
            let slot = node.add_input(spec.name.clone(), spec.slot_type.clone());
            node.inputs_mut()[slot].label = spec.label.clone();
        }
        for spec in &metadata.outputs {
            let slot = node.add_output(spec.name.clone(), spec.slot_type.clone());
            node.outputs_mut()[slot].label = spec.label.clone();
        }
        for (name, value) in &metadata.properties {
            node.add_property(name.clone(), value.clone());
        }
        node.change_mode(metadata.mode);
        if let Some(title) = title {
            node.title = title.to_string();
        }
        node.size = node.compute_size();
        Some(node)
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same type path.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Connection validation and graph consistency checks
//!
//! `is_valid_connection` is the predicate used whenever a link is created.
//! `validate_graph` audits a whole graph and reports every problem found.

use std::collections::{HashMap, VecDeque};

use crate::graph::Graph;
use crate::types::{LinkId, NodeId, SlotKind, SlotType};

/// Check if an output of type `from` may feed an input of type `to`
///
/// The wildcard matches anything, an event output matches an action input,
/// and named types compare case-insensitively. Comma separated lists match
/// when any pair of their entries matches.
pub fn is_valid_connection(from: &SlotType, to: &SlotType) -> bool {
    match (from, to) {
        (SlotType::Any, _) | (_, SlotType::Any) => true,
        (SlotType::Event, SlotType::Event) => true,
        (SlotType::Event, _) | (_, SlotType::Event) => false,
        (SlotType::Named(a), SlotType::Named(b)) => is_valid_connection_str(a, b),
    }
}

/// String form of [`is_valid_connection`]
///
/// `""` and `"*"` are the wildcard.
pub fn is_valid_connection_str(from: &str, to: &str) -> bool {
    let from = from.trim();
    let to = to.trim();
    if is_wildcard(from) || is_wildcard(to) || from == to {
        return true;
    }

    let from = from.to_lowercase();
    let to = to.to_lowercase();
    if !from.contains(',') && !to.contains(',') {
        return from == to;
    }

    from.split(',')
        .any(|a| to.split(',').any(|b| is_valid_connection_str(a, b)))
}

fn is_wildcard(name: &str) -> bool {
    name.is_empty() || name == "*"
}

/// Graph consistency problem with location context
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A link references a node that is not in the graph
    UnknownNode { link_id: LinkId, node_id: NodeId },
    /// A link references a slot index the node does not have
    UnknownSlot {
        link_id: LinkId,
        node_id: NodeId,
        kind: SlotKind,
        slot: usize,
    },
    /// A link is stored but its endpoint slot does not list it
    UnregisteredLink {
        link_id: LinkId,
        node_id: NodeId,
        kind: SlotKind,
    },
    /// A slot lists a link that is missing or points elsewhere
    DanglingLink {
        node_id: NodeId,
        kind: SlotKind,
        slot: usize,
        link_id: LinkId,
    },
    /// A link joins slots whose types cannot connect
    IncompatibleTypes {
        link_id: LinkId,
        source_type: SlotType,
        target_type: SlotType,
    },
    /// A node was loaded without a registered type
    UnknownNodeType { node_id: NodeId, node_type: String },
    /// The link graph contains a cycle
    ///
    /// Cycles are legal; the execution order still covers every node.
    CycleDetected,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNode { link_id, node_id } => {
                write!(f, "Link '{}' references unknown node '{}'", link_id, node_id)
            }
            Self::UnknownSlot {
                link_id,
                node_id,
                kind,
                slot,
            } => write!(
                f,
                "Link '{}' references missing {:?} slot {} on node '{}'",
                link_id, kind, slot, node_id
            ),
            Self::UnregisteredLink {
                link_id,
                node_id,
                kind,
            } => write!(
                f,
                "Link '{}' is not registered on the {:?} side of node '{}'",
                link_id, kind, node_id
            ),
            Self::DanglingLink {
                node_id,
                kind,
                slot,
                link_id,
            } => write!(
                f,
                "{:?} slot {} of node '{}' holds dangling link '{}'",
                kind, slot, node_id, link_id
            ),
            Self::IncompatibleTypes {
                link_id,
                source_type,
                target_type,
            } => write!(
                f,
                "Link '{}' connects incompatible types: {} -> {}",
                link_id, source_type, target_type
            ),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "Unknown node type '{}' for node '{}'", node_type, node_id)
            }
            Self::CycleDetected => write!(f, "Cycle detected in graph"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a graph's link table against its node slots
///
/// Returns all validation errors found (not just the first).
pub fn validate_graph(graph: &Graph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_link_endpoints(graph, &mut errors);
    validate_slot_references(graph, &mut errors);
    validate_node_types(graph, &mut errors);
    detect_cycles(graph, &mut errors);

    errors
}

/// Check that every stored link resolves on both ends and is registered there
fn validate_link_endpoints(graph: &Graph, errors: &mut Vec<ValidationError>) {
    for link in graph.links() {
        let origin = graph.node(&link.origin_id);
        let target = graph.node(&link.target_id);

        let output = match origin {
            None => {
                errors.push(ValidationError::UnknownNode {
                    link_id: link.id.clone(),
                    node_id: link.origin_id.clone(),
                });
                None
            }
            Some(node) => match node.output(link.origin_slot) {
                None => {
                    errors.push(ValidationError::UnknownSlot {
                        link_id: link.id.clone(),
                        node_id: link.origin_id.clone(),
                        kind: SlotKind::Output,
                        slot: link.origin_slot,
                    });
                    None
                }
                Some(output) => {
                    if !output.links.contains(&link.id) {
                        errors.push(ValidationError::UnregisteredLink {
                            link_id: link.id.clone(),
                            node_id: link.origin_id.clone(),
                            kind: SlotKind::Output,
                        });
                    }
                    Some(output)
                }
            },
        };

        let input = match target {
            None => {
                errors.push(ValidationError::UnknownNode {
                    link_id: link.id.clone(),
                    node_id: link.target_id.clone(),
                });
                None
            }
            Some(node) => match node.input(link.target_slot) {
                None => {
                    errors.push(ValidationError::UnknownSlot {
                        link_id: link.id.clone(),
                        node_id: link.target_id.clone(),
                        kind: SlotKind::Input,
                        slot: link.target_slot,
                    });
                    None
                }
                Some(input) => {
                    if input.link.as_ref() != Some(&link.id) {
                        errors.push(ValidationError::UnregisteredLink {
                            link_id: link.id.clone(),
                            node_id: link.target_id.clone(),
                            kind: SlotKind::Input,
                        });
                    }
                    Some(input)
                }
            },
        };

        if let (Some(output), Some(input)) = (output, input) {
            if !is_valid_connection(&output.slot_type, &input.slot_type) {
                errors.push(ValidationError::IncompatibleTypes {
                    link_id: link.id.clone(),
                    source_type: output.slot_type.clone(),
                    target_type: input.slot_type.clone(),
                });
            }
        }
    }
}

/// Check that every link id held by a slot points back at that slot
fn validate_slot_references(graph: &Graph, errors: &mut Vec<ValidationError>) {
    for node in graph.nodes() {
        let Some(node_id) = node.id() else { continue };

        for (slot, input) in node.inputs().iter().enumerate() {
            let Some(link_id) = &input.link else { continue };
            let valid = graph
                .link(link_id)
                .is_some_and(|l| &l.target_id == node_id && l.target_slot == slot);
            if !valid {
                errors.push(ValidationError::DanglingLink {
                    node_id: node_id.clone(),
                    kind: SlotKind::Input,
                    slot,
                    link_id: link_id.clone(),
                });
            }
        }

        for (slot, output) in node.outputs().iter().enumerate() {
            for link_id in &output.links {
                let valid = graph
                    .link(link_id)
                    .is_some_and(|l| &l.origin_id == node_id && l.origin_slot == slot);
                if !valid {
                    errors.push(ValidationError::DanglingLink {
                        node_id: node_id.clone(),
                        kind: SlotKind::Output,
                        slot,
                        link_id: link_id.clone(),
                    });
                }
            }
        }
    }
}

/// Report placeholder nodes whose type could not be resolved on load
fn validate_node_types(graph: &Graph, errors: &mut Vec<ValidationError>) {
    for node in graph.nodes() {
        if node.has_errors() {
            if let Some(id) = node.id() {
                errors.push(ValidationError::UnknownNodeType {
                    node_id: id.clone(),
                    node_type: node.type_name().to_string(),
                });
            }
        }
    }
}

/// Detect cycles using Kahn's algorithm (topological sort)
fn detect_cycles(graph: &Graph, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&NodeId, usize> = HashMap::new();
    for node in graph.nodes() {
        if let Some(id) = node.id() {
            in_degree.insert(id, 0);
        }
    }
    for link in graph.links() {
        if let Some(deg) = in_degree.get_mut(&link.target_id) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&NodeId> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for link in graph.links() {
            if &link.origin_id == node_id {
                if let Some(deg) = in_degree.get_mut(&link.target_id) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(&link.target_id);
                    }
                }
            }
        }
    }

    if visited < in_degree.len() {
        errors.push(ValidationError::CycleDetected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{recorder_graph, Recorder};

    #[test]
    fn test_wildcards() {
        assert!(is_valid_connection_str("*", "anything"));
        assert!(is_valid_connection_str("", "number"));
        assert!(is_valid_connection(&SlotType::Any, &SlotType::Event));
        assert!(is_valid_connection(&SlotType::named("vec3"), &SlotType::Any));
    }

    #[test]
    fn test_event_to_action() {
        assert!(is_valid_connection(&SlotType::Event, &SlotType::ACTION));
        assert!(!is_valid_connection(&SlotType::Event, &SlotType::named("number")));
        assert!(!is_valid_connection(&SlotType::named("number"), &SlotType::Event));
    }

    #[test]
    fn test_named_types() {
        assert!(is_valid_connection_str("number", "number"));
        assert!(is_valid_connection_str("Number", "number"));
        assert!(!is_valid_connection_str("vec3", "number"));
    }

    #[test]
    fn test_comma_lists() {
        assert!(is_valid_connection_str("number,string", "string"));
        assert!(is_valid_connection_str("string", "number, string"));
        assert!(is_valid_connection_str("vec2,vec3", "vec4,*"));
        assert!(!is_valid_connection_str("vec2,vec3", "vec4,number"));
    }

    #[test]
    fn test_consistent_graph_has_no_errors() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b")]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();

        let errors = validate_graph(&graph);
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_detect_cycle() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b")]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.connect(&ids[1], 0, &ids[0], 0).unwrap().unwrap();

        let errors = validate_graph(&graph);
        assert_eq!(errors, vec![ValidationError::CycleDetected]);
    }

    #[test]
    fn test_unknown_type_placeholder_reported() {
        let (mut graph, _) = recorder_graph(&[]);
        let had_errors = graph
            .configure_json(
                r#"{"last_node_id": 3, "last_link_id": 0,
                    "nodes": [{"id": 3, "type": "missing/type"}], "links": []}"#,
                false,
            )
            .unwrap();
        assert!(had_errors);

        let errors = validate_graph(&graph);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownNodeType { node_type, .. } if node_type == "missing/type")));
    }

    #[test]
    fn test_dangling_snapshot_link_reported() {
        let (mut graph, _) = recorder_graph(&[]);
        graph
            .configure_json(
                r#"{"last_node_id": 1, "last_link_id": 4,
                    "nodes": [{"id": 1, "type": "test/recorder", "outputs": [{"name": "out", "type": "number", "links": [4]}]}],
                    "links": [[4, 1, 0, 9, 0, "number"]]}"#,
                false,
            )
            .unwrap();

        let errors = validate_graph(&graph);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownNode { node_id, .. } if *node_id == NodeId::Num(9))));
    }
}

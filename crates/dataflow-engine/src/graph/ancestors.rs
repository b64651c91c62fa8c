//! Upstream traversal and recomputation

use std::collections::{HashSet, VecDeque};

use serde_json::Value;

use super::Graph;
use crate::behavior::ExecOptions;
use crate::error::Result;
use crate::types::{NodeId, NodeMode, SlotType};

/// Restricts which nodes [`Graph::get_ancestors`] reports and expands
///
/// Empty lists do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AncestorFilter {
    /// Nodes in these modes are neither reported nor expanded
    pub modes_skip: Vec<NodeMode>,
    /// Only nodes in these modes are reported and expanded
    pub modes_only: Vec<NodeMode>,
    /// Inputs of these types are not followed
    pub types_skip: Vec<SlotType>,
    /// Only inputs of these types are followed
    pub types_only: Vec<SlotType>,
}

impl AncestorFilter {
    /// Filter used when recomputing ancestors before a trigger or action
    pub fn refresh() -> Self {
        Self {
            modes_skip: vec![NodeMode::Never, NodeMode::OnEvent, NodeMode::OnTrigger],
            modes_only: vec![NodeMode::Always, NodeMode::OnRequest],
            types_skip: vec![SlotType::ACTION],
            types_only: Vec::new(),
        }
    }

    fn accepts_mode(&self, mode: NodeMode) -> bool {
        !self.modes_skip.contains(&mode) && (self.modes_only.is_empty() || self.modes_only.contains(&mode))
    }

    fn follows(&self, slot_type: &SlotType) -> bool {
        !self.types_skip.contains(slot_type)
            && (self.types_only.is_empty() || self.types_only.contains(slot_type))
    }
}

impl Graph {
    /// Nodes upstream of `id`, sorted by execution order
    ///
    /// Breadth-first over input links; each node is visited once and the
    /// start node is never part of the result.
    pub fn get_ancestors(&self, id: &NodeId, filter: &AncestorFilter) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = VecDeque::from([id.clone()]);

        while let Some(current) = pending.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            if &current != id {
                if !filter.accepts_mode(node.mode()) {
                    continue;
                }
                ancestors.push(current.clone());
            }

            for (slot, input) in node.inputs().iter().enumerate() {
                let Some(origin) = self.input_node(&current, slot) else {
                    continue;
                };
                if !filter.follows(&input.slot_type) {
                    continue;
                }
                if !visited.contains(&origin) {
                    pending.push_back(origin);
                }
            }
        }

        ancestors.sort_by_key(|a| self.nodes.get(a).map_or(0, |n| n.order()));
        ancestors
    }

    /// Execute the polled ancestors of `id` so its inputs are current
    ///
    /// Events fired while the ancestors run are suppressed. With
    /// `prevent_ancestor_recalculation` each node is refreshed at most once
    /// per step.
    pub fn refresh_ancestors(&mut self, id: &NodeId, call: Option<String>) -> Result<()> {
        let has_inputs = self.nodes.get(id).is_some_and(|n| !n.inputs().is_empty());
        if !has_inputs {
            return Ok(());
        }
        if self.config.prevent_ancestor_recalculation && self.guards.ancestors_calculated.contains(id) {
            return Ok(());
        }

        let call = match call {
            Some(call) => call,
            None => self.next_call_id(id, "ancestors"),
        };
        let options = ExecOptions::with_call(call);
        let ancestors = self.get_ancestors(id, &AncestorFilter::refresh());
        log::debug!("Refreshing {} ancestor(s) of node {}", ancestors.len(), id);

        let previous = std::mem::replace(&mut self.ancestors_call, true);
        let result = self.execute_ancestors(&ancestors, &options);
        self.ancestors_call = previous;
        result?;

        self.guards.ancestors_calculated.insert(id.clone());
        Ok(())
    }

    fn execute_ancestors(&mut self, ancestors: &[NodeId], options: &ExecOptions) -> Result<()> {
        for ancestor in ancestors {
            self.do_execute(ancestor, &Value::Null, options)?;
            self.guards.ancestors_calculated.insert(ancestor.clone());
        }
        Ok(())
    }

    /// Read an input after running the node feeding it
    ///
    /// With `refresh_tree` the feeding node's own ancestors run first.
    pub fn pull_input_data(&mut self, id: &NodeId, slot: usize, refresh_tree: bool) -> Result<Option<Value>> {
        let Some(origin) = self.input_link(id, slot).map(|l| l.origin_id.clone()) else {
            return Ok(None);
        };
        if self.nodes.contains_key(&origin) {
            if refresh_tree {
                self.refresh_ancestors(&origin, None)?;
            }
            self.do_execute(&origin, &Value::Null, &ExecOptions::default())?;
        }
        Ok(self.input_data(id, slot))
    }
}

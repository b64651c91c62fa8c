//! Slot connection protocol

use super::Graph;
use crate::error::{GraphError, Result};
use crate::events::GraphEvent;
use crate::link::Link;
use crate::node::ON_TRIGGER_INPUT;
use crate::types::{LinkId, NodeId, NodeMode, SlotKind, SlotRef, SlotType};
use crate::validation::is_valid_connection;

/// Fallbacks tried by [`Graph::connect_by_type`] when no slot matches the type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectByTypeOptions {
    /// An event type connects to the trigger input of the other node
    pub create_event_in_case: bool,
    /// Fall back to a wildcard slot
    pub general_type_in_case: bool,
    /// A wildcard type takes the first free non-event slot
    pub first_free_if_general_in_case: bool,
}

impl Default for ConnectByTypeOptions {
    fn default() -> Self {
        Self {
            create_event_in_case: true,
            general_type_in_case: true,
            first_free_if_general_in_case: true,
        }
    }
}

impl Graph {
    /// Connect an output of `origin` to an input of `target`
    ///
    /// Returns `Ok(None)` without touching the graph when the origin or a
    /// slot cannot be resolved, the nodes are the same, the types are
    /// incompatible or either node vetoes the link. A missing target is an
    /// error.
    pub fn connect(
        &mut self,
        origin: &NodeId,
        origin_slot: usize,
        target: &NodeId,
        target_slot: usize,
    ) -> Result<Option<LinkId>> {
        self.connect_slots(origin, SlotRef::Index(origin_slot), target, SlotRef::Index(target_slot))
    }

    /// [`connect`](Self::connect) with slots given by index, name or the event sentinel
    pub fn connect_slots(
        &mut self,
        origin: &NodeId,
        origin_slot: SlotRef,
        target: &NodeId,
        target_slot: SlotRef,
    ) -> Result<Option<LinkId>> {
        let Some(origin_node) = self.nodes.get(origin) else {
            log::warn!("Cannot connect from node {}: not in the graph", origin);
            return Ok(None);
        };
        let Some(output_index) = origin_node.resolve_output(&origin_slot) else {
            log::debug!("Node {} has no output {:?}", origin, origin_slot);
            return Ok(None);
        };
        if !self.nodes.contains_key(target) {
            return Err(GraphError::NodeNotFound(target.clone()));
        }
        if target == origin {
            return Ok(None);
        }

        // The event sentinel may name a trigger input that does not exist
        // yet; the node only switches mode once the link is accepted
        let mut switch_to_trigger = false;
        let input_index = match target_slot {
            SlotRef::Event => {
                if !self.config.do_add_triggers_slots {
                    return Ok(None);
                }
                let Some(node) = self.nodes.get(target) else {
                    return Err(GraphError::NodeNotFound(target.clone()));
                };
                switch_to_trigger = node.mode() != NodeMode::OnTrigger;
                match node.find_input_slot(ON_TRIGGER_INPUT) {
                    Some(slot) => Some(slot),
                    None if switch_to_trigger => Some(node.inputs().len()),
                    None => None,
                }
            }
            ref slot => self.nodes.get(target).and_then(|n| n.resolve_input(slot)),
        };
        let Some(input_index) = input_index else {
            log::debug!("Node {} has no input {:?}", target, target_slot);
            return Ok(None);
        };

        let Some(output_type) = self
            .nodes
            .get(origin)
            .and_then(|n| n.output(output_index))
            .map(|o| o.slot_type.clone())
        else {
            return Ok(None);
        };
        let input_type = match self.nodes.get(target).and_then(|n| n.input(input_index)) {
            Some(input) => input.slot_type.clone(),
            None if switch_to_trigger => SlotType::Event,
            None => return Ok(None),
        };

        if !self.accepts(target, SlotKind::Input, input_index, &output_type)
            || !self.accepts(origin, SlotKind::Output, output_index, &input_type)
        {
            log::debug!("Connection {} -> {} vetoed by a node", origin, target);
            return Ok(None);
        }
        if !is_valid_connection(&output_type, &input_type) {
            log::debug!(
                "Incompatible slot types: {} -> {}",
                output_type,
                input_type
            );
            return Ok(None);
        }

        self.batch(|graph| -> Result<Option<LinkId>> {
            if switch_to_trigger {
                if let Some(node) = graph.nodes.get_mut(target) {
                    node.change_mode(NodeMode::OnTrigger);
                }
            }
            if graph
                .nodes
                .get(target)
                .is_some_and(|n| n.is_input_connected(input_index))
            {
                graph.disconnect_input(target, input_index)?;
            }
            if output_type.is_event()
                && !graph.config.allow_multi_output_for_events
                && graph
                    .nodes
                    .get(origin)
                    .is_some_and(|n| n.is_output_connected(output_index))
            {
                graph.disconnect_output(origin, output_index, None)?;
            }

            let link_type = if input_type.is_any() {
                output_type.clone()
            } else {
                input_type.clone()
            };
            let link_id = graph.next_link_id();
            let link = Link::new(
                link_id.clone(),
                link_type,
                origin.clone(),
                output_index,
                target.clone(),
                input_index,
            );

            graph.links.insert(link_id.clone(), link.clone());
            if let Some(output) = graph
                .nodes
                .get_mut(origin)
                .and_then(|n| n.outputs_mut().get_mut(output_index))
            {
                output.links.push(link_id.clone());
            }
            if let Some(input) = graph
                .nodes
                .get_mut(target)
                .and_then(|n| n.inputs_mut().get_mut(input_index))
            {
                input.link = Some(link_id.clone());
            }

            graph.notify_connection(origin, SlotKind::Output, output_index, true, &link);
            graph.notify_connection(target, SlotKind::Input, input_index, true, &link);
            log::debug!(
                "Connected {}[{}] -> {}[{}] as link {}",
                origin,
                output_index,
                target,
                input_index,
                link_id
            );

            graph.changed("connect");
            graph.emit(GraphEvent::ConnectionChanged {
                link_id: link_id.clone(),
                connected: true,
            });
            graph.connection_change();
            graph.set_dirty_canvas(false, true);
            Ok(Some(link_id))
        })
    }

    fn accepts(&self, id: &NodeId, kind: SlotKind, slot: usize, other: &SlotType) -> bool {
        self.nodes
            .get(id)
            .and_then(|n| n.behavior.as_ref())
            .map_or(true, |b| b.accepts_connection(kind, slot, other))
    }

    fn notify_connection(&mut self, id: &NodeId, kind: SlotKind, slot: usize, connected: bool, link: &Link) {
        if let Some(behavior) = self.nodes.get_mut(id).and_then(|n| n.behavior.as_mut()) {
            behavior.on_connections_change(kind, slot, connected, link);
        }
    }

    /// Connect an output to the first input of `target` accepting `target_type`
    pub fn connect_by_type(
        &mut self,
        origin: &NodeId,
        origin_slot: usize,
        target: &NodeId,
        target_type: &SlotType,
        options: &ConnectByTypeOptions,
    ) -> Result<Option<LinkId>> {
        let target_node = self
            .nodes
            .get(target)
            .ok_or_else(|| GraphError::NodeNotFound(target.clone()))?;

        if let Some(slot) = target_node.find_input_slot_by_type(target_type, true, false) {
            return self.connect(origin, origin_slot, target, slot);
        }
        if options.create_event_in_case && target_type.is_event() {
            return self.connect_slots(origin, SlotRef::Index(origin_slot), target, SlotRef::Event);
        }
        if options.general_type_in_case {
            if let Some(slot) = target_node.find_input_slot_by_type(&SlotType::Any, false, true) {
                return self.connect(origin, origin_slot, target, slot);
            }
        }
        if options.first_free_if_general_in_case && target_type.is_any() {
            if let Some(slot) = target_node.find_input_slot_free(&[SlotType::Event]) {
                return self.connect(origin, origin_slot, target, slot);
            }
        }
        log::debug!("No input of node {} accepts type {}", target, target_type);
        Ok(None)
    }

    /// Connect the first output of `origin` producing `origin_type` to an input of `target`
    pub fn connect_by_type_output(
        &mut self,
        target: &NodeId,
        target_slot: usize,
        origin: &NodeId,
        origin_type: &SlotType,
        options: &ConnectByTypeOptions,
    ) -> Result<Option<LinkId>> {
        let Some(origin_node) = self.nodes.get(origin) else {
            log::warn!("Cannot connect from node {}: not in the graph", origin);
            return Ok(None);
        };

        if let Some(slot) = origin_node.find_output_slot_by_type(origin_type, true, false) {
            return self.connect(origin, slot, target, target_slot);
        }
        if options.general_type_in_case {
            if let Some(slot) = origin_node.find_output_slot_by_type(&SlotType::Any, false, true) {
                return self.connect(origin, slot, target, target_slot);
            }
        }
        if options.create_event_in_case && origin_type.is_event() && self.config.do_add_triggers_slots {
            let slot = match self.nodes.get_mut(origin) {
                Some(node) => node.add_on_executed_output(),
                None => return Ok(None),
            };
            return self.connect(origin, slot, target, target_slot);
        }
        if options.first_free_if_general_in_case && origin_type.is_any() {
            if let Some(slot) = origin_node.find_output_slot_free(&[SlotType::Event]) {
                return self.connect(origin, slot, target, target_slot);
            }
        }
        log::debug!("No output of node {} produces type {}", origin, origin_type);
        Ok(None)
    }

    /// Remove the link feeding an input
    ///
    /// Returns `Ok(false)` when the input was not connected.
    pub fn disconnect_input(&mut self, id: &NodeId, slot: usize) -> Result<bool> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let Some(link_id) = node.inputs_mut().get_mut(slot).and_then(|s| s.link.take()) else {
            return Ok(false);
        };

        if let Some(link) = self.links.remove(&link_id) {
            if let Some(output) = self
                .nodes
                .get_mut(&link.origin_id)
                .and_then(|n| n.outputs_mut().get_mut(link.origin_slot))
            {
                output.links.retain(|l| l != &link_id);
            }
            self.notify_connection(id, SlotKind::Input, slot, false, &link);
            self.notify_connection(&link.origin_id, SlotKind::Output, link.origin_slot, false, &link);
        }

        self.changed("disconnectInput");
        self.emit(GraphEvent::ConnectionChanged {
            link_id,
            connected: false,
        });
        self.connection_change();
        self.set_dirty_canvas(false, true);
        Ok(true)
    }

    /// Remove the links leaving an output, or only the one reaching `target`
    ///
    /// Returns `Ok(false)` when nothing was connected.
    pub fn disconnect_output(&mut self, id: &NodeId, slot: usize, target: Option<&NodeId>) -> Result<bool> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        if let Some(target) = target {
            if !self.nodes.contains_key(target) {
                return Err(GraphError::NodeNotFound(target.clone()));
            }
        }
        let Some(link_ids) = node.output(slot).map(|o| o.links.clone()) else {
            return Ok(false);
        };

        let mut removed = false;
        for link_id in link_ids {
            if let (Some(target), Some(link)) = (target, self.links.get(&link_id)) {
                if &link.target_id != target {
                    continue;
                }
            }

            if let Some(output) = self
                .nodes
                .get_mut(id)
                .and_then(|n| n.outputs_mut().get_mut(slot))
            {
                output.links.retain(|l| l != &link_id);
            }
            let Some(link) = self.links.remove(&link_id) else {
                continue;
            };
            if let Some(input) = self
                .nodes
                .get_mut(&link.target_id)
                .and_then(|n| n.inputs_mut().get_mut(link.target_slot))
            {
                if input.link.as_ref() == Some(&link_id) {
                    input.link = None;
                }
            }

            self.notify_connection(&link.target_id, SlotKind::Input, link.target_slot, false, &link);
            self.notify_connection(id, SlotKind::Output, slot, false, &link);
            self.emit(GraphEvent::ConnectionChanged {
                link_id,
                connected: false,
            });
            removed = true;

            if target.is_some() {
                break;
            }
        }

        if removed {
            self.changed("disconnectOutput");
            self.connection_change();
            self.set_dirty_canvas(false, true);
        }
        Ok(removed)
    }

    /// Remove a link through its target input
    pub fn remove_link(&mut self, link_id: &LinkId) -> Result<bool> {
        let Some(link) = self.links.get(link_id) else {
            log::debug!("Link {} is not in the graph", link_id);
            return Ok(false);
        };
        let (target, target_slot) = (link.target_id.clone(), link.target_slot);

        let feeds_target = self
            .nodes
            .get(&target)
            .and_then(|n| n.input(target_slot))
            .is_some_and(|input| input.link.as_ref() == Some(link_id));
        if feeds_target {
            return self.disconnect_input(&target, target_slot);
        }

        // Dangling link: drop it from the store and the origin side only
        if let Some(link) = self.links.remove(link_id) {
            if let Some(output) = self
                .nodes
                .get_mut(&link.origin_id)
                .and_then(|n| n.outputs_mut().get_mut(link.origin_slot))
            {
                output.links.retain(|l| l != link_id);
            }
        }
        self.changed("removeLink");
        self.connection_change();
        Ok(true)
    }

    /// Disconnect and remove an input slot, shifting later links down by one
    pub fn remove_node_input(&mut self, id: &NodeId, slot: usize) -> Result<bool> {
        let count = self
            .nodes
            .get(id)
            .map(|n| n.inputs().len())
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        if slot >= count {
            return Ok(false);
        }

        self.batch(|graph| -> Result<()> {
            graph.disconnect_input(id, slot)?;
            let Some(node) = graph.nodes.get_mut(id) else {
                return Ok(());
            };
            node.inputs_mut().remove(slot);
            for input in node.inputs().iter().skip(slot) {
                if let Some(link) = input.link.as_ref().and_then(|l| graph.links.get_mut(l)) {
                    link.target_slot -= 1;
                }
            }
            node.size = node.compute_size();
            Ok(())
        })?;

        self.set_dirty_canvas(true, true);
        Ok(true)
    }

    /// Disconnect and remove an output slot, shifting later links down by one
    pub fn remove_node_output(&mut self, id: &NodeId, slot: usize) -> Result<bool> {
        let count = self
            .nodes
            .get(id)
            .map(|n| n.outputs().len())
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        if slot >= count {
            return Ok(false);
        }

        self.batch(|graph| -> Result<()> {
            graph.disconnect_output(id, slot, None)?;
            let Some(node) = graph.nodes.get_mut(id) else {
                return Ok(());
            };
            node.outputs_mut().remove(slot);
            for output in node.outputs().iter().skip(slot) {
                for link_id in &output.links {
                    if let Some(link) = graph.links.get_mut(link_id) {
                        link.origin_slot -= 1;
                    }
                }
            }
            node.size = node.compute_size();
            Ok(())
        })?;

        self.set_dirty_canvas(true, true);
        Ok(true)
    }
}

//! Guarded execution, action delivery and event propagation

use serde_json::Value;

use super::Graph;
use crate::behavior::ExecOptions;
use crate::error::{GraphError, Result};
use crate::node::{PendingAction, ON_EXECUTED_OUTPUT};
use crate::types::{LinkId, NodeId, NodeMode};

impl Graph {
    /// Run a node's `on_execute` under the re-entrancy guards
    ///
    /// Returns `Ok(false)` when the node is not executable or a guard
    /// refused the call. On success the node's `onExecuted` output fires.
    pub fn do_execute(&mut self, id: &NodeId, param: &Value, options: &ExecOptions) -> Result<bool> {
        let (executable, exec_version) = match self.nodes.get(id) {
            Some(node) => (node.is_executable(), node.exec_version),
            None => return Err(GraphError::NodeNotFound(id.clone())),
        };
        if !executable {
            return Ok(false);
        }

        if self.guards.executing.contains(id) {
            log::debug!("Node {} is already executing", id);
            return Ok(false);
        }
        if self.config.ensure_node_single_execution
            && exec_version.is_some_and(|v| v >= self.iteration)
        {
            log::debug!("Node {} already ran in iteration {}", id, self.iteration);
            return Ok(false);
        }
        if self.config.ensure_unique_execution_and_action_call {
            if let Some(call) = &options.action_call {
                if self.guards.executed_action.get(id) == Some(call) {
                    log::debug!("Node {} already completed call {}", id, call);
                    return Ok(false);
                }
            }
        }

        let mut options = options.clone();
        let call = match options.action_call.clone() {
            Some(call) => call,
            None => {
                let call = self.next_call_id(id, "exec");
                options.action_call = Some(call.clone());
                call
            }
        };

        self.guards.executing.insert(id.clone());
        let outcome = self.with_behavior(id, |behavior, ctx| match behavior.as_executable() {
            Some(executable) => executable.on_execute(ctx, param, &options),
            None => Ok(()),
        });
        self.guards.executing.remove(id);

        let Some(result) = outcome else {
            log::debug!("Node {} is busy, skipping execution", id);
            return Ok(false);
        };
        result?;

        if let Some(node) = self.nodes.get_mut(id) {
            node.exec_version = Some(self.iteration);
            node.action_call = Some(call.clone());
        }
        self.guards.executed_action.insert(id.clone(), call);
        self.after_execute(id, param, &options)?;
        Ok(true)
    }

    /// Deliver an action to a node immediately, under the action guards
    pub fn action_do(
        &mut self,
        id: &NodeId,
        action: &str,
        param: &Value,
        options: &ExecOptions,
    ) -> Result<bool> {
        let actionable = self
            .nodes
            .get(id)
            .map(|n| n.is_actionable())
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        if !actionable {
            return Ok(false);
        }

        let mut options = options.clone();
        let call = match options.action_call.clone() {
            Some(call) => call,
            None => {
                let kind = if action.is_empty() { "action" } else { action };
                let call = self.next_call_id(id, kind);
                options.action_call = Some(call.clone());
                call
            }
        };

        if self.config.ensure_node_single_action && self.guards.actioning.get(id) == Some(&call) {
            log::debug!("Node {} is already handling call {}", id, call);
            return Ok(false);
        }
        if self.config.ensure_unique_execution_and_action_call
            && self.guards.executed_action.get(id) == Some(&call)
        {
            log::debug!("Node {} already completed call {}", id, call);
            return Ok(false);
        }

        let previous = self.guards.actioning.insert(id.clone(), call.clone());
        let outcome = self.with_behavior(id, |behavior, ctx| match behavior.as_actionable() {
            Some(actionable) => actionable.on_action(ctx, action, param, &options),
            None => Ok(()),
        });
        match previous {
            Some(previous) => self.guards.actioning.insert(id.clone(), previous),
            None => self.guards.actioning.remove(id),
        };

        let Some(result) = outcome else {
            log::debug!("Node {} is busy, skipping action '{}'", id, action);
            return Ok(false);
        };
        result?;

        if let Some(node) = self.nodes.get_mut(id) {
            node.action_call = Some(call.clone());
        }
        self.guards.executed_action.insert(id.clone(), call);
        self.after_execute(id, param, &options)?;
        Ok(true)
    }

    fn after_execute(&mut self, id: &NodeId, param: &Value, options: &ExecOptions) -> Result<()> {
        let slot = self
            .nodes
            .get(id)
            .and_then(|n| n.find_output_slot(ON_EXECUTED_OUTPUT));
        match slot {
            Some(slot) => self.trigger_slot(id, slot, param, None, options),
            None => Ok(()),
        }
    }

    /// Deliver actions queued before the current pass
    ///
    /// Actions queued during this pass stay for the next one.
    pub fn execute_pending_actions(&mut self, id: &NodeId) -> Result<()> {
        let pass = self.pass;
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(());
        };
        if node.waiting_actions.is_empty() {
            return Ok(());
        }
        let (due, later): (Vec<PendingAction>, Vec<PendingAction>) = std::mem::take(&mut node.waiting_actions)
            .into_iter()
            .partition(|p| p.pass < pass);
        node.waiting_actions = later;

        for pending in due {
            let outcome = self.with_behavior(id, |behavior, ctx| match behavior.as_actionable() {
                Some(actionable) => {
                    actionable.on_action(ctx, &pending.action, &pending.param, &pending.options)
                }
                None => Ok(()),
            });
            match outcome {
                Some(result) => result?,
                None => {
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.waiting_actions.push(pending);
                    }
                }
            }
        }
        Ok(())
    }

    /// Fire event outputs named `event`, or every event output for `None`
    pub fn trigger(
        &mut self,
        id: &NodeId,
        event: Option<&str>,
        param: &Value,
        options: &ExecOptions,
    ) -> Result<()> {
        let Some(node) = self.nodes.get(id) else {
            return Err(GraphError::NodeNotFound(id.clone()));
        };
        let slots: Vec<usize> = node
            .outputs()
            .iter()
            .enumerate()
            .filter(|(_, o)| o.slot_type.is_event() && event.map_or(true, |e| o.name == e))
            .map(|(slot, _)| slot)
            .collect();

        self.last_trigger_time = Some(self.now());
        for slot in slots {
            self.trigger_slot(id, slot, param, None, options)?;
        }
        Ok(())
    }

    /// Fire one output, optionally through a single link
    ///
    /// Trigger-mode targets execute at once. Actionable targets get the
    /// action named after their input slot: queued for the next pass when
    /// deferred actions are on and the target is executable, delivered
    /// immediately otherwise. All targets share one call id.
    pub fn trigger_slot(
        &mut self,
        id: &NodeId,
        slot: usize,
        param: &Value,
        link_filter: Option<&LinkId>,
        options: &ExecOptions,
    ) -> Result<()> {
        if self.ancestors_call {
            return Ok(());
        }
        let Some(link_ids) = self
            .nodes
            .get(id)
            .and_then(|n| n.output(slot))
            .map(|o| o.links.clone())
        else {
            return Ok(());
        };
        if link_ids.is_empty() {
            return Ok(());
        }

        let now = self.now();
        self.last_trigger_time = Some(now);
        let mut call = options.action_call.clone();

        for link_id in link_ids {
            if link_filter.is_some_and(|filter| filter != &link_id) {
                continue;
            }
            let Some(link) = self.links.get_mut(&link_id) else {
                continue;
            };
            link.last_trigger_time = Some(now);
            let (target_id, target_slot) = (link.target_id.clone(), link.target_slot);

            let Some(target) = self.nodes.get(&target_id) else {
                continue;
            };
            let mode = target.mode();
            let executable = target.is_executable();
            let actionable = target.is_actionable();
            let action = target
                .input(target_slot)
                .map(|s| s.name.clone())
                .unwrap_or_default();

            let kind = if mode == NodeMode::OnTrigger {
                "trigg"
            } else if actionable {
                "act"
            } else {
                continue;
            };
            let call_id = match &call {
                Some(call) => call.clone(),
                None => {
                    let fresh = self.next_call_id(id, kind);
                    call = Some(fresh.clone());
                    fresh
                }
            };
            let target_options = ExecOptions {
                action_call: Some(call_id.clone()),
                target_slot: Some(target_slot),
                link_id: Some(link_id.clone()),
            };

            if mode == NodeMode::OnTrigger {
                if self.config.refresh_ancestors_on_triggers {
                    self.refresh_ancestors(&target_id, Some(call_id))?;
                }
                if executable {
                    self.do_execute(&target_id, param, &target_options)?;
                }
            } else {
                if self.config.refresh_ancestors_on_actions {
                    self.refresh_ancestors(&target_id, Some(call_id))?;
                }
                if self.config.use_deferred_actions && executable {
                    let pass = self.pass;
                    if let Some(target) = self.nodes.get_mut(&target_id) {
                        target.waiting_actions.push(PendingAction {
                            action,
                            param: param.clone(),
                            options: target_options,
                            pass,
                        });
                    }
                } else {
                    self.action_do(&target_id, &action, param, &target_options)?;
                }
            }
        }
        Ok(())
    }

    /// Reset the trigger timestamp of an output's links
    pub fn clear_triggered_slot(&mut self, id: &NodeId, slot: usize, link_filter: Option<&LinkId>) {
        let Some(output) = self.nodes.get(id).and_then(|n| n.output(slot)) else {
            return;
        };
        for link_id in &output.links {
            if link_filter.is_some_and(|filter| filter != link_id) {
                continue;
            }
            if let Some(link) = self.links.get_mut(link_id) {
                link.last_trigger_time = None;
            }
        }
    }

    /// Reset the trigger timestamp of every link
    pub fn clear_triggered_slots(&mut self) {
        for link in self.links.values_mut() {
            link.last_trigger_time = None;
        }
    }
}

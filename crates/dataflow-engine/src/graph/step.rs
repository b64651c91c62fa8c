//! Run state and the step loop

use serde_json::Value;

use super::Graph;
use crate::behavior::ExecOptions;
use crate::config::ErrorPolicy;
use crate::error::Result;
use crate::events::GraphEvent;
use crate::types::{GraphStatus, NodeId, NodeMode};

/// Lifecycle hook delivered by [`Graph::send_event_to_all_nodes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
}

impl Graph {
    /// Enter the running state and notify `Always` nodes
    pub fn start(&mut self) {
        if self.status == GraphStatus::Running {
            return;
        }
        self.status = GraphStatus::Running;
        self.starttime = self.now();
        self.last_update_time = self.starttime;
        self.globaltime = 0.0;

        log::info!("Graph started with {} node(s)", self.nodes.len());
        self.emit(GraphEvent::Started);
        self.send_event_to_all_nodes(Lifecycle::Start, NodeMode::Always);
    }

    /// Leave the running state and notify `Always` nodes
    ///
    /// A step already in progress runs to completion.
    pub fn stop(&mut self) {
        if self.status == GraphStatus::Stopped {
            return;
        }
        self.status = GraphStatus::Stopped;

        log::info!("Graph stopped after {} iteration(s)", self.iteration);
        self.emit(GraphEvent::Stopped);
        self.send_event_to_all_nodes(Lifecycle::Stop, NodeMode::Always);
    }

    /// Host clock entry point: one step while running
    pub fn tick(&mut self) -> Result<()> {
        if self.status != GraphStatus::Running {
            return Ok(());
        }
        let policy = self.config.error_policy;
        self.run_step(1, policy)
    }

    /// Run `n` passes over the executable nodes as one step
    ///
    /// With `n == 0` no node runs, but the step is still closed: timings
    /// update, `iteration` advances and the guards reset.
    ///
    /// Each pass first drains the deferred actions of a node, then executes
    /// it if its mode is `Always`. Under [`ErrorPolicy::Contain`] a failure
    /// stops the graph and the step still completes; under
    /// [`ErrorPolicy::Strict`] the error is returned after the step is
    /// closed.
    pub fn run_step(&mut self, n: usize, policy: ErrorPolicy) -> Result<()> {
        let start = self.now();
        self.globaltime = start - self.starttime;

        let outcome = self.run_passes(n);

        let now = self.now();
        self.execution_time = now - start;
        self.globaltime += self.execution_time;
        self.elapsed_time = now - self.last_update_time;
        self.last_update_time = now;
        self.iteration += 1;
        self.guards.clear();

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                self.errors_in_execution = true;
                match policy {
                    ErrorPolicy::Strict => Err(e),
                    ErrorPolicy::Contain => {
                        log::error!("Error during execution: {}", e);
                        self.emit(GraphEvent::ExecutionFailed {
                            error: e.to_string(),
                        });
                        self.stop();
                        Ok(())
                    }
                }
            }
        }
    }

    fn run_passes(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.pass += 1;
            let nodes: Vec<NodeId> = self.nodes_executable.clone();
            for id in &nodes {
                if self.config.use_deferred_actions {
                    self.execute_pending_actions(id)?;
                }
                let always = self
                    .nodes
                    .get(id)
                    .is_some_and(|n| n.mode() == NodeMode::Always);
                if always {
                    self.do_execute(id, &Value::Null, &ExecOptions::default())?;
                }
            }
            self.fixedtime += self.config.fixed_time_lapse;
        }
        Ok(())
    }

    /// Call a lifecycle hook on every node in `mode`, in execution order
    pub fn send_event_to_all_nodes(&mut self, event: Lifecycle, mode: NodeMode) {
        let targets: Vec<NodeId> = self
            .nodes_in_order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.mode() == mode))
            .cloned()
            .collect();
        for id in targets {
            self.with_behavior(&id, |behavior, ctx| match event {
                Lifecycle::Start => behavior.on_start(ctx),
                Lifecycle::Stop => behavior.on_stop(ctx),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::EngineConfig;
    use crate::error::GraphError;
    use crate::events::VecEventSink;
    use crate::test_support::{recorder_graph, recorder_graph_with, Recorder};
    use crate::types::SlotType;

    #[test]
    fn test_step_runs_always_nodes_in_order() {
        let a = Recorder::number("a");
        let b = Recorder::number("b");
        let (mut graph, ids) = recorder_graph(&[b.clone(), a.clone()]);
        // a feeds b, so a runs first even though b was added first
        graph.connect(&ids[1], 0, &ids[0], 0).unwrap().unwrap();
        graph.node_mut(&ids[0]).unwrap().change_mode(NodeMode::Never);

        graph.run_step(1, ErrorPolicy::Strict).unwrap();
        assert_eq!(a.calls(), vec!["a:exec"]);
        assert!(b.calls().is_empty());
        assert_eq!(graph.iteration(), 1);

        graph.node_mut(&ids[0]).unwrap().change_mode(NodeMode::Always);
        graph.run_step(2, ErrorPolicy::Strict).unwrap();
        assert_eq!(a.calls().len(), 3);
        assert_eq!(b.calls().len(), 2);
        assert_eq!(graph.iteration(), 2);
        assert!((graph.fixed_time() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_zero_passes_runs_nothing() {
        let a = Recorder::number("a");
        let (mut graph, _) = recorder_graph(&[a.clone()]);
        graph.run_step(0, ErrorPolicy::Strict).unwrap();
        assert!(a.calls().is_empty());
        assert_eq!(graph.iteration(), 1);
        assert_eq!(graph.fixed_time(), 0.0);
    }

    #[test]
    fn test_data_flows_along_order() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a").emitting(json!(4)), Recorder::number("b")]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.run_step(1, ErrorPolicy::Strict).unwrap();
        assert_eq!(graph.input_data(&ids[1], 0), Some(json!(4)));
    }

    #[test]
    fn test_start_stop_and_tick() {
        let sink = Arc::new(VecEventSink::new());
        let recorder = Recorder::number("a");
        let (graph, _) = recorder_graph(&[recorder.clone()]);
        let mut graph = graph.with_event_sink(sink.clone());

        graph.tick().unwrap();
        assert_eq!(graph.iteration(), 0);

        graph.start();
        graph.start();
        assert!(graph.is_running());
        graph.tick().unwrap();
        graph.tick().unwrap();
        graph.stop();
        graph.stop();
        graph.tick().unwrap();

        assert_eq!(graph.iteration(), 2);
        assert_eq!(recorder.calls(), vec!["a:start", "a:exec", "a:exec", "a:stop"]);
        let events = sink.events();
        assert_eq!(events.iter().filter(|e| **e == GraphEvent::Started).count(), 1);
        assert_eq!(events.iter().filter(|e| **e == GraphEvent::Stopped).count(), 1);
    }

    #[test]
    fn test_contained_error_stops_graph() {
        let sink = Arc::new(VecEventSink::new());
        let (graph, _) = recorder_graph(&[Recorder::number("a").failing()]);
        let mut graph = graph.with_event_sink(sink.clone());

        graph.start();
        graph.tick().unwrap();
        assert!(graph.errors_in_execution());
        assert!(!graph.is_running());
        assert_eq!(graph.iteration(), 1);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, GraphEvent::ExecutionFailed { .. })));
    }

    #[test]
    fn test_strict_error_propagates() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a").failing()]);
        let result = graph.run_step(1, ErrorPolicy::Strict);
        match result {
            Err(GraphError::Execution { node, .. }) => assert_eq!(node, ids[0]),
            other => panic!("expected execution error, got {:?}", other),
        }
        assert!(graph.errors_in_execution());
        assert_eq!(graph.iteration(), 1);
    }

    #[test]
    fn test_deferred_action_waits_one_pass() {
        // a fires b's action every execution; b is executable so it queues
        let a = Recorder::number("a").firing_on_execute("fire");
        let b = Recorder::number("b");
        let (mut graph, ids) = recorder_graph(&[a, b.clone()]);
        let fire = graph.add_node_output(&ids[0], "fire", SlotType::Event).unwrap();
        let go = graph.add_node_input(&ids[1], "go", SlotType::ACTION).unwrap();
        graph.connect(&ids[0], fire, &ids[1], go).unwrap().unwrap();

        graph.run_step(1, ErrorPolicy::Strict).unwrap();
        assert_eq!(b.calls(), vec!["b:exec"]);
        assert_eq!(graph.node(&ids[1]).unwrap().pending_action_count(), 1);

        graph.run_step(1, ErrorPolicy::Strict).unwrap();
        assert_eq!(b.calls(), vec!["b:exec", "b:action:go", "b:exec"]);
        assert_eq!(graph.node(&ids[1]).unwrap().pending_action_count(), 1);
    }

    #[test]
    fn test_guards_reset_between_steps() {
        let mut config = EngineConfig::default();
        config.ensure_node_single_execution = true;
        let recorder = Recorder::number("a");
        let (mut graph, _) = recorder_graph_with(config, &[recorder.clone()]);
        graph.run_step(1, ErrorPolicy::Strict).unwrap();
        graph.run_step(1, ErrorPolicy::Strict).unwrap();
        assert_eq!(recorder.calls().len(), 2);
    }

    #[test]
    fn test_on_event_nodes_skip_polling() {
        let recorder = Recorder::number("a");
        let (mut graph, ids) = recorder_graph(&[recorder.clone()]);
        graph.node_mut(&ids[0]).unwrap().change_mode(NodeMode::OnEvent);
        graph.run_step(3, ErrorPolicy::Strict).unwrap();
        assert!(recorder.calls().is_empty());
    }
}

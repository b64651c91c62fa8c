//! Execution order and level layout

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use super::Graph;
use crate::node::TITLE_HEIGHT;
use crate::types::NodeId;

/// Direction of [`Graph::arrange`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// Levels become columns, left to right
    #[default]
    Horizontal,
    /// Levels become rows, top to bottom
    Vertical,
}

impl Graph {
    /// Topological order of the nodes, ties broken by priority
    ///
    /// Nodes caught in a cycle never become ready; they are appended in
    /// insertion order. Their relative order carries no meaning. With
    /// `set_level` every node also gets its column: sources are level 1 and
    /// any other node sits one past its deepest visited predecessor.
    pub fn compute_execution_order(&mut self, only_executable: bool, set_level: bool) -> Vec<NodeId> {
        let mut ready = VecDeque::new();
        let mut remaining: HashMap<NodeId, usize> = HashMap::new();
        let mut levels: HashMap<NodeId, u32> = HashMap::new();

        for id in &self.node_list {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if only_executable && !node.is_executable() {
                continue;
            }
            let linked = node.inputs().iter().filter(|s| s.link.is_some()).count();
            if linked == 0 {
                ready.push_back(id.clone());
                levels.insert(id.clone(), 1);
            } else {
                remaining.insert(id.clone(), linked);
                levels.insert(id.clone(), 0);
            }
        }

        let mut order = Vec::with_capacity(levels.len());
        let mut placed = HashSet::new();
        let mut visited_links = HashSet::new();

        while let Some(id) = ready.pop_front() {
            let source_level = levels.get(&id).copied().unwrap_or(0);
            placed.insert(id.clone());
            order.push(id.clone());

            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for output in node.outputs() {
                for link_id in &output.links {
                    let Some(link) = self.links.get(link_id) else {
                        continue;
                    };
                    if !visited_links.insert(link_id.clone()) {
                        continue;
                    }
                    let target = &link.target_id;
                    if !self.nodes.contains_key(target) {
                        continue;
                    }
                    if let Some(level) = levels.get_mut(target) {
                        if *level <= source_level {
                            *level = source_level + 1;
                        }
                    }
                    let now_ready = match remaining.get_mut(target) {
                        Some(count) => {
                            *count -= 1;
                            *count == 0
                        }
                        None => false,
                    };
                    if now_ready {
                        remaining.remove(target);
                        ready.push_back(target.clone());
                    }
                }
            }
        }

        if order.len() < levels.len() {
            log::debug!(
                "{} node(s) are part of a cycle and keep insertion order",
                levels.len() - order.len()
            );
            for id in &self.node_list {
                if levels.contains_key(id) && !placed.contains(id) {
                    order.push(id.clone());
                }
            }
        }

        // Stable: equal priorities keep their topological position
        order.sort_by_key(|id| self.nodes.get(id).map_or(0, |n| n.effective_priority()));

        for (position, id) in order.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.order = position;
                if set_level {
                    node.level = levels.get(id).copied().unwrap_or(0);
                }
            }
        }
        order
    }

    /// Recompute the cached order and its executable subset
    pub fn update_execution_order(&mut self) {
        self.nodes_in_order = self.compute_execution_order(false, false);
        self.nodes_executable = self
            .nodes_in_order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.is_executable()))
            .cloned()
            .collect();
    }

    /// Place nodes in columns (or rows) by level
    pub fn arrange(&mut self, margin: f64, layout: Layout) {
        let order = self.compute_execution_order(false, true);

        let mut columns: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
        for id in order {
            let level = self.nodes.get(&id).map_or(1, |n| n.level.max(1));
            columns.entry(level).or_default().push(id);
        }

        let (along, across) = match layout {
            Layout::Horizontal => (0, 1),
            Layout::Vertical => (1, 0),
        };
        let mut x = margin;
        for column in columns.values() {
            let mut max_size: f64 = 100.0;
            let mut y = margin + TITLE_HEIGHT;
            for id in column {
                let Some(node) = self.nodes.get_mut(id) else {
                    continue;
                };
                node.pos[along] = x;
                node.pos[across] = y;
                max_size = max_size.max(node.size[along]);
                y += node.size[across] + margin + TITLE_HEIGHT;
            }
            x += max_size + margin;
        }
        self.set_dirty_canvas(true, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{recorder_graph, Recorder};

    fn position(order: &[NodeId], id: &NodeId) -> usize {
        order.iter().position(|n| n == id).unwrap()
    }

    #[test]
    fn test_order_respects_links() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b"), Recorder::number("c")]);
        graph.add_node_input(&ids[2], "second", crate::types::SlotType::named("number")).unwrap();
        // c <- b <- a, c <- a
        graph.connect(&ids[1], 0, &ids[2], 0).unwrap().unwrap();
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.connect(&ids[0], 0, &ids[2], 1).unwrap().unwrap();

        let order = graph.nodes_in_order().to_vec();
        assert_eq!(order.len(), 3);
        for link in graph.links() {
            assert!(position(&order, &link.origin_id) < position(&order, &link.target_id));
        }
        for (i, id) in order.iter().enumerate() {
            assert_eq!(graph.node(id).unwrap().order(), i);
        }
    }

    #[test]
    fn test_cycle_keeps_every_node() {
        let (mut graph, ids) = recorder_graph(&[
            Recorder::number("a"),
            Recorder::number("b"),
            Recorder::number("c"),
            Recorder::number("d"),
        ]);
        graph.connect(&ids[1], 0, &ids[2], 0).unwrap().unwrap();
        graph.connect(&ids[2], 0, &ids[1], 0).unwrap().unwrap();
        graph.connect(&ids[0], 0, &ids[3], 0).unwrap().unwrap();

        let order = graph.nodes_in_order().to_vec();
        assert_eq!(order.len(), 4);
        assert_eq!(&order[..2], &[ids[0].clone(), ids[3].clone()]);
        assert!(order.contains(&ids[1]) && order.contains(&ids[2]));
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        let recorders = [Recorder::number("a"), Recorder::number("b"), Recorder::number("c")];
        let (mut first, _) = recorder_graph(&recorders);
        let (mut second, _) = recorder_graph(&recorders);
        assert_eq!(
            first.compute_execution_order(false, false),
            second.compute_execution_order(false, false)
        );
        assert_eq!(first.nodes_in_order(), second.nodes_in_order());
    }

    #[test]
    fn test_priority_sorts_ready_nodes() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b"), Recorder::number("c")]);
        graph.node_mut(&ids[2]).unwrap().priority = Some(-1);
        graph.node_mut(&ids[0]).unwrap().priority = Some(1);
        graph.update_execution_order();
        assert_eq!(
            graph.nodes_in_order(),
            &[ids[2].clone(), ids[1].clone(), ids[0].clone()]
        );
    }

    #[test]
    fn test_class_priority_wins() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b").with_class_priority(-5)]);
        graph.node_mut(&ids[1]).unwrap().priority = Some(10);
        graph.update_execution_order();
        assert_eq!(graph.nodes_in_order()[0], ids[1]);
    }

    #[test]
    fn test_executable_subset() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b").passive()]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        assert_eq!(graph.nodes_in_order().len(), 2);
        assert_eq!(graph.nodes_executable(), &[ids[0].clone()]);
    }

    #[test]
    fn test_arrange_by_level() {
        let (mut graph, ids) = recorder_graph(&[Recorder::number("a"), Recorder::number("b"), Recorder::number("c")]);
        graph.connect(&ids[0], 0, &ids[1], 0).unwrap().unwrap();
        graph.connect(&ids[1], 0, &ids[2], 0).unwrap().unwrap();

        graph.arrange(100.0, Layout::Horizontal);
        let levels: Vec<u32> = ids.iter().map(|id| graph.node(id).unwrap().level()).collect();
        assert_eq!(levels, vec![1, 2, 3]);

        let xs: Vec<f64> = ids.iter().map(|id| graph.node(id).unwrap().pos[0]).collect();
        assert_eq!(xs[0], 100.0);
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
        assert_eq!(graph.node(&ids[0]).unwrap().pos[1], 100.0 + TITLE_HEIGHT);

        graph.arrange(50.0, Layout::Vertical);
        let ys: Vec<f64> = ids.iter().map(|id| graph.node(id).unwrap().pos[1]).collect();
        assert!(ys[0] < ys[1] && ys[1] < ys[2]);
    }
}

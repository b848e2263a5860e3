//! Foreign-key dependency graph between requested tables

use petgraph::graph::NodeIndex;
use petgraph::{Directed, Direction, Graph};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::error::{UploadError, UploadResult};
use crate::models::TableRef;

/// Directed graph with an edge from each parent table to each child that
/// references it.
///
/// Node indices follow the order tables were added, which is the order the
/// caller requested them in; the load order uses it to break ties.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: Graph<TableRef, (), Directed>,
    nodes: HashMap<TableRef, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; adding a known table again has no effect
    pub fn add_table(&mut self, table: TableRef) -> NodeIndex {
        if let Some(index) = self.nodes.get(&table) {
            return *index;
        }
        let index = self.graph.add_node(table.clone());
        self.nodes.insert(table, index);
        index
    }

    /// Whether a table is part of the graph
    pub fn contains(&self, table: &TableRef) -> bool {
        self.nodes.contains_key(table)
    }

    /// Record that `child` references `parent`.
    ///
    /// Parents outside the graph and self references do not constrain the
    /// order and are ignored. Returns whether an edge was added.
    pub fn add_dependency(&mut self, child: &TableRef, parent: &TableRef) -> bool {
        if child == parent {
            debug!("Ignoring self reference on {}", child);
            return false;
        }
        let (Some(&child_index), Some(&parent_index)) =
            (self.nodes.get(child), self.nodes.get(parent))
        else {
            debug!("Ignoring external parent {} of {}", parent, child);
            return false;
        };
        if self.graph.contains_edge(parent_index, child_index) {
            return false;
        }
        self.graph.add_edge(parent_index, child_index, ());
        true
    }

    /// Tables in insertion order
    pub fn tables(&self) -> impl Iterator<Item = &TableRef> {
        self.graph.node_indices().map(|i| &self.graph[i])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct in-graph parents of a table, in insertion order
    pub fn parents_of(&self, table: &TableRef) -> Vec<TableRef> {
        self.neighbors(table, Direction::Incoming)
    }

    /// Direct in-graph children of a table, in insertion order
    pub fn children_of(&self, table: &TableRef) -> Vec<TableRef> {
        self.neighbors(table, Direction::Outgoing)
    }

    fn neighbors(&self, table: &TableRef, direction: Direction) -> Vec<TableRef> {
        let Some(&index) = self.nodes.get(table) else {
            return Vec::new();
        };
        let mut indices: Vec<NodeIndex> = self.graph.neighbors_directed(index, direction).collect();
        indices.sort();
        indices.into_iter().map(|i| self.graph[i].clone()).collect()
    }

    /// All transitive in-graph parents of a table, in insertion order
    pub fn ancestors_of(&self, table: &TableRef) -> Vec<TableRef> {
        let Some(&start) = self.nodes.get(table) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for parent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if parent != start && visited.insert(parent) {
                    stack.push(parent);
                }
            }
        }

        let mut ancestors: Vec<NodeIndex> = visited.into_iter().collect();
        ancestors.sort();
        ancestors.into_iter().map(|i| self.graph[i].clone()).collect()
    }

    /// Parents-first order (Kahn's algorithm).
    ///
    /// Tables without pending parents are released in insertion order, so
    /// independent tables keep the order they were requested in. Tables left
    /// over when no table can be released sit on a cycle or behind one and
    /// are reported in insertion order.
    pub fn load_order(&self) -> UploadResult<Vec<TableRef>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|i| {
                self.graph
                    .neighbors_directed(i, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|i| in_degree[i.index()] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(node) = queue.pop_front() {
            order.push(self.graph[node].clone());

            let mut children: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .collect();
            children.sort();
            for child in children {
                in_degree[child.index()] -= 1;
                if in_degree[child.index()] == 0 {
                    queue.push_back(child);
                }
            }
        }

        if order.len() != self.len() {
            let tables = self
                .graph
                .node_indices()
                .filter(|i| in_degree[i.index()] > 0)
                .map(|i| self.graph[i].clone())
                .collect();
            return Err(UploadError::CyclicDependency { tables });
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TableRef {
        TableRef::new("model_draft", name)
    }

    fn graph(tables: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for table in tables {
            graph.add_table(t(table));
        }
        for (child, parent) in edges {
            graph.add_dependency(&t(child), &t(parent));
        }
        graph
    }

    #[test]
    fn test_parents_come_first() {
        let graph = graph(&["child", "parent"], &[("child", "parent")]);
        assert_eq!(graph.load_order().unwrap(), vec![t("parent"), t("child")]);
    }

    #[test]
    fn test_independent_tables_keep_input_order() {
        let graph = graph(
            &["c", "b", "a", "d"],
            &[("d", "a"), ("d", "c")],
        );
        assert_eq!(
            graph.load_order().unwrap(),
            vec![t("c"), t("b"), t("a"), t("d")]
        );
    }

    #[test]
    fn test_every_edge_respected() {
        let graph = graph(
            &["e", "d", "c", "b", "a"],
            &[("e", "d"), ("d", "c"), ("c", "b"), ("b", "a"), ("e", "a")],
        );
        let order = graph.load_order().unwrap();
        let position = |name: &str| order.iter().position(|x| *x == t(name)).unwrap();
        for (child, parent) in [("e", "d"), ("d", "c"), ("c", "b"), ("b", "a"), ("e", "a")] {
            assert!(position(parent) < position(child));
        }
    }

    #[test]
    fn test_cycle_names_stuck_tables() {
        let graph = graph(
            &["x", "a", "b", "c"],
            &[("a", "b"), ("b", "a"), ("c", "b")],
        );
        match graph.load_order() {
            Err(UploadError::CyclicDependency { tables }) => {
                assert_eq!(tables, vec![t("a"), t("b"), t("c")]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_ignores_self_and_external_references() {
        let mut graph = graph(&["a"], &[]);
        assert!(!graph.add_dependency(&t("a"), &t("a")));
        assert!(!graph.add_dependency(&t("a"), &t("outside")));
        assert_eq!(graph.load_order().unwrap(), vec![t("a")]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = graph(&["a", "b"], &[("b", "a")]);
        assert!(!graph.add_dependency(&t("b"), &t("a")));
        assert_eq!(graph.parents_of(&t("b")), vec![t("a")]);
        assert_eq!(graph.children_of(&t("a")), vec![t("b")]);
    }

    #[test]
    fn test_ancestors() {
        let graph = graph(
            &["a", "b", "c", "d"],
            &[("b", "a"), ("c", "b"), ("d", "c"), ("d", "a")],
        );
        assert_eq!(graph.ancestors_of(&t("d")), vec![t("a"), t("b"), t("c")]);
        assert!(graph.ancestors_of(&t("a")).is_empty());
        assert!(graph.ancestors_of(&t("unknown")).is_empty());
    }
}

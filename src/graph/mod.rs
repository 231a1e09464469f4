//! Pipeline structure: nodes, named-port edges, and topological ordering.
//!
//! Only cycles are structural errors. Dangling edge endpoints and unknown
//! node types surface when the graph is run.

pub mod exchange;

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CycleError, GraphError};
use crate::operation::Message;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub type_name: String,
    #[serde(default)]
    pub config: Message,
}

impl Node {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            config: Message::new(),
        }
    }

    pub fn with_config(mut self, config: Message) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

impl Edge {
    pub fn new(
        from_node: impl Into<String>,
        from_port: impl Into<String>,
        to_node: impl Into<String>,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_port: from_port.into(),
            to_node: to_node.into(),
            to_port: to_port.into(),
        }
    }
}

/// Nodes keep insertion order, which breaks ties in [`Graph::topo_sort`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: IndexMap<String, Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Edges are not checked against existing nodes here.
    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Kahn ordering; among ready nodes the earliest inserted goes first.
    /// Edges with an unknown endpoint take no part in the ordering.
    pub fn topo_sort(&self) -> Result<Vec<&Node>, CycleError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];

        for e in &self.edges {
            let (Some(from), Some(to)) = (
                self.nodes.get_index_of(&e.from_node),
                self.nodes.get_index_of(&e.to_node),
            ) else {
                continue;
            };
            children[from].push(to);
            indegree[to] += 1;
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &c in &children[i] {
                indegree[c] -= 1;
                if indegree[c] == 0 {
                    ready.insert(c);
                }
            }
        }

        if order.len() < n {
            let sorted: BTreeSet<usize> = order.iter().copied().collect();
            return Err(self.find_cycle(&children, &sorted));
        }

        Ok(order
            .into_iter()
            .filter_map(|i| self.nodes.get_index(i).map(|(_, node)| node))
            .collect())
    }

    /// DFS coloring over the nodes Kahn could not place; the first back edge
    /// found gives the cycle path.
    fn find_cycle(&self, children: &[Vec<usize>], sorted: &BTreeSet<usize>) -> CycleError {
        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Mark {
            Temp,
            Perm,
        }

        fn dfs(
            v: usize,
            children: &[Vec<usize>],
            marks: &mut HashMap<usize, Mark>,
            stack: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            match marks.get(&v) {
                Some(Mark::Perm) => return None,
                Some(Mark::Temp) => {
                    // v is on the current path => cycle from its first occurrence
                    let start = stack.iter().position(|&s| s == v).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(v);
                    return Some(cycle);
                }
                None => {}
            }

            marks.insert(v, Mark::Temp);
            stack.push(v);
            for &c in &children[v] {
                if let Some(cycle) = dfs(c, children, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(v, Mark::Perm);
            None
        }

        let id_of = |i: usize| {
            self.nodes
                .get_index(i)
                .map(|(id, _)| id.clone())
                .unwrap_or_default()
        };

        let mut marks: HashMap<usize, Mark> = sorted.iter().map(|&i| (i, Mark::Perm)).collect();
        let mut stack = Vec::new();
        for v in 0..self.nodes.len() {
            stack.clear();
            if let Some(cycle) = dfs(v, children, &mut marks, &mut stack) {
                return CycleError {
                    nodes: cycle.into_iter().map(id_of).collect(),
                };
            }
        }

        // Unreachable when Kahn left nodes over; report the remainder as is.
        CycleError {
            nodes: (0..self.nodes.len())
                .filter(|i| !sorted.contains(i))
                .map(id_of)
                .collect(),
        }
    }
}

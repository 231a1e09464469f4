//! Graph documents exchanged with the editor.
//!
//! JSON shape:
//! {
//!   "nodes": [
//!     { "id": "p", "type_name": "Prompt", "config": {...}, "x": 40, "y": 80 }
//!   ],
//!   "edges": [
//!     { "from_node": "p", "from_port": "prompt", "to_node": "l", "to_port": "prompt" }
//!   ]
//! }
//!
//! Positions belong to the editor; they are accepted and dropped here.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::Result;
use crate::operation::Message;

use super::{Edge, Graph, Node};

#[derive(Debug, Clone, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<RawNode>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Raw node shape as it appears in a graph document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    pub id: String,

    pub type_name: String,

    #[serde(default)]
    pub config: Message,

    #[serde(default)]
    pub x: Option<i64>,

    #[serde(default)]
    pub y: Option<i64>,
}

impl GraphDocument {
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("parse graph document")
    }

    /// Build the graph; fails only on duplicate node ids.
    pub fn into_graph(self) -> Result<Graph> {
        let mut graph = Graph::new();
        for raw in self.nodes {
            graph.add_node(Node {
                id: raw.id,
                type_name: raw.type_name,
                config: raw.config,
            })?;
        }
        for edge in self.edges {
            graph.add_edge(edge);
        }
        Ok(graph)
    }
}

pub fn load_graph(path: &Path) -> Result<Graph> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read graph file {}", path.display()))?;
    GraphDocument::from_json(&text)
        .and_then(GraphDocument::into_graph)
        .with_context(|| format!("load graph {}", path.display()))
}

//! Compile a graph against an assembled container and run it.
//!
//! Each `run` walks the whole graph in topological order. Values flow along
//! edges from a producer's output mapping to a named input port of the
//! consumer; see [`resolve_port`] for how a port is matched against the
//! producer's output.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::container::Container;
use crate::error::RunError;
use crate::graph::{Edge, Graph, Node};
use crate::operation::{Message, kind_of};

/// Node config key holding a static `port -> result key` mapping for the
/// node's outputs.
pub const PORT_MAP_KEY: &str = "port_map";

/// Per-node outputs of one run, in execution order.
pub type RunOutputs = IndexMap<String, Message>;

/// A graph bound to a container. Holds no state between runs; `run` takes
/// `&self` and may be called concurrently.
pub struct Runner {
    graph: Graph,
    container: Arc<Container>,
    /// consumer id -> indices into `graph.edges`
    incoming: HashMap<String, Vec<usize>>,
}

pub fn compile(graph: Graph, container: Arc<Container>) -> Runner {
    let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, e) in graph.edges.iter().enumerate() {
        incoming.entry(e.to_node.clone()).or_default().push(idx);
    }
    Runner {
        graph,
        container,
        incoming,
    }
}

impl Runner {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Execute every node once. Any failure aborts the run and discards the
    /// outputs computed so far.
    pub fn run(&self, payload: &Message) -> Result<RunOutputs, RunError> {
        let order = self.graph.topo_sort()?;
        self.check_edges()?;

        let mut outputs: RunOutputs = IndexMap::with_capacity(order.len());
        for node in order {
            let message = self.collect_input(node, payload, &outputs)?;
            let result = self.invoke(node, message)?;
            outputs.insert(node.id.clone(), result);
        }
        Ok(outputs)
    }

    fn check_edges(&self) -> Result<(), RunError> {
        for e in &self.graph.edges {
            let missing = [&e.from_node, &e.to_node]
                .into_iter()
                .find(|id| !self.graph.nodes.contains_key(id.as_str()));
            if let Some(missing) = missing {
                return Err(RunError::DanglingEdge {
                    from_node: e.from_node.clone(),
                    from_port: e.from_port.clone(),
                    to_node: e.to_node.clone(),
                    to_port: e.to_port.clone(),
                    missing: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Source nodes get a copy of the payload. Other nodes get one entry per
    /// incoming edge; a node with exactly one incoming edge also sees the rest
    /// of that producer's output.
    fn collect_input(
        &self,
        node: &Node,
        payload: &Message,
        outputs: &RunOutputs,
    ) -> Result<Message, RunError> {
        let edges: Vec<&Edge> = self
            .incoming
            .get(&node.id)
            .map(|idxs| idxs.iter().map(|&i| &self.graph.edges[i]).collect())
            .unwrap_or_default();

        if edges.is_empty() {
            return Ok(payload.clone());
        }

        let mut message = Message::new();
        let mut consumed: Option<String> = None;
        for e in &edges {
            // topo order guarantees the producer already ran
            let produced = outputs.get(&e.from_node).ok_or_else(|| unmappable(e, None))?;
            let producer = &self.graph.nodes[e.from_node.as_str()];
            let (key, value) = resolve_port(producer, produced, &e.from_port)
                .ok_or_else(|| unmappable(e, Some(produced)))?;
            message.insert(e.to_port.clone(), value.clone());
            consumed = Some(key.to_string());
        }

        if let [only] = edges.as_slice() {
            let produced = &outputs[only.from_node.as_str()];
            for (k, v) in produced {
                if consumed.as_deref() == Some(k.as_str()) {
                    continue;
                }
                message.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        Ok(message)
    }

    fn invoke(&self, node: &Node, message: Message) -> Result<Message, RunError> {
        let op = self
            .container
            .ops()
            .get(&node.type_name)
            .ok_or_else(|| RunError::UnknownOperation {
                node: node.id.clone(),
                type_name: node.type_name.clone(),
            })?;

        let _span = tracing::debug_span!("node", id = %node.id, op = %node.type_name).entered();
        tracing::debug!("invoke");
        let result = op
            .call(message, &node.config, &self.container)
            .map_err(|source| RunError::Operation {
                node: node.id.clone(),
                type_name: node.type_name.clone(),
                source,
            })?;

        match result {
            Value::Object(map) => Ok(map),
            other => Err(RunError::MalformedResult {
                node: node.id.clone(),
                type_name: node.type_name.clone(),
                found: kind_of(&other),
            }),
        }
    }
}

/// Find the value feeding `port` in a producer's output.
///
/// In order: an exact key match; the producer's declared `port_map`
/// translating the port to a key present in the output; the sole entry of a
/// single-entry output. Returns the output key used along with its value.
pub fn resolve_port<'a>(
    producer: &Node,
    produced: &'a Message,
    port: &str,
) -> Option<(&'a str, &'a Value)> {
    if let Some(hit) = lookup(produced, port) {
        return Some(hit);
    }

    let mapped = producer
        .config
        .get(PORT_MAP_KEY)
        .and_then(Value::as_object)
        .and_then(|map| map.get(port))
        .and_then(Value::as_str);
    if let Some(hit) = mapped.and_then(|key| lookup(produced, key)) {
        return Some(hit);
    }

    if produced.len() == 1 {
        return produced.iter().next().map(|(k, v)| (k.as_str(), v));
    }

    None
}

fn lookup<'a>(produced: &'a Message, key: &str) -> Option<(&'a str, &'a Value)> {
    produced.get_key_value(key).map(|(k, v)| (k.as_str(), v))
}

fn unmappable(e: &Edge, produced: Option<&Message>) -> RunError {
    RunError::UnmappableEdge {
        from_node: e.from_node.clone(),
        from_port: e.from_port.clone(),
        to_node: e.to_node.clone(),
        to_port: e.to_port.clone(),
        available: produced
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default(),
    }
}

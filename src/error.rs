//! Error taxonomy for assembly, graph structure and graph execution.
//!
//! Build-time errors abort the whole assembly and run-time errors abort the
//! whole run; neither ever carries a partial container or output map.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Raised once the resolver can make no further progress.
///
/// `missing` maps each still-pending chunk (by path) to the exact set of
/// capability keys it required but nobody made available. Chunks sharing a
/// name share one entry holding the union of their missing keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedDependencies {
    pub missing: BTreeMap<String, BTreeSet<String>>,
}

impl UnresolvedDependencies {
    /// Union of every missing key across all pending chunks.
    pub fn missing_keys(&self) -> BTreeSet<&str> {
        self.missing
            .values()
            .flat_map(|keys| keys.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for UnresolvedDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unresolved dependencies:")?;
        for (chunk, keys) in &self.missing {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            write!(f, " {} missing [{}];", chunk, keys.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for UnresolvedDependencies {}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("invalid chunk pattern {pattern:?}: {reason}")]
    Scan { pattern: String, reason: String },

    #[error("cannot load chunk {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("invalid chunk {}: {reason}", .path.display())]
    Validation { path: PathBuf, reason: String },

    #[error(transparent)]
    Unresolved(#[from] UnresolvedDependencies),

    #[error("chunk {} failed to build: {source:#}", .path.display())]
    Build {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("container key '{0}' is already taken")]
    KeyTaken(String),

    #[error("container key '{0}' is reserved")]
    Reserved(String),
}

/// The participating node ids of a cycle, in walk order, first id repeated
/// at the end (`a -> b -> a`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cycle detected: {}", .nodes.join(" -> "))]
pub struct CycleError {
    pub nodes: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// Failure reported by an operation or a tool.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("tool '{tool}' failed: {reason}")]
    Tool { tool: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot run: graph has cycles: {0}")]
    Cycle(#[from] CycleError),

    #[error("edge {from_node}.{from_port} -> {to_node}.{to_port} references unknown node '{missing}'")]
    DanglingEdge {
        from_node: String,
        from_port: String,
        to_node: String,
        to_port: String,
        missing: String,
    },

    #[error("unknown operation '{type_name}' for node '{node}'")]
    UnknownOperation { node: String, type_name: String },

    #[error("operation '{type_name}' (node '{node}') must return an object, got {found}")]
    MalformedResult {
        node: String,
        type_name: String,
        found: &'static str,
    },

    #[error("cannot map edge {from_node}.{from_port} -> {to_node}.{to_port}: producer output keys [{}]", .available.join(", "))]
    UnmappableEdge {
        from_node: String,
        from_port: String,
        to_node: String,
        to_port: String,
        available: Vec<String>,
    },

    #[error("operation '{type_name}' (node '{node}') failed: {source}")]
    Operation {
        node: String,
        type_name: String,
        #[source]
        source: OpError,
    },
}

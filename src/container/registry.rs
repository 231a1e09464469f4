//! Name-keyed registries for operations and tools.
//!
//! Chunks merge into the same registries during assembly. The first
//! registration of a name wins; later ones are dropped with a warning.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::OpError;
use crate::operation::{Message, Operation, Tool};

use super::Container;

/// Operation name -> operation. Several chunks merge into the same registry;
/// the first registration of a name wins.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    ops: BTreeMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    /// Register `op` under `name`. Returns false (and keeps the existing
    /// entry) if the name was already registered.
    pub fn register(&mut self, name: impl Into<String>, op: Arc<dyn Operation>) -> bool {
        let name = name.into();
        if self.ops.contains_key(&name) {
            tracing::warn!(operation = %name, "operation already registered, keeping first");
            return false;
        }
        tracing::debug!(operation = %name, "registered operation");
        self.ops.insert(name, op);
        true
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> bool
    where
        F: Fn(Message, &Message, &Container) -> Result<Value, OpError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Tool name -> tool, merged the same way as operations.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> bool {
        let name = name.into();
        if self.tools.contains_key(&name) {
            tracing::warn!(tool = %name, "tool already registered, keeping first");
            return false;
        }
        self.tools.insert(name, tool);
        true
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> bool
    where
        F: Fn(&Value) -> Result<Value, OpError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }
}

//! The shared, grow-only registry that chunks populate at build time and
//! operations read at run time.
//!
//! Three keys are always present: `config`, `ops` and `tools`. Everything else
//! is contributed by chunks, either as a plain JSON value or as a typed handle
//! (a client, a store). There is no removal API.
//!
//! After assembly the container is shared behind an `Arc` and never mutated
//! again; state that operations change at run time lives inside handles that
//! carry their own lock.

mod registry;

pub use registry::{OperationRegistry, ToolRegistry};

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ContainerError;
use crate::operation::Message;

pub const CONFIG_KEY: &str = "config";
pub const OPS_KEY: &str = "ops";
pub const TOOLS_KEY: &str = "tools";
pub const RESERVED_KEYS: [&str; 3] = [CONFIG_KEY, OPS_KEY, TOOLS_KEY];

/// A non-reserved container entry.
#[derive(Clone)]
pub enum Slot {
    Value(Value),
    Handle(Arc<dyn Any + Send + Sync>),
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Slot::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

pub struct Container {
    config: Message,
    ops: OperationRegistry,
    tools: ToolRegistry,
    slots: BTreeMap<String, Slot>,
}

impl Container {
    pub fn new(config: Message) -> Self {
        Self {
            config,
            ops: OperationRegistry::default(),
            tools: ToolRegistry::default(),
            slots: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Message {
        &self.config
    }

    pub fn ops(&self) -> &OperationRegistry {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut OperationRegistry {
        &mut self.ops
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    /// Every key currently present, reserved keys first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        RESERVED_KEYS
            .into_iter()
            .chain(self.slots.keys().map(String::as_str))
    }

    pub fn contains(&self, key: &str) -> bool {
        RESERVED_KEYS.contains(&key) || self.slots.contains_key(key)
    }

    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots.get(key)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.slots.get(key) {
            Some(Slot::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Typed access to a handle slot. `None` if absent or of another type.
    pub fn handle<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        match self.slots.get(key) {
            Some(Slot::Handle(h)) => Arc::clone(h).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) -> Result<(), ContainerError> {
        self.insert_slot(key.into(), Slot::Value(value))
    }

    pub fn insert_handle<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        handle: Arc<T>,
    ) -> Result<(), ContainerError> {
        self.insert_slot(key.into(), Slot::Handle(handle))
    }

    /// Return the handle stored under `key`, creating it first if the key is
    /// absent. Fails if the key holds something else.
    pub fn get_or_insert_handle<T, F>(&mut self, key: &str, make: F) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if !self.contains(key) {
            self.insert_handle(key, Arc::new(make()))?;
        }
        self.handle::<T>(key)
            .ok_or_else(|| ContainerError::KeyTaken(key.to_string()))
    }

    /// Fill `key` with `value` only if nothing holds it yet. Returns whether
    /// the value was inserted.
    pub fn provide_default(&mut self, key: &str, value: Value) -> bool {
        if self.contains(key) {
            return false;
        }
        self.slots.insert(key.to_string(), Slot::Value(value));
        true
    }

    fn insert_slot(&mut self, key: String, slot: Slot) -> Result<(), ContainerError> {
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(ContainerError::Reserved(key));
        }
        if self.slots.contains_key(&key) {
            return Err(ContainerError::KeyTaken(key));
        }
        self.slots.insert(key, slot);
        Ok(())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("config", &self.config)
            .field("ops", &self.ops.names().collect::<Vec<_>>())
            .field("tools", &self.tools.names().collect::<Vec<_>>())
            .field("slots", &self.slots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Counter(u32);

    #[test]
    fn reserved_keys_are_always_present() {
        let c = Container::new(Message::new());
        assert_eq!(c.keys().collect::<Vec<_>>(), vec!["config", "ops", "tools"]);
        assert!(c.contains("ops"));
    }

    #[test]
    fn inserts_never_overwrite() {
        let mut c = Container::new(Message::new());
        c.insert_value("A", json!(1)).unwrap();

        assert_eq!(
            c.insert_value("A", json!(2)),
            Err(ContainerError::KeyTaken("A".into()))
        );
        assert_eq!(
            c.insert_value("ops", json!({})),
            Err(ContainerError::Reserved("ops".into()))
        );
        assert!(!c.provide_default("A", Value::Null));
        assert_eq!(c.value("A"), Some(&json!(1)));
    }

    #[test]
    fn handles_are_typed() {
        let mut c = Container::new(Message::new());
        let first = c.get_or_insert_handle("counter", || Counter(3)).unwrap();
        let again = c.get_or_insert_handle("counter", || Counter(9)).unwrap();

        assert_eq!(first.0, 3);
        assert!(Arc::ptr_eq(&first, &again));
        assert!(c.handle::<String>("counter").is_none());
        assert!(c.value("counter").is_none());
    }
}

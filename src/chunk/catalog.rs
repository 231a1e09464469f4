use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builtin;
use crate::container::Container;
use crate::operation::Message;

/// A chunk's build entry point: wires things into the container, using the
/// chunk's `settings`.
pub type BuildFn = Arc<dyn Fn(&mut Container, &Message) -> anyhow::Result<()> + Send + Sync>;

/// Build entry points that chunk manifests may name in their `build` field.
#[derive(Clone, Default)]
pub struct BuildCatalog {
    entries: BTreeMap<String, BuildFn>,
}

impl BuildCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with every builder shipped in [`crate::builtin`].
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        builtin::register_all(&mut catalog);
        catalog
    }

    pub fn register<F>(&mut self, name: impl Into<String>, build: F) -> &mut Self
    where
        F: Fn(&mut Container, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(build));
        self
    }

    pub fn get(&self, name: &str) -> Option<BuildFn> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

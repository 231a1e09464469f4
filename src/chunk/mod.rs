//! Chunk discovery, loading, validation and dependency resolution.
//!
//! A chunk declares which capability keys it adds to the container
//! (`provides`), which keys must already be present (`requires`), and a build
//! entry point that does the actual wiring.

pub mod catalog;
pub mod manifest;
pub mod resolve;
pub mod scan;

pub use catalog::{BuildCatalog, BuildFn};
pub use manifest::{ChunkManifest, load, validate};
pub use resolve::resolve;
pub use scan::{PRIVATE_MARKER, is_private, scan};

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::container::Container;
use crate::operation::Message;

/// A validated chunk, ready to be ordered and built.
#[derive(Clone)]
pub struct ModuleDescriptor {
    pub path: PathBuf,
    pub provides: BTreeSet<String>,
    pub requires: BTreeSet<String>,
    pub build: BuildFn,
    pub settings: Message,
}

impl ModuleDescriptor {
    /// Descriptor for a chunk defined in code rather than on disk.
    pub fn new<F>(
        name: impl Into<PathBuf>,
        provides: &[&str],
        requires: &[&str],
        build: F,
    ) -> Self
    where
        F: Fn(&mut Container, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            path: name.into(),
            provides: provides.iter().map(|k| k.to_string()).collect(),
            requires: requires.iter().map(|k| k.to_string()).collect(),
            build: Arc::new(build),
            settings: Message::new(),
        }
    }

    pub fn with_settings(mut self, settings: Message) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("path", &self.path)
            .field("provides", &self.provides)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

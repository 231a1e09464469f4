//! Container assembly: discover chunks, order them, run their builders.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::chunk::{self, BuildCatalog, ModuleDescriptor};
use crate::container::Container;
use crate::error::AssembleError;
use crate::operation::Message;

pub const DEFAULT_CHUNKS_GLOB: &str = "chunks/*.json";

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub chunks_glob: String,
    /// Becomes the container's `config` mapping.
    pub config: Message,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            chunks_glob: DEFAULT_CHUNKS_GLOB.to_string(),
            config: Message::new(),
        }
    }
}

/// Load every public chunk matching `options.chunks_glob` and build a
/// container from them. Any error aborts the whole assembly.
pub fn assemble(options: &AssembleOptions, catalog: &BuildCatalog) -> Result<Container, AssembleError> {
    let descriptors = discover(&options.chunks_glob, catalog)?;
    assemble_descriptors(descriptors, options.config.clone())
}

/// Scan, load and validate chunk files, skipping private ones.
pub fn discover(pattern: &str, catalog: &BuildCatalog) -> Result<Vec<ModuleDescriptor>, AssembleError> {
    let files = chunk::scan(pattern).map_err(|e| AssembleError::Scan {
        pattern: pattern.to_string(),
        reason: format!("{e:#}"),
    })?;

    let mut descriptors = Vec::with_capacity(files.len());
    for path in files {
        if chunk::is_private(&path) {
            tracing::debug!(chunk = %path.display(), "skip private chunk");
            continue;
        }
        let manifest = chunk::load(&path)?;
        descriptors.push(chunk::validate(&path, &manifest, catalog)?);
    }
    Ok(descriptors)
}

/// Order `descriptors` against the reserved keys and build them in turn.
///
/// After each builder runs, any key it declared in `provides` but did not set
/// is filled with `null`.
pub fn assemble_descriptors(
    descriptors: Vec<ModuleDescriptor>,
    config: Message,
) -> Result<Container, AssembleError> {
    let mut container = Container::new(config);
    let initial: Vec<String> = container.keys().map(str::to_string).collect();
    let ordered = chunk::resolve(descriptors, initial)?;

    for d in &ordered {
        tracing::info!(chunk = %d.path.display(), "build chunk");
        (d.build)(&mut container, &d.settings).map_err(|source| AssembleError::Build {
            path: d.path.clone(),
            source,
        })?;

        for key in &d.provides {
            if container.provide_default(key, Value::Null) {
                tracing::warn!(
                    chunk = %d.path.display(),
                    key = %key,
                    "chunk did not set a key it provides, filled with null"
                );
            }
        }
    }

    Ok(container)
}

/// Resolved build order for the chunks matching `pattern`, without building.
pub fn plan(pattern: &str, catalog: &BuildCatalog) -> Result<Vec<PathBuf>, AssembleError> {
    let descriptors = discover(pattern, catalog)?;
    let container = Container::new(Message::new());
    let initial: Vec<String> = container.keys().map(str::to_string).collect();
    Ok(chunk::resolve(descriptors, initial)?
        .into_iter()
        .map(|d| d.path)
        .collect())
}

/// Assemble and freeze for sharing across runners.
pub fn assemble_shared(
    options: &AssembleOptions,
    catalog: &BuildCatalog,
) -> Result<Arc<Container>, AssembleError> {
    assemble(options, catalog).map(Arc::new)
}

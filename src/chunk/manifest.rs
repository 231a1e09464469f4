//! Chunk manifests on disk.
//!
//! JSON shape:
//! {
//!   "provides": ["ops", "memory"],   // optional, list of strings
//!   "requires": [],                  // optional, list of strings
//!   "build": "memory",               // required, names a catalog entry
//!   "settings": { ... }              // optional, passed to the builder
//! }
//!
//! `load` only reads and parses; `validate` checks the contract. The two are
//! kept apart so the error says which half failed.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;

use crate::error::AssembleError;
use crate::operation::{Message, kind_of};

use super::{BuildCatalog, ModuleDescriptor};

/// A parsed but not yet validated chunk file.
#[derive(Debug, Clone)]
pub struct ChunkManifest {
    pub raw: Value,
}

/// Read and parse a chunk file.
pub fn load(path: &Path) -> Result<ChunkManifest, AssembleError> {
    if !path.is_file() {
        return Err(AssembleError::Load {
            path: path.to_path_buf(),
            reason: "missing module file".to_string(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|e| AssembleError::Load {
        path: path.to_path_buf(),
        reason: format!("read failed: {e}"),
    })?;
    let raw = serde_json::from_str::<Value>(&text).map_err(|e| AssembleError::Load {
        path: path.to_path_buf(),
        reason: format!("parse failed: {e}"),
    })?;
    Ok(ChunkManifest { raw })
}

/// Check the chunk contract and bind its build entry point.
pub fn validate(
    path: &Path,
    manifest: &ChunkManifest,
    catalog: &BuildCatalog,
) -> Result<ModuleDescriptor, AssembleError> {
    let invalid = |reason: String| AssembleError::Validation {
        path: path.to_path_buf(),
        reason,
    };

    let Value::Object(doc) = &manifest.raw else {
        return Err(invalid(format!(
            "chunk must be a JSON object, got {}",
            kind_of(&manifest.raw)
        )));
    };

    let provides = string_set(doc.get("provides"), "provides").map_err(&invalid)?;
    let requires = string_set(doc.get("requires"), "requires").map_err(&invalid)?;

    let build = match doc.get("build") {
        Some(Value::String(name)) => catalog
            .get(name)
            .ok_or_else(|| invalid(format!("build entry point '{name}' is not registered")))?,
        Some(other) => {
            return Err(invalid(format!(
                "build must name a build entry point, got {}",
                kind_of(other)
            )));
        }
        None => return Err(invalid("build entry point is required".to_string())),
    };

    let settings = match doc.get("settings") {
        None | Some(Value::Null) => Message::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(invalid(format!(
                "settings must be an object, got {}",
                kind_of(other)
            )));
        }
    };

    Ok(ModuleDescriptor {
        path: path.to_path_buf(),
        provides,
        requires,
        build,
        settings,
    })
}

fn string_set(value: Option<&Value>, field: &str) -> Result<BTreeSet<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(format!("{field} items must be strings, got {}", kind_of(other))),
            })
            .collect(),
        Some(other) => Err(format!(
            "{field} must be a list of strings, got {}",
            kind_of(other)
        )),
    }
}

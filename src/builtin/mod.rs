//! Chunk builders shipped with the crate.
//!
//! Each builder is registered in the [`BuildCatalog`] under the name a chunk
//! manifest uses in its `build` field (see the manifests under `chunks/`).

pub mod cache;
pub mod divider;
pub mod llm;
pub mod logger;
pub mod memory;
pub mod prompt;
pub mod tools;
pub mod values;

use crate::chunk::BuildCatalog;

pub fn register_all(catalog: &mut BuildCatalog) {
    catalog
        .register("values", values::build)
        .register("prompt", prompt::build)
        .register("llm", llm::build)
        .register("memory", memory::build)
        .register("log", logger::build)
        .register("cache", cache::build)
        .register("divider", divider::build)
        .register("tools", tools::build);
}

#[cfg(test)]
pub(crate) fn object(value: serde_json::Value) -> crate::operation::Message {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use voide::assemble::{AssembleOptions, assemble, discover, plan};
use voide::error::AssembleError;
use voide::{BuildCatalog, Message};

fn write_chunk(dir: &Path, name: &str, manifest: Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(&manifest).unwrap()).unwrap();
}

fn options(dir: &Path) -> AssembleOptions {
    AssembleOptions {
        chunks_glob: format!("{}/*.json", dir.display()),
        config: Message::new(),
    }
}

#[test]
fn provider_is_built_before_consumer() {
    let tmp = tempfile::tempdir().unwrap();
    // file order puts the consumer first
    write_chunk(
        tmp.path(),
        "a_consumer.json",
        json!({"provides": ["B"], "requires": ["A"], "build": "values", "settings": {"B": 2}}),
    );
    write_chunk(
        tmp.path(),
        "b_provider.json",
        json!({"provides": ["A"], "build": "values", "settings": {"A": 1}}),
    );

    let catalog = BuildCatalog::with_builtins();
    let order = plan(&options(tmp.path()).chunks_glob, &catalog).unwrap();
    assert_eq!(
        order,
        vec![tmp.path().join("b_provider.json"), tmp.path().join("a_consumer.json")]
    );

    let container = assemble(&options(tmp.path()), &catalog).unwrap();
    assert_eq!(container.value("A"), Some(&json!(1)));
    assert_eq!(container.value("B"), Some(&json!(2)));
}

#[test]
fn unsatisfiable_requirement_names_the_key() {
    let tmp = tempfile::tempdir().unwrap();
    write_chunk(tmp.path(), "needs_x.json", json!({"requires": ["X"], "build": "values"}));

    let err = assemble(&options(tmp.path()), &BuildCatalog::with_builtins()).unwrap_err();
    assert!(err.to_string().contains("X"), "{err}");

    let unresolved = match err {
        AssembleError::Unresolved(u) => u,
        other => panic!("expected unresolved dependencies, got {other}"),
    };
    assert_eq!(unresolved.missing_keys().into_iter().collect::<Vec<_>>(), vec!["X"]);
}

#[test]
fn private_chunks_are_not_loaded() {
    let tmp = tempfile::tempdir().unwrap();
    write_chunk(tmp.path(), "public.json", json!({"provides": ["P"], "build": "values", "settings": {"P": true}}));
    fs::write(tmp.path().join("_draft.json"), "not even json").unwrap();

    let catalog = BuildCatalog::with_builtins();
    let found = discover(&options(tmp.path()).chunks_glob, &catalog).unwrap();
    assert_eq!(found.len(), 1);

    let container = assemble(&options(tmp.path()), &catalog).unwrap();
    assert_eq!(
        container.keys().collect::<Vec<_>>(),
        vec!["config", "ops", "tools", "P"]
    );
}

#[test]
fn unknown_build_entry_is_a_validation_error() {
    let tmp = tempfile::tempdir().unwrap();
    write_chunk(tmp.path(), "odd.json", json!({"build": "nope"}));

    let err = assemble(&options(tmp.path()), &BuildCatalog::with_builtins()).unwrap_err();
    assert!(matches!(err, AssembleError::Validation { .. }), "{err}");
}

#[test]
fn custom_builders_join_the_catalog() {
    let tmp = tempfile::tempdir().unwrap();
    write_chunk(tmp.path(), "greeter.json", json!({"provides": ["ops"], "build": "greeter"}));

    let mut catalog = BuildCatalog::new();
    catalog.register("greeter", |container, _settings| {
        container
            .ops_mut()
            .register_fn("Greet", |_message, _config, _container| Ok(json!({"hello": "world"})));
        Ok(())
    });

    let container = assemble(&options(tmp.path()), &catalog).unwrap();
    assert!(container.ops().contains("Greet"));
}

#[test]
fn shipped_chunks_register_every_builtin() {
    let catalog = BuildCatalog::with_builtins();
    let options = AssembleOptions {
        chunks_glob: concat!(env!("CARGO_MANIFEST_DIR"), "/chunks/*.json").to_string(),
        config: Message::new(),
    };
    let container = assemble(&options, &catalog).unwrap();

    assert_eq!(
        container.ops().names().collect::<Vec<_>>(),
        vec!["Cache", "DividerGate", "LLM", "Log", "Memory", "Prompt", "ToolCall"]
    );
    assert_eq!(
        container.keys().collect::<Vec<_>>(),
        vec!["config", "ops", "tools", "cache_store", "llm_client", "logs", "memory"]
    );
    assert!(container.tools().get("echo").is_some());
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use voide::assemble::{AssembleOptions, assemble_shared};
use voide::container::Container;
use voide::error::RunError;
use voide::graph::exchange::load_graph;
use voide::{BuildCatalog, Edge, Graph, Message, Node, compile};

fn obj(value: Value) -> Message {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// A container with a handful of scripted operations. `Count` bumps `calls`
/// and reports the running total.
fn scripted(calls: Arc<AtomicUsize>) -> Arc<Container> {
    let mut c = Container::new(Message::new());
    let ops = c.ops_mut();
    ops.register_fn("ConstA", |_m, _c, _ctr| Ok(json!({"a": 1})));
    ops.register_fn("ConstB", |_m, _c, _ctr| Ok(json!({"b": 2})));
    ops.register_fn("Result7", |_m, _c, _ctr| Ok(json!({"result": 7, "meta": "ok"})));
    ops.register_fn("Echo", |m, _c, _ctr| Ok(Value::Object(m)));
    ops.register_fn("Scalar", |_m, _c, _ctr| Ok(json!(42)));
    ops.register_fn("Count", move |_m, _c, _ctr| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"n": n}))
    });
    Arc::new(c)
}

fn graph(nodes: &[(&str, &str)], edges: &[(&str, &str, &str, &str)]) -> Graph {
    let mut g = Graph::new();
    for (id, ty) in nodes {
        g.add_node(Node::new(*id, *ty)).unwrap();
    }
    for (from, from_port, to, to_port) in edges {
        g.add_edge(Edge::new(*from, *from_port, *to, *to_port));
    }
    g
}

#[test]
fn two_incoming_edges_build_exactly_the_ports() {
    let g = graph(
        &[("x", "ConstA"), ("y", "ConstB"), ("join", "Echo")],
        &[("x", "a", "join", "a"), ("y", "b", "join", "b")],
    );
    let out = compile(g, scripted(Arc::default())).run(&Message::new()).unwrap();
    assert_eq!(Value::Object(out["join"].clone()), json!({"a": 1, "b": 2}));
}

#[test]
fn single_edge_carries_the_rest_of_the_producer_output() {
    let g = graph(
        &[("p", "Result7"), ("c", "Echo")],
        &[("p", "result", "c", "in")],
    );
    let out = compile(g, scripted(Arc::default())).run(&Message::new()).unwrap();
    assert_eq!(Value::Object(out["c"].clone()), json!({"in": 7, "meta": "ok"}));
}

#[test]
fn sources_receive_the_payload() {
    let g = graph(&[("first", "Echo"), ("second", "Echo")], &[]);
    let payload = obj(json!({"task": "t", "n": [1, 2]}));
    let out = compile(g, scripted(Arc::default())).run(&payload).unwrap();

    assert_eq!(out["first"], payload);
    assert_eq!(out["second"], payload);
    assert_eq!(out.keys().collect::<Vec<_>>(), vec!["first", "second"]);
}

#[test]
fn cycle_aborts_before_any_operation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let g = graph(
        &[("a", "Count"), ("b", "Count"), ("lone", "Count")],
        &[("a", "n", "b", "n"), ("b", "n", "a", "n")],
    );

    let err = compile(g, scripted(calls.clone())).run(&Message::new()).unwrap_err();
    let RunError::Cycle(cycle) = err else {
        panic!("expected a cycle error");
    };
    assert_eq!(cycle.nodes.first(), cycle.nodes.last());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_operation_is_reported() {
    let g = graph(&[("n", "Missing")], &[]);
    let err = compile(g, scripted(Arc::default())).run(&Message::new()).unwrap_err();
    assert!(
        matches!(&err, RunError::UnknownOperation { node, type_name } if node == "n" && type_name == "Missing"),
        "{err}"
    );
}

#[test]
fn non_object_result_is_rejected() {
    let g = graph(&[("s", "Scalar")], &[]);
    let err = compile(g, scripted(Arc::default())).run(&Message::new()).unwrap_err();
    assert!(
        matches!(&err, RunError::MalformedResult { found: "number", .. }),
        "{err}"
    );
}

#[test]
fn ambiguous_port_is_unmappable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let g = graph(
        &[("p", "Result7"), ("c", "Count")],
        &[("p", "missing", "c", "in")],
    );
    let err = compile(g, scripted(calls.clone())).run(&Message::new()).unwrap_err();
    match err {
        RunError::UnmappableEdge { available, .. } => assert_eq!(available, vec!["result", "meta"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn dangling_edge_fails_before_running() {
    let calls = Arc::new(AtomicUsize::new(0));
    let g = graph(&[("a", "Count")], &[("a", "n", "ghost", "n")]);
    let err = compile(g, scripted(calls.clone())).run(&Message::new()).unwrap_err();
    assert!(
        matches!(&err, RunError::DanglingEdge { missing, .. } if missing == "ghost"),
        "{err}"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn port_map_routes_named_ports() {
    let mut g = Graph::new();
    g.add_node(
        Node::new("p", "Result7").with_config(obj(json!({"port_map": {"value": "result"}}))),
    )
    .unwrap();
    g.add_node(Node::new("c", "Echo")).unwrap();
    g.add_edge(Edge::new("p", "value", "c", "v"));

    let out = compile(g, scripted(Arc::default())).run(&Message::new()).unwrap();
    assert_eq!(Value::Object(out["c"].clone()), json!({"v": 7, "meta": "ok"}));
}

#[test]
fn concurrent_runs_share_one_runner() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runner = compile(graph(&[("c", "Count")], &[]), scripted(calls.clone()));

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..25 {
                    runner.run(&Message::new()).unwrap();
                }
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 100);
}

#[test]
fn demo_graph_runs_against_shipped_chunks() {
    let options = AssembleOptions {
        chunks_glob: concat!(env!("CARGO_MANIFEST_DIR"), "/chunks/*.json").to_string(),
        config: Message::new(),
    };
    let container = assemble_shared(&options, &BuildCatalog::with_builtins()).unwrap();
    let graph = load_graph(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/summarize.json").as_ref()).unwrap();
    let runner = compile(graph, container);

    let out = runner.run(&obj(json!({"task": "the report"}))).unwrap();
    assert_eq!(
        Value::Object(out["llm"].clone()),
        json!({"completion": "ECHO: Summarize: the report"})
    );
    assert_eq!(
        Value::Object(out["remember"].clone()),
        json!({"stored": true, "key": "last"})
    );

    let memory = runner
        .container()
        .handle::<voide::builtin::memory::MemoryStore>("memory")
        .unwrap();
    assert_eq!(
        memory.get("last", None),
        Some(json!({"completion": "ECHO: Summarize: the report"}))
    );
}

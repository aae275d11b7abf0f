// crates/flownodes/tests/standard_flow_test.rs

use flowcore::{
    ComponentSpecifier, FlowDocument, FlowGraph, FlowLink, FlowNode, Sockets, ThreadEventKind,
    ThreadStatus, Value,
};
use flownodes::standard_registry;
use flowruntime::{FlowRuntime, RuntimeConfig};

fn spec(s: &str) -> ComponentSpecifier {
    s.parse().unwrap()
}

fn runtime() -> FlowRuntime {
    FlowRuntime::with_registry(standard_registry(), RuntimeConfig::default())
}

#[test]
fn registers_every_standard_component() {
    let registry = standard_registry();
    assert_eq!(
        registry.list(),
        vec![
            "core:catch",
            "core:input",
            "core:output",
            "debug:log",
            "http:request",
            "json:parse",
            "json:stringify",
            "math:add",
            "math:multiply",
            "time:delay",
        ]
    );
    assert!(registry.descriptors().iter().all(|d| d.available));
}

#[tokio::test]
async fn parse_then_compute_from_document() {
    let document = FlowDocument::from_json(
        r#"{
            "version": "1",
            "nodes": {
                "raw": { "component": "core:input", "name": "payload" },
                "parse": {
                    "component": "json:parse",
                    "json": { "$fromNode": { "id": "raw", "name": "value" } }
                },
                "sum": {
                    "component": "math:add",
                    "a": { "$fromNode": { "id": "parse", "name": "parsed", "path": "x" } },
                    "b": { "$fromNode": { "id": "parse", "name": "parsed", "path": "y" } }
                },
                "total": {
                    "component": "core:output",
                    "value": { "$fromNode": { "id": "sum", "name": "result" } }
                }
            }
        }"#,
    )
    .unwrap();
    let graph = document.into_graph().unwrap();

    let mut inputs = Sockets::new();
    inputs.insert("payload".into(), Value::from(r#"{"x": 2, "y": 40}"#));
    let outcome = runtime().run(&graph, inputs).await.unwrap();

    assert_eq!(outcome.status, ThreadStatus::Completed);
    assert_eq!(outcome.outputs.get("total"), Some(&Value::Number(42.0)));
}

#[tokio::test]
async fn input_default_is_used_without_initial_value() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("in", spec("core:input")).with_input("default", Value::from("hi")))
        .unwrap();
    graph.add_node(FlowNode::new("log", spec("debug:log"))).unwrap();
    graph.add_node(FlowNode::new("out", spec("core:output"))).unwrap();
    graph
        .create_link(FlowLink::new("in", "value", "log", "message"))
        .unwrap();
    graph
        .create_link(FlowLink::new("log", "message", "out", "value"))
        .unwrap();

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let outcome = thread.run(Sockets::new()).await.unwrap();
    assert_eq!(outcome.outputs.get("out"), Some(&Value::from("hi")));

    let mut traces = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event.kind, ThreadEventKind::NodeTrace { .. }) {
            traces += 1;
        }
    }
    assert!(traces >= 1);
}

#[tokio::test]
async fn catch_recovers_a_failed_parse() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("parse", spec("json:parse")).with_input("json", Value::from("{")))
        .unwrap();
    graph
        .add_node(FlowNode::new("catch", spec("core:catch")).with_input("fallback", Value::from(0i64)))
        .unwrap();
    graph
        .add_node(FlowNode::new("out", spec("core:output")).with_name("result"))
        .unwrap();
    graph
        .create_link(FlowLink::new("parse", "parsed", "catch", "value"))
        .unwrap();
    graph
        .create_link(FlowLink::new("catch", "value", "out", "value"))
        .unwrap();

    let outcome = runtime().run(&graph, Sockets::new()).await.unwrap();
    assert_eq!(outcome.status, ThreadStatus::Completed);
    assert_eq!(outcome.outputs.get("result"), Some(&Value::Number(0.0)));
    assert!(outcome.errors.contains_key("parse"));
}

#[tokio::test]
async fn abort_interrupts_a_delay() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("wait", spec("time:delay")).with_input("delay_ms", Value::Number(60_000.0)))
        .unwrap();

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let handle = thread.start(Sockets::new()).unwrap();
    loop {
        let event = rx.recv().await.unwrap();
        if matches!(event.kind, ThreadEventKind::NodeStart { .. }) {
            break;
        }
    }
    thread.abort();
    let outcome = handle.await.unwrap();
    assert_eq!(outcome.status, ThreadStatus::Aborted);
}

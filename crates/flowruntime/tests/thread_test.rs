// crates/flowruntime/tests/thread_test.rs

use async_trait::async_trait;
use flowcore::{
    Component, ComponentRole, ComponentSpecifier, FlowGraph, FlowLink, FlowNode, InputSchema,
    NodeError, NodeOutput, Process, ProcessContext, Reference, ReferenceKind, SocketSchema,
    Sockets, ThreadEvent, ThreadEventKind, ThreadStatus, Type, Value,
};
use flowruntime::{
    ComponentRegistry, FlowRuntime, NodeRunState, ReferenceResolver, RuntimeConfig,
    StaticReferenceResolver, ThreadError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn spec(s: &str) -> ComponentSpecifier {
    s.parse().unwrap()
}

struct Multiply;

#[async_trait]
impl Process for Multiply {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let a = ctx.require_input("a")?.as_f64().unwrap_or_default();
        let b = ctx.input_or("b", Value::Number(1.0)).as_f64().unwrap_or(1.0);
        Ok(NodeOutput::new().with_output("result", a * b))
    }
}

/// Passes its `value` input through after an optional delay.
struct Relay;

#[async_trait]
impl Process for Relay {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        if let Some(ms) = ctx.inputs.get("delay").and_then(Value::as_f64) {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        }
        Ok(NodeOutput::new().with_output("value", ctx.input_or("value", Value::Null)))
    }
}

struct Fail;

#[async_trait]
impl Process for Fail {
    async fn process(&self, _ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::process("boom"))
    }
}

struct Panic;

#[async_trait]
impl Process for Panic {
    async fn process(&self, _ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        panic!("kaboom")
    }
}

struct WaitForAbort;

#[async_trait]
impl Process for WaitForAbort {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        ctx.trace.info("waiting");
        ctx.signal.cancelled().await;
        Err(NodeError::Cancelled)
    }
}

struct Catch;

#[async_trait]
impl Process for Catch {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .errors
            .values()
            .next()
            .map(|e| e.to_string())
            .unwrap_or_default();
        Ok(NodeOutput::new().with_output("error", message))
    }
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register(
        Component::boundary(spec("core:input"), ComponentRole::Input)
            .with_inputs(InputSchema::new([SocketSchema::new("name", Type::String)])),
    );
    registry.register(Component::boundary(spec("core:output"), ComponentRole::Output));
    registry.register(Component::new(spec("math:multiply"), Multiply).with_inputs(
        InputSchema::new([
            SocketSchema::new("a", Type::Number).required(),
            SocketSchema::new("b", Type::Number).with_default(1.0),
        ]),
    ));
    registry.register(Component::new(spec("test:relay"), Relay));
    registry.register(Component::new(spec("test:fail"), Fail));
    registry.register(Component::new(spec("test:panic"), Panic));
    registry.register(Component::new(spec("test:wait"), WaitForAbort));
    registry.register(
        Component::new(spec("core:catch"), Catch).with_role(ComponentRole::ErrorHandler),
    );
    registry
}

fn runtime() -> FlowRuntime {
    FlowRuntime::with_registry(registry(), RuntimeConfig::default())
}

fn link(graph: &mut FlowGraph, from: &str, socket: &str, to: &str, input: &str) {
    graph
        .create_link(FlowLink::new(from, socket, to, input))
        .unwrap();
}

fn linear_graph() -> FlowGraph {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("in", spec("core:input")).with_name("x"))
        .unwrap();
    graph
        .add_node(FlowNode::new("double", spec("math:multiply")).with_input("b", Value::Number(2.0)))
        .unwrap();
    graph
        .add_node(FlowNode::new("out", spec("core:output")).with_name("y"))
        .unwrap();
    link(&mut graph, "in", "value", "double", "a");
    link(&mut graph, "double", "result", "out", "value");
    graph
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<ThreadEvent>) -> Vec<ThreadEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let last = matches!(
            event.kind,
            ThreadEventKind::End { .. } | ThreadEventKind::Abort
        );
        events.push(event);
        if last {
            break;
        }
    }
    events
}

fn label(kind: &ThreadEventKind) -> String {
    match kind {
        ThreadEventKind::Start { .. } => "start".into(),
        ThreadEventKind::Input { name, .. } => format!("input:{name}"),
        ThreadEventKind::Output { name, .. } => format!("output:{name}"),
        ThreadEventKind::NodeStart { node_id, .. } => format!("nodeStart:{node_id}"),
        ThreadEventKind::NodeTrace { node_id, .. } => format!("nodeTrace:{node_id}"),
        ThreadEventKind::NodeError { node_id, .. } => format!("nodeError:{node_id}"),
        ThreadEventKind::NodeEnd { node_id, .. } => format!("nodeEnd:{node_id}"),
        ThreadEventKind::Abort => "abort".into(),
        ThreadEventKind::Error { .. } => "error".into(),
        ThreadEventKind::End { status, .. } => format!("end:{status}"),
    }
}

fn labels(events: &[ThreadEvent]) -> Vec<String> {
    events.iter().map(|e| label(&e.kind)).collect()
}

fn position(labels: &[String], wanted: &str) -> usize {
    labels
        .iter()
        .position(|l| l == wanted)
        .unwrap_or_else(|| panic!("missing {wanted} in {labels:?}"))
}

fn inputs(pairs: &[(&str, Value)]) -> Sockets {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn linear_flow_emits_events_in_order() {
    let thread = runtime().create_thread(&linear_graph()).await.unwrap();
    let mut rx = thread.subscribe();

    let outcome = thread
        .run(inputs(&[("x", Value::Number(3.0))]))
        .await
        .unwrap();
    let events = collect(&mut rx).await;

    assert_eq!(
        labels(&events),
        vec![
            "start",
            "nodeStart:double",
            "nodeEnd:double",
            "output:y",
            "end:completed"
        ]
    );
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);

    match &events[2].kind {
        ThreadEventKind::NodeEnd { input, output, .. } => {
            assert_eq!(input.get("a"), Some(&Value::Number(3.0)));
            assert_eq!(output.get("result"), Some(&Value::Number(6.0)));
        }
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(outcome.status, ThreadStatus::Completed);
    assert_eq!(outcome.outputs.get("y"), Some(&Value::Number(6.0)));
    assert_eq!(thread.status(), ThreadStatus::Completed);
    assert_eq!(thread.outcome(), Some(outcome));
}

#[tokio::test]
async fn diamond_respects_dependencies() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("a", spec("test:relay")).with_input("value", Value::Number(1.0)))
        .unwrap();
    graph
        .add_node(FlowNode::new("b", spec("test:relay")).with_input("delay", Value::Number(20.0)))
        .unwrap();
    graph.add_node(FlowNode::new("c", spec("test:relay"))).unwrap();
    graph.add_node(FlowNode::new("d", spec("math:multiply"))).unwrap();
    link(&mut graph, "a", "value", "b", "value");
    link(&mut graph, "a", "value", "c", "value");
    link(&mut graph, "b", "value", "d", "a");
    link(&mut graph, "c", "value", "d", "b");

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let outcome = thread.run(Sockets::new()).await.unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert!(position(&labels, "nodeEnd:a") < position(&labels, "nodeStart:b"));
    assert!(position(&labels, "nodeEnd:a") < position(&labels, "nodeStart:c"));
    assert!(position(&labels, "nodeEnd:b") < position(&labels, "nodeStart:d"));
    assert!(position(&labels, "nodeEnd:c") < position(&labels, "nodeStart:d"));
    // b and c run side by side; the slower b finishes last.
    assert!(position(&labels, "nodeStart:b") < position(&labels, "nodeEnd:c"));
    assert_eq!(outcome.status, ThreadStatus::Completed);
}

#[tokio::test]
async fn unavailable_component_fails_only_its_branch() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("ghost", spec("missing:thing"))).unwrap();
    graph
        .add_node(FlowNode::new("ok", spec("test:relay")).with_input("value", Value::from("fine")))
        .unwrap();
    graph
        .add_node(FlowNode::new("lost", spec("core:output")))
        .unwrap();
    graph
        .add_node(FlowNode::new("kept", spec("core:output")))
        .unwrap();
    link(&mut graph, "ghost", "value", "lost", "value");
    link(&mut graph, "ok", "value", "kept", "value");

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let outcome = thread.run(Sockets::new()).await.unwrap();
    let events = collect(&mut rx).await;
    let labels = labels(&events);

    assert!(position(&labels, "nodeStart:ghost") < position(&labels, "nodeError:ghost"));
    assert!(labels.contains(&"nodeEnd:ok".to_string()));
    assert!(labels.contains(&"output:kept".to_string()));
    assert!(!labels.contains(&"output:lost".to_string()));

    let error = events
        .iter()
        .find_map(|e| match &e.kind {
            ThreadEventKind::NodeError { error, .. } => Some(error.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        error,
        NodeError::ComponentUnavailable {
            component: "missing:thing".into()
        }
    );
    assert_eq!(outcome.status, ThreadStatus::Failed);
    assert_eq!(outcome.outputs.get("kept"), Some(&Value::from("fine")));
}

#[tokio::test]
async fn missing_reference_fails_node_and_starves_dependents() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(
            FlowNode::new("a", spec("test:relay"))
                .with_input("value", Reference::variable("missing")),
        )
        .unwrap();
    graph.add_node(FlowNode::new("b", spec("test:relay"))).unwrap();
    link(&mut graph, "a", "value", "b", "value");

    let runtime = runtime().with_references(StaticReferenceResolver::new());
    let thread = runtime.create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let outcome = thread.run(Sockets::new()).await.unwrap();
    let events = collect(&mut rx).await;

    assert_eq!(
        labels(&events),
        vec!["start", "nodeStart:a", "nodeError:a", "end:completed"]
    );
    assert_eq!(
        outcome.errors.get("a"),
        Some(&NodeError::ReferenceNotFound {
            kind: ReferenceKind::Variable,
            name: "missing".into()
        })
    );
    assert_eq!(
        outcome.errors.get("b"),
        Some(&NodeError::UpstreamFailed {
            node_id: "a".into()
        })
    );
}

struct CountingResolver {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ReferenceResolver for CountingResolver {
    async fn resolve(&self, reference: &Reference) -> Option<Result<Value, NodeError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match reference {
            Reference::FromVariable { name } if name == "factor" => Some(Ok(Value::Number(4.0))),
            _ => None,
        }
    }
}

#[tokio::test]
async fn references_resolve_once_per_run() {
    let mut graph = FlowGraph::new();
    for id in ["m1", "m2"] {
        graph
            .add_node(
                FlowNode::new(id, spec("math:multiply"))
                    .with_input("a", Value::Number(2.0))
                    .with_input("b", Reference::variable("factor")),
            )
            .unwrap();
    }
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime().with_references(CountingResolver {
        calls: calls.clone(),
    });
    let thread = runtime.create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    thread.run(Sockets::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let results: Vec<Value> = collect(&mut rx)
        .await
        .into_iter()
        .filter_map(|e| match e.kind {
            ThreadEventKind::NodeEnd { mut output, .. } => output.remove("result"),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec![Value::Number(8.0), Value::Number(8.0)]);
}

#[tokio::test]
async fn secrets_resolve_to_cipher_text() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(
            FlowNode::new("token", spec("test:relay"))
                .with_input("value", Reference::secret("api-key")),
        )
        .unwrap();
    let runtime = runtime()
        .with_references(StaticReferenceResolver::new().with_secret("api-key", "c1pher"));
    let thread = runtime.create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    thread.run(Sockets::new()).await.unwrap();

    let output = collect(&mut rx)
        .await
        .into_iter()
        .find_map(|e| match e.kind {
            ThreadEventKind::NodeEnd { output, .. } => Some(output),
            _ => None,
        })
        .unwrap();
    assert_eq!(output.get("value"), Some(&Value::from("c1pher")));
}

#[tokio::test]
async fn cyclic_graph_is_rejected() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("a", spec("test:relay"))).unwrap();
    graph.add_node(FlowNode::new("b", spec("test:relay"))).unwrap();
    link(&mut graph, "a", "value", "b", "value");
    link(&mut graph, "b", "value", "a", "value");

    let err = runtime().create_thread(&graph).await.err().unwrap();
    assert!(matches!(err, ThreadError::CyclicGraph { .. }));
}

#[tokio::test]
async fn abort_right_after_start_runs_nothing() {
    let thread = runtime().create_thread(&linear_graph()).await.unwrap();
    let mut rx = thread.subscribe();

    let handle = thread.start(inputs(&[("x", Value::Number(1.0))])).unwrap();
    assert!(thread.abort());
    let outcome = handle.await.unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert_eq!(labels, vec!["start", "abort"]);
    assert_eq!(outcome.status, ThreadStatus::Aborted);
    assert_eq!(thread.finished().await, ThreadStatus::Aborted);
}

#[tokio::test]
async fn abort_cancels_running_nodes() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("wait", spec("test:wait"))).unwrap();
    graph.add_node(FlowNode::new("after", spec("test:relay"))).unwrap();
    link(&mut graph, "wait", "value", "after", "value");

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let handle = thread.start(Sockets::new()).unwrap();

    loop {
        let event = rx.recv().await.unwrap();
        if matches!(event.kind, ThreadEventKind::NodeTrace { .. }) {
            break;
        }
    }
    assert!(thread.abort());
    let outcome = handle.await.unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert_eq!(labels, vec!["nodeError:wait", "abort"]);
    assert_eq!(outcome.status, ThreadStatus::Aborted);
    assert_eq!(outcome.errors.get("wait"), Some(&NodeError::Cancelled));
}

#[tokio::test]
async fn abort_outside_running_is_a_no_op() {
    let thread = runtime().create_thread(&linear_graph()).await.unwrap();
    assert!(!thread.abort());
    assert_eq!(thread.status(), ThreadStatus::Idle);

    thread
        .run(inputs(&[("x", Value::Number(1.0))]))
        .await
        .unwrap();
    assert!(!thread.abort());
    assert_eq!(thread.status(), ThreadStatus::Completed);
}

#[tokio::test]
async fn thread_runs_only_once() {
    let thread = runtime().create_thread(&linear_graph()).await.unwrap();
    let handle = thread.start(inputs(&[("x", Value::Number(1.0))])).unwrap();

    let err = thread.start(Sockets::new()).err().unwrap();
    assert_eq!(
        err,
        ThreadError::InvalidState {
            expected: ThreadStatus::Idle,
            actual: ThreadStatus::Running,
        }
    );
    handle.await.unwrap();
    assert!(thread.run(Sockets::new()).await.is_err());
}

#[tokio::test]
async fn error_handler_receives_upstream_failure() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("broken", spec("test:fail"))).unwrap();
    graph.add_node(FlowNode::new("skipped", spec("test:relay"))).unwrap();
    graph.add_node(FlowNode::new("catch", spec("core:catch"))).unwrap();
    graph
        .add_node(FlowNode::new("out", spec("core:output")).with_name("message"))
        .unwrap();
    link(&mut graph, "broken", "value", "skipped", "value");
    link(&mut graph, "broken", "value", "catch", "value");
    link(&mut graph, "catch", "error", "out", "value");

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let outcome = thread.run(Sockets::new()).await.unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert!(position(&labels, "nodeError:broken") < position(&labels, "nodeStart:catch"));
    assert!(!labels.contains(&"nodeStart:skipped".to_string()));
    assert_eq!(outcome.status, ThreadStatus::Completed);
    assert_eq!(
        outcome.outputs.get("message"),
        Some(&Value::from("Execution failed: boom"))
    );
    assert!(matches!(
        thread.snapshot().nodes.get("skipped"),
        Some(flowruntime::NodeRunState::Skipped)
    ));
}

#[tokio::test]
async fn panicking_node_is_reported() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("bad", spec("test:panic"))).unwrap();

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let outcome = thread.run(Sockets::new()).await.unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert_eq!(
        labels,
        vec!["start", "nodeStart:bad", "error", "nodeError:bad", "end:completed"]
    );
    assert_eq!(
        outcome.errors.get("bad"),
        Some(&NodeError::Panicked {
            message: "kaboom".into()
        })
    );
}

#[tokio::test]
async fn interactive_input_feeds_waiting_node() {
    let runtime = FlowRuntime::with_registry(
        registry(),
        RuntimeConfig {
            await_inputs: true,
            ..RuntimeConfig::default()
        },
    );
    let thread = runtime.create_thread(&linear_graph()).await.unwrap();
    let mut rx = thread.subscribe();
    let handle = thread.start(Sockets::new()).unwrap();

    thread.input("x", Value::Number(5.0)).unwrap();
    let outcome = handle.await.unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert_eq!(
        labels,
        vec![
            "start",
            "input:x",
            "nodeStart:double",
            "nodeEnd:double",
            "output:y",
            "end:completed"
        ]
    );
    assert_eq!(outcome.outputs.get("y"), Some(&Value::Number(10.0)));
    assert!(thread.input("x", Value::Null).is_err());
}

#[tokio::test]
async fn unfed_input_starves_the_run() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("in", spec("core:input")).with_name("x"))
        .unwrap();
    graph
        .add_node(FlowNode::new("out", spec("core:output")).with_name("y"))
        .unwrap();
    link(&mut graph, "in", "value", "out", "value");

    let thread = runtime().create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    let outcome = tokio::time::timeout(Duration::from_secs(2), thread.run(Sockets::new()))
        .await
        .expect("run never finished")
        .unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert_eq!(labels, vec!["start", "end:failed"]);
    assert_eq!(outcome.status, ThreadStatus::Failed);
    assert_eq!(
        outcome.errors.get("in"),
        Some(&NodeError::MissingInput { name: "x".into() })
    );
    assert_eq!(
        outcome.errors.get("out"),
        Some(&NodeError::UpstreamFailed {
            node_id: "in".into()
        })
    );
    assert_eq!(thread.status(), ThreadStatus::Failed);
}

#[tokio::test]
async fn snapshot_sequence_tracks_announced_changes() {
    let thread = runtime().create_thread(&linear_graph()).await.unwrap();
    assert_eq!(thread.snapshot().seq, 0);
    let mut rx = thread.subscribe();

    thread
        .run(inputs(&[("x", Value::Number(3.0))]))
        .await
        .unwrap();
    let events = collect(&mut rx).await;
    let snapshot = thread.snapshot();

    assert_eq!(snapshot.seq, events.last().unwrap().seq);
    assert_eq!(snapshot.status, ThreadStatus::Completed);
    assert_eq!(snapshot.outputs.get("y"), Some(&Value::Number(6.0)));
    assert!(snapshot
        .nodes
        .values()
        .all(|state| *state == NodeRunState::Completed));
}

#[tokio::test]
async fn parallelism_limit_serializes_ready_nodes() {
    let mut graph = FlowGraph::new();
    for id in ["a", "b"] {
        graph
            .add_node(FlowNode::new(id, spec("test:relay")).with_input("delay", Value::Number(10.0)))
            .unwrap();
    }
    let runtime = FlowRuntime::with_registry(
        registry(),
        RuntimeConfig {
            max_parallel_nodes: 1,
            ..RuntimeConfig::default()
        },
    );
    let thread = runtime.create_thread(&graph).await.unwrap();
    let mut rx = thread.subscribe();
    thread.run(Sockets::new()).await.unwrap();
    let labels = labels(&collect(&mut rx).await);

    assert_eq!(
        labels,
        vec![
            "start",
            "nodeStart:a",
            "nodeEnd:a",
            "nodeStart:b",
            "nodeEnd:b",
            "end:completed"
        ]
    );
}

#[tokio::test]
async fn source_paths_select_nested_values() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("user", spec("test:relay")).with_input(
            "value",
            Value::object([("profile", Value::object([("age", Value::Number(21.0))]))]),
        ))
        .unwrap();
    graph
        .add_node(FlowNode::new("double", spec("math:multiply")).with_input("b", Value::Number(2.0)))
        .unwrap();
    graph
        .add_node(FlowNode::new("out", spec("core:output")))
        .unwrap();
    graph
        .create_link(FlowLink {
            source_path: Some("profile.age".into()),
            ..FlowLink::new("user", "value", "double", "a")
        })
        .unwrap();
    link(&mut graph, "double", "result", "out", "value");

    let outcome = runtime().run(&graph, Sockets::new()).await.unwrap();
    assert_eq!(outcome.outputs.get("out"), Some(&Value::Number(42.0)));
}

#[tokio::test]
async fn target_paths_compose_socket_values() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("first", spec("test:relay")).with_input("value", Value::from("a")))
        .unwrap();
    graph
        .add_node(FlowNode::new("second", spec("test:relay")).with_input("value", Value::from("b")))
        .unwrap();
    graph
        .add_node(FlowNode::new("out", spec("core:output")))
        .unwrap();
    for (source, index) in [("first", "0"), ("second", "1")] {
        graph
            .create_link(FlowLink {
                target_path: Some(index.into()),
                ..FlowLink::new(source, "value", "out", "value")
            })
            .unwrap();
    }

    let outcome = runtime().run(&graph, Sockets::new()).await.unwrap();
    assert_eq!(
        outcome.outputs.get("out"),
        Some(&Value::Array(vec![Value::from("a"), Value::from("b")]))
    );
}

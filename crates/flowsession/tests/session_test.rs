// crates/flowsession/tests/session_test.rs

use async_trait::async_trait;
use flowcore::{
    Component, ComponentSpecifier, FlowGraph, FlowNode, InputEntry, LinkSource, NodeError,
    NodeOutput, Process, ProcessContext, Sockets, ThreadStatus, Value,
};
use flownodes::standard_registry;
use flowruntime::{FlowRuntime, NodeRunState, RuntimeConfig};
use flowsession::{
    ClientMessage, FlowStore, MemoryFlowStore, Peer, ServerMessage, Session, SessionConfig,
    SessionHandle, User,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn spec(s: &str) -> ComponentSpecifier {
    s.parse().unwrap()
}

/// Emits `count` traces, then passes the count on.
struct Chatty;

#[async_trait]
impl Process for Chatty {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let count = ctx
            .input_or("count", Value::Number(0.0))
            .as_f64()
            .unwrap_or_default() as usize;
        for i in 0..count {
            ctx.trace.trace(Value::Number(i as f64));
        }
        Ok(NodeOutput::new().with_output("count", count as f64))
    }
}

fn runtime() -> FlowRuntime {
    let mut registry = standard_registry();
    registry.register(Component::new(spec("test:chatty"), Chatty));
    FlowRuntime::with_registry(registry, RuntimeConfig::default())
}

const TRACES: usize = 1500;

fn chatty_node() -> FlowNode {
    FlowNode::new("chatty", spec("test:chatty")).with_input("count", Value::Number(TRACES as f64))
}

fn spawn(graph: FlowGraph) -> (SessionHandle, Arc<MemoryFlowStore>) {
    let store = Arc::new(MemoryFlowStore::new());
    let handle = Session::spawn(
        "flow",
        graph,
        runtime(),
        store.clone(),
        SessionConfig::default(),
    );
    (handle, store)
}

async fn join(handle: &SessionHandle, name: &str) -> (Peer, UnboundedReceiver<ServerMessage>) {
    let (peer, mut rx) = Peer::channel();
    handle
        .subscribe(peer.clone(), User::new(name, name))
        .await
        .unwrap();
    assert!(matches!(next(&mut rx).await, ServerMessage::Init { .. }));
    (peer, rx)
}

async fn next(rx: &mut UnboundedReceiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("peer channel closed")
}

/// Receives until `stop` matches, returning everything seen.
async fn collect_until(
    rx: &mut UnboundedReceiver<ServerMessage>,
    stop: impl Fn(&ServerMessage) -> bool,
) -> Vec<ServerMessage> {
    let mut seen = Vec::new();
    loop {
        let message = next(rx).await;
        let done = stop(&message);
        seen.push(message);
        if done {
            return seen;
        }
    }
}

fn delay_graph() -> FlowGraph {
    let mut graph = FlowGraph::new();
    graph
        .add_node(
            FlowNode::new("wait", spec("time:delay"))
                .with_input("delay_ms", Value::Number(60_000.0)),
        )
        .unwrap();
    graph
}

fn link(id: &str, name: &str) -> InputEntry {
    InputEntry::Link(LinkSource {
        id: id.into(),
        name: name.into(),
        path: None,
    })
}

#[tokio::test]
async fn first_subscriber_owns_and_colors_rotate() {
    let (handle, _) = spawn(FlowGraph::new());
    let config = SessionConfig::default();

    let (alice, mut alice_rx) = Peer::channel();
    handle
        .subscribe(alice.clone(), User::new("u1", "alice"))
        .await
        .unwrap();
    match next(&mut alice_rx).await {
        ServerMessage::Init { you, users, .. } => {
            assert_eq!(you, alice.id);
            assert_eq!(users.len(), 1);
            assert!(users[0].owner);
            assert_eq!(users[0].color, config.palette[0]);
        }
        other => panic!("unexpected {:?}", other),
    }

    let (bob, mut bob_rx) = Peer::channel();
    handle
        .subscribe(bob.clone(), User::new("u2", "bob"))
        .await
        .unwrap();
    match next(&mut bob_rx).await {
        ServerMessage::Init { users, .. } => assert_eq!(users.len(), 2),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        next(&mut alice_rx).await,
        ServerMessage::UserJoin {
            id: bob.id,
            name: "bob".into(),
            color: config.palette[1].clone(),
            owner: false,
        }
    );
}

#[tokio::test]
async fn subscribe_is_idempotent_and_unsubscribe_reports_unknown_peers() {
    let (handle, _) = spawn(FlowGraph::new());
    let (alice, _alice_rx) = join(&handle, "alice").await;
    let (bob, mut bob_rx) = join(&handle, "bob").await;

    handle
        .subscribe(alice.clone(), User::new("alice", "alice"))
        .await
        .unwrap();
    assert_eq!(handle.participants().await.unwrap().len(), 2);

    assert!(handle.unsubscribe(alice.id).await.unwrap());
    assert!(!handle.unsubscribe(alice.id).await.unwrap());
    assert_eq!(
        next(&mut bob_rx).await,
        ServerMessage::UserLeave { id: alice.id }
    );
    assert!(bob_rx.try_recv().is_err());
    assert_eq!(handle.participants().await.unwrap()[0].id, bob.id);
}

#[tokio::test]
async fn edits_skip_the_originator_and_are_saved() {
    let (handle, store) = spawn(FlowGraph::new());
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await; // user:join

    handle
        .on_message(
            alice.id,
            ClientMessage::SetMetaValue {
                key: "title".into(),
                value: Value::from("Demo"),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        next(&mut bob_rx).await,
        ServerMessage::Meta {
            key: "title".into(),
            value: Value::from("Demo"),
        }
    );
    assert!(alice_rx.try_recv().is_err());

    let saved = store.load("flow").await.unwrap().unwrap();
    assert_eq!(saved.metadata.get("title"), Some(&Value::from("Demo")));
}

#[tokio::test]
async fn created_nodes_are_announced_to_everyone() {
    let (handle, store) = spawn(FlowGraph::new());
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await;

    handle
        .on_message(
            alice.id,
            ClientMessage::CreateNode {
                kind: spec("math:add"),
                x: 10.0,
                y: 20.0,
            },
        )
        .await
        .unwrap();

    let ids = match next(&mut alice_rx).await {
        ServerMessage::NodeCreated { nodes } => nodes.keys().cloned().collect::<Vec<_>>(),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(ids.len(), 1);
    assert!(ids[0].starts_with("add-"));
    assert!(matches!(
        next(&mut bob_rx).await,
        ServerMessage::NodeCreated { .. }
    ));

    let saved = store.load("flow").await.unwrap().unwrap();
    assert!(saved.nodes.contains_key(&ids[0]));
}

#[tokio::test]
async fn link_edits_are_broadcast_as_input_changes() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("sum", spec("math:add"))).unwrap();
    graph.add_node(FlowNode::new("out", spec("core:output"))).unwrap();
    let (handle, _) = spawn(graph);
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await;

    handle
        .on_message(
            alice.id,
            ClientMessage::CreateLink {
                source_id: "sum".into(),
                source_name: "result".into(),
                source_path: None,
                target_id: "out".into(),
                target_name: "value".into(),
                target_path: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        next(&mut bob_rx).await,
        ServerMessage::NodeInputValueChanged {
            id: "out".into(),
            key: "value".into(),
            value: Some(link("sum", "result")),
        }
    );

    handle
        .on_message(
            alice.id,
            ClientMessage::RemoveNodes {
                ids: vec!["sum".into()],
            },
        )
        .await
        .unwrap();
    assert_eq!(
        next(&mut bob_rx).await,
        ServerMessage::NodeRemoved {
            ids: vec!["sum".into()],
        }
    );
    assert_eq!(
        next(&mut bob_rx).await,
        ServerMessage::NodeInputValueChanged {
            id: "out".into(),
            key: "value".into(),
            value: None,
        }
    );
    assert!(alice_rx.try_recv().is_err());

    let document = handle.document().await.unwrap();
    assert_eq!(document.nodes.len(), 1);
}

#[tokio::test]
async fn failures_are_reported_to_every_peer() {
    let (handle, store) = spawn(FlowGraph::new());
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await;

    handle
        .on_message(
            alice.id,
            ClientMessage::SetNodeInputValue {
                id: "ghost".into(),
                key: "a".into(),
                value: Some(InputEntry::Static(Value::Number(1.0))),
            },
        )
        .await
        .unwrap();

    let expected = ServerMessage::error("Node not found: ghost");
    assert_eq!(next(&mut alice_rx).await, expected);
    assert_eq!(next(&mut bob_rx).await, expected);
    assert!(store.load("flow").await.unwrap().is_none());
}

#[tokio::test]
async fn thread_events_reach_every_peer() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("x", spec("core:input"))).unwrap();
    graph
        .add_node(
            FlowNode::new("double", spec("math:multiply"))
                .with_input("a", link("x", "value"))
                .with_input("b", Value::Number(2.0)),
        )
        .unwrap();
    graph
        .add_node(
            FlowNode::new("y", spec("core:output")).with_input("value", link("double", "result")),
        )
        .unwrap();
    let (handle, _) = spawn(graph);
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await;

    let mut input = Sockets::new();
    input.insert("x".into(), Value::Number(21.0));
    handle
        .on_message(alice.id, ClientMessage::Start { input })
        .await
        .unwrap();

    for rx in [&mut alice_rx, &mut bob_rx] {
        let seen = collect_until(rx, |m| matches!(m, ServerMessage::ThreadEnd { .. })).await;
        assert!(matches!(seen[0], ServerMessage::ThreadStart { .. }));
        assert!(seen.iter().any(|m| matches!(
            m,
            ServerMessage::ThreadNodeEnd { id, .. } if id == "double"
        )));
        match seen.last() {
            Some(ServerMessage::ThreadEnd { status, output, .. }) => {
                assert_eq!(*status, ThreadStatus::Completed);
                assert_eq!(output.get("y"), Some(&Value::Number(42.0)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    let thread = handle.thread().await.unwrap().unwrap();
    assert_eq!(thread.status(), ThreadStatus::Completed);
}

#[tokio::test]
async fn chatty_threads_reach_peers_without_gaps() {
    let mut graph = FlowGraph::new();
    graph.add_node(chatty_node()).unwrap();
    let (handle, _) = spawn(graph);
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await;

    handle
        .on_message(
            alice.id,
            ClientMessage::Start {
                input: Sockets::new(),
            },
        )
        .await
        .unwrap();

    for rx in [&mut alice_rx, &mut bob_rx] {
        let seen = collect_until(rx, |m| matches!(m, ServerMessage::ThreadEnd { .. })).await;
        let traces: Vec<f64> = seen
            .iter()
            .filter_map(|m| match m {
                ServerMessage::ThreadNodeTrace { data, .. } => data.as_f64(),
                _ => None,
            })
            .collect();
        assert_eq!(traces.len(), TRACES);
        assert!(traces.windows(2).all(|w| w[1] == w[0] + 1.0));
        assert!(matches!(
            seen.last(),
            Some(ServerMessage::ThreadEnd {
                status: ThreadStatus::Completed,
                ..
            })
        ));
    }
}

#[tokio::test]
async fn starting_twice_is_rejected_while_running() {
    let (handle, _) = spawn(delay_graph());
    let (alice, mut alice_rx) = join(&handle, "alice").await;

    let start = ClientMessage::Start {
        input: Sockets::new(),
    };
    handle.on_message(alice.id, start.clone()).await.unwrap();
    handle.on_message(alice.id, start).await.unwrap();

    let seen = collect_until(&mut alice_rx, |m| matches!(m, ServerMessage::Error { .. })).await;
    assert!(matches!(seen.last(), Some(ServerMessage::Error { .. })));

    handle
        .on_message(alice.id, ClientMessage::Abort)
        .await
        .unwrap();
    let thread = handle.thread().await.unwrap().unwrap();
    assert_eq!(thread.finished().await, ThreadStatus::Aborted);
}

#[tokio::test]
async fn late_joiners_get_node_states_of_the_running_thread() {
    let (handle, _) = spawn(delay_graph());
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    handle
        .on_message(
            alice.id,
            ClientMessage::Start {
                input: Sockets::new(),
            },
        )
        .await
        .unwrap();
    collect_until(&mut alice_rx, |m| {
        matches!(m, ServerMessage::ThreadNodeStart { id, .. } if id == "wait")
    })
    .await;

    let (bob, mut bob_rx) = Peer::channel();
    handle
        .subscribe(bob, User::new("bob", "bob"))
        .await
        .unwrap();
    match next(&mut bob_rx).await {
        ServerMessage::Init { thread, .. } => {
            assert_eq!(thread.map(|t| t.status), Some(ThreadStatus::Running));
        }
        other => panic!("unexpected {:?}", other),
    }
    match next(&mut bob_rx).await {
        ServerMessage::ThreadNodeState { id, state, .. } => {
            assert_eq!(id, "wait");
            assert_eq!(state, NodeRunState::Running);
        }
        other => panic!("unexpected {:?}", other),
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn late_joiners_skip_events_their_replay_covers() {
    let mut graph = FlowGraph::new();
    graph.add_node(chatty_node()).unwrap();
    graph
        .add_node(
            FlowNode::new("wait", spec("time:delay"))
                .with_input("value", link("chatty", "count"))
                .with_input("delay_ms", Value::Number(60_000.0)),
        )
        .unwrap();
    let (handle, _) = spawn(graph);
    let (alice, _alice_rx) = join(&handle, "alice").await;
    handle
        .on_message(
            alice.id,
            ClientMessage::Start {
                input: Sockets::new(),
            },
        )
        .await
        .unwrap();

    // Joins while the chatty node's events are still queued.
    let (bob, mut bob_rx) = Peer::channel();
    handle
        .subscribe(bob, User::new("bob", "bob"))
        .await
        .unwrap();
    match next(&mut bob_rx).await {
        ServerMessage::Init { thread, .. } => {
            assert_eq!(thread.map(|t| t.status), Some(ThreadStatus::Running));
        }
        other => panic!("unexpected {:?}", other),
    }
    handle
        .on_message(alice.id, ClientMessage::Abort)
        .await
        .unwrap();
    let seen = collect_until(&mut bob_rx, |m| matches!(m, ServerMessage::ThreadAbort { .. })).await;

    let mut replayed = BTreeMap::new();
    let mut started = Vec::new();
    let mut traces = 0;
    for message in &seen {
        match message {
            ServerMessage::ThreadNodeState { id, state, .. } => {
                assert!(started.is_empty() && traces == 0, "replay after live events");
                replayed.insert(id.clone(), state.clone());
            }
            ServerMessage::ThreadNodeStart { id, .. } => started.push(id.clone()),
            ServerMessage::ThreadNodeTrace { .. } => traces += 1,
            _ => {}
        }
    }

    for (id, state) in &replayed {
        if matches!(state, NodeRunState::Running | NodeRunState::Completed) {
            assert!(!started.contains(id), "{id} started again after replay as {state:?}");
        }
    }
    match replayed.get("chatty") {
        Some(NodeRunState::Completed) => assert_eq!(traces, 0),
        Some(NodeRunState::Running) => assert!(traces <= TRACES),
        _ => assert_eq!(traces, TRACES),
    }
}

#[tokio::test]
async fn last_peer_leaving_aborts_the_thread() {
    let (handle, _) = spawn(delay_graph());
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    handle
        .on_message(
            alice.id,
            ClientMessage::Start {
                input: Sockets::new(),
            },
        )
        .await
        .unwrap();
    collect_until(&mut alice_rx, |m| {
        matches!(m, ServerMessage::ThreadNodeStart { .. })
    })
    .await;

    handle
        .on_message(alice.id, ClientMessage::UserLeave)
        .await
        .unwrap();
    assert!(handle.participants().await.unwrap().is_empty());

    let thread = handle.thread().await.unwrap().unwrap();
    assert_eq!(thread.finished().await, ThreadStatus::Aborted);
}

#[tokio::test]
async fn input_options_are_sent_to_the_requester_only() {
    let mut graph = FlowGraph::new();
    graph
        .add_node(FlowNode::new("fetch", spec("http:request")))
        .unwrap();
    let (handle, _) = spawn(graph);
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await;

    handle
        .on_message(
            alice.id,
            ClientMessage::GetInputValueOptions {
                id: "fetch".into(),
                key: "method".into(),
                query: "p".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        next(&mut alice_rx).await,
        ServerMessage::NodeInputOptionResult {
            id: "fetch".into(),
            key: "method".into(),
            options: vec![Value::from("POST"), Value::from("PUT"), Value::from("PATCH")],
        }
    );
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn cursor_and_selection_are_shared() {
    let (handle, _) = spawn(FlowGraph::new());
    let (alice, mut alice_rx) = join(&handle, "alice").await;
    let (_bob, mut bob_rx) = join(&handle, "bob").await;
    next(&mut alice_rx).await;

    handle
        .on_message(alice.id, ClientMessage::SetUserPosition { x: 1.0, y: 2.0 })
        .await
        .unwrap();
    handle
        .on_message(
            alice.id,
            ClientMessage::SetUserSelection {
                ids: vec!["n".into()],
            },
        )
        .await
        .unwrap();

    assert_eq!(
        next(&mut bob_rx).await,
        ServerMessage::UserPosition {
            id: alice.id,
            x: 1.0,
            y: 2.0,
        }
    );
    assert_eq!(
        next(&mut bob_rx).await,
        ServerMessage::UserSelection {
            id: alice.id,
            ids: vec!["n".into()],
        }
    );

    let users = handle.participants().await.unwrap();
    let info = users.iter().find(|u| u.id == alice.id).unwrap();
    assert_eq!(info.selected_node_ids, vec!["n".to_string()]);
    assert!(info.cursor.is_some());
}

#[tokio::test]
async fn shutdown_closes_the_handle() {
    let (handle, _) = spawn(FlowGraph::new());
    handle.shutdown().await.unwrap();
    assert!(handle.document().await.is_err());
}

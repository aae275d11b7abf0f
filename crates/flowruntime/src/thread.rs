//! Flow thread: one execution run of a compiled flow graph.
//!
//! Scheduling is a data-driven wave over the link topology. A node becomes
//! ready once every producer it links from has settled; ready nodes run
//! concurrently as spawned tasks while this module's driver loop is the only
//! place that mutates run state. A failed node turns its outputs into
//! errors: ordinary dependents are skipped, error handlers still run, and
//! the run fails only if an output node never receives a value.

use crate::{
    error::ThreadError, plan::ExecutionPlan, references::ReferenceResolverChain,
    resolver::ComponentResolverChain, runtime::RuntimeConfig,
};
use flowcore::{
    ComponentRole, EventSink, FlowGraph, InputEntry, NodeError, NodeId, NodeOutput,
    ProcessContext, Reference, Sockets, ThreadEvent, ThreadEventKind, ThreadId, ThreadStatus,
    Value,
};
use futures::future::{join_all, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-node progress within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum NodeRunState {
    Pending,
    /// Input node waiting for a value.
    Waiting,
    Running,
    Completed,
    Failed { error: NodeError },
    /// Not run because an upstream node failed.
    Skipped,
}

/// Point-in-time view of a thread, used to bring late observers up to date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSnapshot {
    pub id: ThreadId,
    pub status: ThreadStatus,
    pub nodes: BTreeMap<NodeId, NodeRunState>,
    pub outputs: Sockets,
    /// Sequence number of the last event whose effect is included. Events
    /// up to this one add nothing to the snapshot.
    pub seq: u64,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadOutcome {
    pub thread_id: ThreadId,
    pub status: ThreadStatus,
    pub outputs: Sockets,
    pub errors: BTreeMap<NodeId, NodeError>,
}

struct Shared {
    id: ThreadId,
    events: EventSink,
    status: watch::Sender<ThreadStatus>,
    signal: CancellationToken,
    plan: Mutex<Option<ExecutionPlan>>,
    inputs: mpsc::UnboundedSender<(String, Value)>,
    pending_inputs: Mutex<Option<mpsc::UnboundedReceiver<(String, Value)>>>,
    snapshot: Mutex<ThreadSnapshot>,
    outcome: Mutex<Option<ThreadOutcome>>,
    references: ReferenceResolverChain,
    max_parallel: usize,
    await_inputs: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one run of a flow. Cloning shares the same run.
///
/// A thread runs at most once; build a new one from the graph for
/// another run.
#[derive(Clone)]
pub struct Thread {
    shared: Arc<Shared>,
}

impl Thread {
    /// Resolves every node's component, wires the link topology and rejects
    /// cyclic graphs.
    pub async fn compile(
        graph: &FlowGraph,
        components: &ComponentResolverChain,
        references: ReferenceResolverChain,
        config: &RuntimeConfig,
    ) -> Result<Self, ThreadError> {
        let plan = ExecutionPlan::compile(graph, components).await?;
        let id = Uuid::new_v4();
        let (status, _) = watch::channel(ThreadStatus::Idle);
        let (inputs, pending_inputs) = mpsc::unbounded_channel();
        let nodes = plan
            .nodes
            .keys()
            .map(|id| (id.clone(), NodeRunState::Pending))
            .collect();

        tracing::debug!("Compiled thread {} with {} nodes", id, plan.nodes.len());

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                events: EventSink::new(id),
                status,
                signal: CancellationToken::new(),
                plan: Mutex::new(Some(plan)),
                inputs,
                pending_inputs: Mutex::new(Some(pending_inputs)),
                snapshot: Mutex::new(ThreadSnapshot {
                    id,
                    status: ThreadStatus::Idle,
                    nodes,
                    outputs: Sockets::new(),
                    seq: 0,
                }),
                outcome: Mutex::new(None),
                references,
                max_parallel: config.max_parallel_nodes.max(1),
                await_inputs: config.await_inputs,
            }),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.shared.id
    }

    pub fn status(&self) -> ThreadStatus {
        *self.shared.status.borrow()
    }

    /// Subscribe before `start` to observe the whole stream.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ThreadEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        lock(&self.shared.snapshot).clone()
    }

    pub fn outcome(&self) -> Option<ThreadOutcome> {
        lock(&self.shared.outcome).clone()
    }

    /// Starts the run on a background task.
    pub fn start(&self, inputs: Sockets) -> Result<JoinHandle<ThreadOutcome>, ThreadError> {
        let run = self.begin()?;
        Ok(tokio::spawn(run.drive(inputs)))
    }

    /// Runs to completion on the current task.
    pub async fn run(&self, inputs: Sockets) -> Result<ThreadOutcome, ThreadError> {
        let run = self.begin()?;
        Ok(run.drive(inputs).await)
    }

    fn begin(&self) -> Result<Run, ThreadError> {
        let plan = lock(&self.shared.plan).take();
        let rx = lock(&self.shared.pending_inputs).take();
        let (Some(plan), Some(rx)) = (plan, rx) else {
            return Err(ThreadError::InvalidState {
                expected: ThreadStatus::Idle,
                actual: self.status(),
            });
        };
        self.shared.status.send_replace(ThreadStatus::Running);
        lock(&self.shared.snapshot).status = ThreadStatus::Running;
        Ok(Run::new(self.shared.clone(), plan, rx))
    }

    /// Requests cooperative cancellation. Returns `false` (and does nothing)
    /// when the thread is not running.
    pub fn abort(&self) -> bool {
        if self.status() != ThreadStatus::Running {
            return false;
        }
        tracing::info!("Aborting thread {}", self.shared.id);
        self.shared.signal.cancel();
        true
    }

    /// Feeds a value to the input node(s) named `name` that are still
    /// waiting for one.
    pub fn input(&self, name: impl Into<String>, value: Value) -> Result<(), ThreadError> {
        let actual = self.status();
        if actual != ThreadStatus::Running {
            return Err(ThreadError::InvalidState {
                expected: ThreadStatus::Running,
                actual,
            });
        }
        // The receiver lives as long as the driver; a closed channel means
        // the run just finished.
        self.shared
            .inputs
            .send((name.into(), value))
            .map_err(|_| ThreadError::InvalidState {
                expected: ThreadStatus::Running,
                actual: self.status(),
            })
    }

    /// Waits for a terminal status. Returns immediately for idle threads
    /// that were never started.
    pub async fn finished(&self) -> ThreadStatus {
        let mut rx = self.shared.status.subscribe();
        let status = *rx.borrow_and_update();
        if status == ThreadStatus::Idle {
            return status;
        }
        let status = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }
}

type Settled = (NodeId, Sockets, Result<Result<NodeOutput, NodeError>, JoinError>);

enum Slot {
    Pending,
    Queued,
    Waiting(String),
    Running,
    Completed(Sockets),
    Failed(NodeError),
}

impl Slot {
    fn settled(&self) -> bool {
        matches!(self, Slot::Completed(_) | Slot::Failed(_))
    }
}

/// Input values assembled for a node, with whatever failed on the way.
#[derive(Default)]
struct Assembled {
    inputs: Sockets,
    /// Errors of failed producers, keyed by the input socket they feed.
    upstream_errors: BTreeMap<String, NodeError>,
    failed_upstream: Option<NodeId>,
    reference_error: Option<NodeError>,
}

/// Driver state of a single run. Owned by the driver task only.
struct Run {
    shared: Arc<Shared>,
    plan: ExecutionPlan,
    slots: HashMap<NodeId, Slot>,
    resolved: HashMap<Reference, Result<Value, NodeError>>,
    ready: VecDeque<NodeId>,
    running: FuturesUnordered<BoxFuture<'static, Settled>>,
    input_rx: mpsc::UnboundedReceiver<(String, Value)>,
    outputs: Sockets,
    errors: BTreeMap<NodeId, NodeError>,
}

impl Run {
    fn new(
        shared: Arc<Shared>,
        plan: ExecutionPlan,
        input_rx: mpsc::UnboundedReceiver<(String, Value)>,
    ) -> Self {
        let slots = plan
            .nodes
            .keys()
            .map(|id| (id.clone(), Slot::Pending))
            .collect();
        Self {
            shared,
            plan,
            slots,
            resolved: HashMap::new(),
            ready: VecDeque::new(),
            running: FuturesUnordered::new(),
            input_rx,
            outputs: Sockets::new(),
            errors: BTreeMap::new(),
        }
    }

    fn emit(&self, kind: ThreadEventKind) {
        self.shared.events.emit(kind);
    }

    fn aborted(&self) -> bool {
        self.shared.signal.is_cancelled()
    }

    fn record(&self, id: &str, state: NodeRunState) {
        if let Some(slot) = lock(&self.shared.snapshot).nodes.get_mut(id) {
            *slot = state;
        }
    }

    /// Applies a snapshot change and emits the event announcing it under the
    /// snapshot lock, so `ThreadSnapshot::seq` matches what the snapshot shows.
    fn transition(&self, kind: ThreadEventKind, change: impl FnOnce(&mut ThreadSnapshot)) {
        let mut snapshot = lock(&self.shared.snapshot);
        change(&mut snapshot);
        snapshot.seq = self.shared.events.emit(kind);
    }

    async fn drive(mut self, initial: Sockets) -> ThreadOutcome {
        let thread_id = self.shared.id;
        tracing::info!("Starting thread {}", thread_id);
        self.emit(ThreadEventKind::Start {
            input: initial.clone(),
        });

        if !self.aborted() {
            self.resolve_references().await;
        }
        if !self.aborted() {
            self.seed(&initial);
            self.schedule().await;
        }

        if self.aborted() {
            self.finish_aborted().await
        } else {
            self.finish()
        }
    }

    /// Resolves every distinct reference once, concurrently.
    async fn resolve_references(&mut self) {
        if self.plan.references.is_empty() {
            return;
        }
        let chain = &self.shared.references;
        let lookups = join_all(self.plan.references.iter().map(|r| chain.resolve(r)));
        let results = tokio::select! {
            results = lookups => results,
            _ = self.shared.signal.cancelled() => return,
        };
        for (reference, result) in self.plan.references.iter().zip(results) {
            if let Err(error) = &result {
                tracing::warn!("Reference {} failed to resolve: {}", reference, error);
            }
            self.resolved.insert(reference.clone(), result);
        }
    }

    /// Seeds input nodes and queues every node that is ready from the start.
    fn seed(&mut self, initial: &Sockets) {
        let ids: Vec<NodeId> = self.plan.nodes.keys().cloned().collect();
        for id in &ids {
            let node = &self.plan.nodes[id];
            if node.component.role != ComponentRole::Input {
                continue;
            }
            let name = self.boundary_name(id);
            let value = initial
                .get(&name)
                .cloned()
                .or_else(|| node.bindings.get("default").and_then(|e| self.static_value(e)))
                .or_else(|| {
                    node.component
                        .inputs
                        .get("default")
                        .and_then(|s| s.default.clone())
                });
            match value {
                Some(value) => {
                    self.record(id, NodeRunState::Completed);
                    self.complete_boundary(id, value);
                }
                None if self.shared.await_inputs => {
                    tracing::debug!("Input node {} waits for '{}'", id, name);
                    self.slots.insert(id.clone(), Slot::Waiting(name));
                    self.record(id, NodeRunState::Waiting);
                }
                None => {
                    tracing::warn!("Input node {} got no value for '{}'", id, name);
                    let error = NodeError::MissingInput { name };
                    self.errors.insert(id.clone(), error.clone());
                    self.slots.insert(id.clone(), Slot::Failed(error));
                    self.record(id, NodeRunState::Skipped);
                    self.release(id);
                }
            }
        }

        for id in ids {
            if matches!(self.slots.get(&id), Some(Slot::Pending)) && self.upstream_settled(&id) {
                self.slots.insert(id.clone(), Slot::Queued);
                self.ready.push_back(id);
            }
        }
    }

    fn static_value(&self, entry: &InputEntry) -> Option<Value> {
        match entry {
            InputEntry::Static(value) => Some(value.clone()),
            InputEntry::Reference(reference) => {
                self.resolved.get(reference).and_then(|r| r.clone().ok())
            }
            _ => None,
        }
    }

    /// Flow-level socket name of an input/output node: its static `name`
    /// input, else the node name, else the node id.
    fn boundary_name(&self, id: &str) -> String {
        let node = &self.plan.nodes[id];
        node.bindings
            .get("name")
            .and_then(|entry| self.static_value(entry))
            .and_then(|value| value.as_str().map(str::to_string))
            .or_else(|| node.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn upstream_settled(&self, id: &str) -> bool {
        self.plan.nodes[id]
            .upstream
            .iter()
            .all(|u| self.slots.get(u).is_some_and(Slot::settled))
    }

    async fn schedule(&mut self) {
        loop {
            if self.aborted() {
                return;
            }

            while self.running.len() < self.shared.max_parallel {
                let Some(id) = self.ready.pop_front() else {
                    break;
                };
                self.dispatch(id);
            }

            if self.running.is_empty() {
                if !self.ready.is_empty() {
                    continue;
                }
                if !self.waiting_inputs() {
                    return;
                }
                tokio::select! {
                    biased;
                    _ = self.shared.signal.cancelled() => return,
                    Some((name, value)) = self.input_rx.recv() => self.feed(name, value),
                }
                continue;
            }

            tokio::select! {
                biased;
                _ = self.shared.signal.cancelled() => return,
                Some(settled) = self.running.next() => self.settle(settled),
                Some((name, value)) = self.input_rx.recv() => self.feed(name, value),
            }
        }
    }

    fn waiting_inputs(&self) -> bool {
        self.slots.values().any(|s| matches!(s, Slot::Waiting(_)))
    }

    fn feed(&mut self, name: String, value: Value) {
        let targets: Vec<NodeId> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Waiting(n) if *n == name))
            .map(|(id, _)| id.clone())
            .collect();
        if targets.is_empty() {
            tracing::warn!("No input node is waiting for '{}'", name);
            return;
        }
        let mut targets = targets;
        targets.sort();
        self.transition(
            ThreadEventKind::Input {
                name,
                value: value.clone(),
            },
            |snapshot| {
                for id in &targets {
                    if let Some(state) = snapshot.nodes.get_mut(id) {
                        *state = NodeRunState::Completed;
                    }
                }
            },
        );
        for id in targets {
            self.complete_boundary(&id, value.clone());
        }
    }

    fn complete_boundary(&mut self, id: &str, value: Value) {
        let mut outputs = Sockets::new();
        outputs.insert("value".to_string(), value);
        self.slots.insert(id.to_string(), Slot::Completed(outputs));
        self.release(id);
    }

    /// Queues consumers of `id` whose producers have all settled.
    fn release(&mut self, id: &str) {
        let downstream = self.plan.nodes[id].downstream.clone();
        for next in downstream {
            if matches!(self.slots.get(&next), Some(Slot::Pending)) && self.upstream_settled(&next)
            {
                self.slots.insert(next.clone(), Slot::Queued);
                self.ready.push_back(next);
            }
        }
    }

    fn assemble_entry(&self, entry: &InputEntry) -> Result<Option<Value>, AssembleFailure> {
        match entry {
            InputEntry::Static(value) => Ok(Some(value.clone())),
            InputEntry::Reference(reference) => match self.resolved.get(reference) {
                Some(Ok(value)) => Ok(Some(value.clone())),
                Some(Err(error)) => Err(AssembleFailure::Reference(error.clone())),
                None => Err(AssembleFailure::Reference(NodeError::ReferenceNotFound {
                    kind: reference.kind(),
                    name: reference.name().to_string(),
                })),
            },
            InputEntry::Link(source) => match self.slots.get(&source.id) {
                Some(Slot::Completed(outputs)) => {
                    let value = outputs.get(&source.name).and_then(|v| match &source.path {
                        Some(path) => v.get_path(path).cloned(),
                        None => Some(v.clone()),
                    });
                    Ok(value)
                }
                Some(Slot::Failed(error)) => Err(AssembleFailure::Upstream {
                    node_id: source.id.clone(),
                    error: error.clone(),
                }),
                _ => Ok(None),
            },
            InputEntry::Paths(paths) => {
                let mut parts = BTreeMap::new();
                for (path, nested) in paths {
                    if let Some(value) = self.assemble_entry(nested)? {
                        parts.insert(path.clone(), value);
                    }
                }
                Ok(Some(compose_paths(parts)))
            }
        }
    }

    fn assemble(&self, id: &str) -> Assembled {
        let mut assembled = Assembled::default();
        for (socket, entry) in &self.plan.nodes[id].bindings {
            match self.assemble_entry(entry) {
                Ok(Some(value)) => {
                    assembled.inputs.insert(socket.clone(), value);
                }
                Ok(None) => {}
                Err(AssembleFailure::Upstream { node_id, error }) => {
                    assembled.failed_upstream.get_or_insert(node_id);
                    assembled.upstream_errors.insert(socket.clone(), error);
                }
                Err(AssembleFailure::Reference(error)) => {
                    assembled.reference_error.get_or_insert(error);
                }
            }
        }
        assembled
    }

    fn dispatch(&mut self, id: NodeId) {
        let role = self.plan.nodes[&id].component.role;
        let Assembled {
            inputs,
            upstream_errors,
            failed_upstream,
            reference_error,
        } = self.assemble(&id);

        if let Some(node_id) = failed_upstream {
            if role != ComponentRole::ErrorHandler {
                let error = NodeError::UpstreamFailed { node_id };
                tracing::debug!("Skipping node {}: {}", id, error);
                self.errors.insert(id.clone(), error.clone());
                self.slots.insert(id.clone(), Slot::Failed(error));
                self.record(&id, NodeRunState::Skipped);
                self.release(&id);
                return;
            }
        }

        if role == ComponentRole::Output {
            if let Some(error) = reference_error {
                self.fail(&id, error);
                return;
            }
            let name = self.boundary_name(&id);
            let value = inputs.get("value").cloned().unwrap_or_default();
            self.transition(
                ThreadEventKind::Output {
                    name: name.clone(),
                    value: value.clone(),
                },
                |snapshot| {
                    snapshot.outputs.insert(name.clone(), value.clone());
                    if let Some(state) = snapshot.nodes.get_mut(&id) {
                        *state = NodeRunState::Completed;
                    }
                },
            );
            self.outputs.insert(name, value.clone());
            self.complete_boundary(&id, value);
            return;
        }

        tracing::debug!("Starting node {}", id);
        self.transition(
            ThreadEventKind::NodeStart {
                node_id: id.clone(),
                input: inputs.clone(),
            },
            |snapshot| {
                if let Some(state) = snapshot.nodes.get_mut(&id) {
                    *state = NodeRunState::Running;
                }
            },
        );

        if let Some(error) = reference_error {
            self.fail(&id, error);
            return;
        }

        let component = self.plan.nodes[&id].component.clone();
        let Some(process) = component.process.clone() else {
            let error = NodeError::ComponentUnavailable {
                component: component.specifier.to_string(),
            };
            self.fail(&id, error);
            return;
        };

        let prepared = match component.inputs.prepare(inputs) {
            Ok(prepared) => prepared,
            Err(error) => {
                self.fail(&id, error);
                return;
            }
        };

        let ctx = ProcessContext {
            node_id: id.clone(),
            inputs: prepared.clone(),
            errors: upstream_errors,
            trace: self.shared.events.trace_emitter(id.clone()),
            signal: self.shared.signal.clone(),
        };
        self.slots.insert(id.clone(), Slot::Running);

        let handle = tokio::spawn(async move { process.process(ctx).await });
        self.running
            .push(Box::pin(async move { (id, prepared, handle.await) }));
    }

    /// Records a node failure and emits `nodeError`.
    fn fail(&mut self, id: &str, error: NodeError) {
        tracing::error!("Node {} failed: {}", id, error);
        self.transition(
            ThreadEventKind::NodeError {
                node_id: id.to_string(),
                error: error.clone(),
            },
            |snapshot| {
                if let Some(state) = snapshot.nodes.get_mut(id) {
                    *state = NodeRunState::Failed {
                        error: error.clone(),
                    };
                }
            },
        );
        self.errors.insert(id.to_string(), error.clone());
        self.slots.insert(id.to_string(), Slot::Failed(error));
        self.release(id);
    }

    fn settle(&mut self, (id, input, result): Settled) {
        match result {
            Ok(Ok(output)) => {
                tracing::debug!("Node {} completed", id);
                self.transition(
                    ThreadEventKind::NodeEnd {
                        node_id: id.clone(),
                        input,
                        output: output.outputs.clone(),
                    },
                    |snapshot| {
                        if let Some(state) = snapshot.nodes.get_mut(&id) {
                            *state = NodeRunState::Completed;
                        }
                    },
                );
                self.slots.insert(id.clone(), Slot::Completed(output.outputs));
                self.release(&id);
            }
            Ok(Err(error)) => self.fail(&id, error),
            Err(join_error) => {
                let message = panic_message(join_error);
                self.emit(ThreadEventKind::Error {
                    message: format!("node {} panicked: {}", id, message),
                });
                self.fail(&id, NodeError::Panicked { message });
            }
        }
    }

    /// Lets in-flight processes settle, then reports the abort.
    async fn finish_aborted(mut self) -> ThreadOutcome {
        while let Some(settled) = self.running.next().await {
            self.settle(settled);
        }
        self.transition(ThreadEventKind::Abort, |snapshot| {
            snapshot.status = ThreadStatus::Aborted
        });
        tracing::info!("Thread {} aborted", self.shared.id);
        self.conclude(ThreadStatus::Aborted)
    }

    fn finish(mut self) -> ThreadOutcome {
        let starved: Vec<&NodeId> = self
            .plan
            .nodes
            .values()
            .filter(|n| n.component.role == ComponentRole::Output)
            .map(|n| &n.id)
            .filter(|id| !matches!(self.slots.get(*id), Some(Slot::Completed(_))))
            .collect();

        let status = if starved.is_empty() {
            ThreadStatus::Completed
        } else {
            tracing::warn!("Outputs never received a value: {:?}", starved);
            ThreadStatus::Failed
        };

        self.transition(
            ThreadEventKind::End {
                status,
                output: self.outputs.clone(),
            },
            |snapshot| snapshot.status = status,
        );
        tracing::info!("Thread {} finished: {}", self.shared.id, status);
        self.conclude(status)
    }

    fn conclude(&mut self, status: ThreadStatus) -> ThreadOutcome {
        let outcome = ThreadOutcome {
            thread_id: self.shared.id,
            status,
            outputs: std::mem::take(&mut self.outputs),
            errors: std::mem::take(&mut self.errors),
        };
        *lock(&self.shared.outcome) = Some(outcome.clone());
        lock(&self.shared.snapshot).status = status;
        self.shared.status.send_replace(status);
        outcome
    }
}

enum AssembleFailure {
    Upstream { node_id: NodeId, error: NodeError },
    Reference(NodeError),
}

/// Builds a socket value from path-addressed parts: an array when every
/// path is an index, an object otherwise.
fn compose_paths(parts: BTreeMap<String, Value>) -> Value {
    let indexed: Option<Vec<(usize, &Value)>> = parts
        .iter()
        .map(|(path, value)| path.parse::<usize>().ok().map(|i| (i, value)))
        .collect();
    match indexed {
        Some(mut items) if !items.is_empty() => {
            items.sort_by_key(|(i, _)| *i);
            Value::Array(items.into_iter().map(|(_, v)| v.clone()).collect())
        }
        _ => Value::Object(parts),
    }
}

fn panic_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task cancelled".to_string();
    }
    let payload = error.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

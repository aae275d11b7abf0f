use crate::{NodeError, NodeId, Sockets, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type ThreadId = Uuid;

/// Lifecycle state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreadStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl ThreadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ThreadStatus::Completed | ThreadStatus::Failed | ThreadStatus::Aborted
        )
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ThreadStatus::Idle => "idle",
            ThreadStatus::Running => "running",
            ThreadStatus::Completed => "completed",
            ThreadStatus::Failed => "failed",
            ThreadStatus::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One entry of a thread's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEvent {
    pub thread_id: ThreadId,
    /// Position in the stream, starting at 1.
    pub seq: u64,
    /// Microseconds since the thread's event sink was created.
    pub elapsed_us: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ThreadEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThreadEventKind {
    Start {
        input: Sockets,
    },
    Input {
        name: String,
        value: Value,
    },
    Output {
        name: String,
        value: Value,
    },
    #[serde(rename_all = "camelCase")]
    NodeStart {
        node_id: NodeId,
        input: Sockets,
    },
    #[serde(rename_all = "camelCase")]
    NodeTrace {
        node_id: NodeId,
        data: Value,
    },
    #[serde(rename_all = "camelCase")]
    NodeError {
        node_id: NodeId,
        error: NodeError,
    },
    #[serde(rename_all = "camelCase")]
    NodeEnd {
        node_id: NodeId,
        input: Sockets,
        output: Sockets,
    },
    Abort,
    Error {
        message: String,
    },
    End {
        status: ThreadStatus,
        output: Sockets,
    },
}

impl ThreadEventKind {
    /// Node the event belongs to, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ThreadEventKind::NodeStart { node_id, .. }
            | ThreadEventKind::NodeTrace { node_id, .. }
            | ThreadEventKind::NodeError { node_id, .. }
            | ThreadEventKind::NodeEnd { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

struct SinkState {
    seq: u64,
    subscribers: Vec<mpsc::UnboundedSender<ThreadEvent>>,
}

struct SinkInner {
    thread_id: ThreadId,
    origin: Instant,
    state: Mutex<SinkState>,
}

/// Ordered event channel of one thread.
///
/// Sequence numbers are assigned and events are sent under one lock, so the
/// order observed by every subscriber matches `seq`. Each subscriber has its
/// own unbounded queue; a slow subscriber never loses events.
#[derive(Clone)]
pub struct EventSink {
    inner: Arc<SinkInner>,
}

impl EventSink {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                thread_id,
                origin: Instant::now(),
                state: Mutex::new(SinkState {
                    seq: 0,
                    subscribers: Vec::new(),
                }),
            }),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }

    /// Receives every event emitted after this call.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ThreadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().subscribers.push(tx);
        rx
    }

    /// Sequence number of the most recent event, 0 before the first.
    pub fn last_seq(&self) -> u64 {
        self.state().seq
    }

    /// Stamps and publishes an event. Returns its sequence number.
    pub fn emit(&self, kind: ThreadEventKind) -> u64 {
        let mut state = self.state();
        state.seq += 1;
        let event = ThreadEvent {
            thread_id: self.inner.thread_id,
            seq: state.seq,
            elapsed_us: self.inner.origin.elapsed().as_micros() as u64,
            timestamp: Utc::now(),
            kind,
        };
        // Dropped receivers unsubscribe.
        state
            .subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        state.seq
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn trace_emitter(&self, node_id: NodeId) -> TraceEmitter {
        TraceEmitter {
            node_id,
            sink: self.clone(),
        }
    }
}

/// Handle given to a process function for `nodeTrace` events.
#[derive(Clone)]
pub struct TraceEmitter {
    node_id: NodeId,
    sink: EventSink,
}

impl TraceEmitter {
    /// Emitter not attached to any subscriber, for calling process
    /// functions directly.
    pub fn detached(node_id: impl Into<NodeId>) -> Self {
        EventSink::new(Uuid::nil()).trace_emitter(node_id.into())
    }

    pub fn trace(&self, data: impl Into<Value>) {
        self.sink.emit(ThreadEventKind::NodeTrace {
            node_id: self.node_id.clone(),
            data: data.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log("info", message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log("warn", message.into());
    }

    pub fn progress(&self, percent: f64, message: Option<String>) {
        let mut data = vec![
            ("type", Value::from("progress")),
            ("percent", Value::Number(percent)),
        ];
        if let Some(message) = message {
            data.push(("message", Value::String(message)));
        }
        self.trace(Value::object(data));
    }

    fn log(&self, level: &str, message: String) {
        self.trace(Value::object([
            ("type", Value::from("log")),
            ("level", Value::from(level)),
            ("message", Value::String(message)),
        ]));
    }
}

//! Session wire protocol.
//!
//! Both directions are JSON objects discriminated by `event`.

use crate::error::PeerId;
use flowcore::{
    ComponentSpecifier, FlowDocument, FlowLink, InputEntry, NodeDocument, NodeError, NodeId,
    Position, Sockets, ThreadEvent, ThreadEventKind, ThreadId, ThreadStatus, Value,
};
use flowruntime::{NodeRunState, ThreadSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
}

/// Commands sent by a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientMessage {
    Start {
        #[serde(default)]
        input: Sockets,
    },
    Abort,
    /// Feeds a value to a waiting input node of the running thread.
    Input { name: String, value: Value },
    SetMetaValue { key: String, value: Value },
    CreateNode {
        kind: ComponentSpecifier,
        x: f64,
        y: f64,
    },
    CloneNodes { id: Vec<NodeId>, x: f64, y: f64 },
    RemoveNodes { ids: Vec<NodeId> },
    SetNodeInputValue {
        id: NodeId,
        key: String,
        #[serde(default)]
        value: Option<InputEntry>,
    },
    SetNodesPosition { positions: Vec<NodePosition> },
    SetNodeLabel {
        id: NodeId,
        #[serde(default)]
        label: Option<String>,
    },
    SetNodeComment {
        id: NodeId,
        #[serde(default)]
        comment: Option<String>,
    },
    GetInputValueOptions {
        id: NodeId,
        key: String,
        #[serde(default)]
        query: String,
    },
    #[serde(rename_all = "camelCase")]
    CreateLink {
        source_id: NodeId,
        source_name: String,
        #[serde(default)]
        source_path: Option<String>,
        target_id: NodeId,
        target_name: String,
        #[serde(default)]
        target_path: Option<String>,
    },
    RemoveLink {
        id: NodeId,
        name: String,
        #[serde(default)]
        path: Option<String>,
    },
    SetUserPosition { x: f64, y: f64 },
    SetUserSelection { ids: Vec<NodeId> },
    UserLeave,
}

impl ClientMessage {
    /// Whether handling the message changes the persisted graph.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ClientMessage::SetMetaValue { .. }
                | ClientMessage::CreateNode { .. }
                | ClientMessage::CloneNodes { .. }
                | ClientMessage::RemoveNodes { .. }
                | ClientMessage::SetNodeInputValue { .. }
                | ClientMessage::SetNodesPosition { .. }
                | ClientMessage::SetNodeLabel { .. }
                | ClientMessage::SetNodeComment { .. }
                | ClientMessage::CreateLink { .. }
                | ClientMessage::RemoveLink { .. }
        )
    }

    pub(crate) fn link(
        source_id: NodeId,
        source_name: String,
        source_path: Option<String>,
        target_id: NodeId,
        target_name: String,
        target_path: Option<String>,
    ) -> FlowLink {
        FlowLink {
            source_node_id: source_id,
            source_socket: source_name,
            source_path,
            target_node_id: target_id,
            target_socket: target_name,
            target_path,
        }
    }
}

/// Public view of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: PeerId,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Position>,
    #[serde(default)]
    pub selected_node_ids: Vec<NodeId>,
}

/// Messages pushed to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerMessage {
    /// Full state, sent to a peer right after it subscribes.
    #[serde(rename = "init", rename_all = "camelCase")]
    Init {
        flow_id: String,
        you: PeerId,
        users: Vec<UserInfo>,
        document: FlowDocument,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread: Option<ThreadSnapshot>,
    },
    #[serde(rename = "user:join")]
    UserJoin {
        id: PeerId,
        name: String,
        color: String,
        owner: bool,
    },
    #[serde(rename = "user:leave")]
    UserLeave { id: PeerId },
    #[serde(rename = "user:position")]
    UserPosition { id: PeerId, x: f64, y: f64 },
    #[serde(rename = "user:selection")]
    UserSelection { id: PeerId, ids: Vec<NodeId> },
    #[serde(rename = "meta")]
    Meta { key: String, value: Value },
    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "thread:start", rename_all = "camelCase")]
    ThreadStart { thread_id: ThreadId, input: Sockets },
    #[serde(rename = "thread:abort", rename_all = "camelCase")]
    ThreadAbort { thread_id: ThreadId },
    #[serde(rename = "thread:error", rename_all = "camelCase")]
    ThreadError { thread_id: ThreadId, message: String },
    #[serde(rename = "thread:end", rename_all = "camelCase")]
    ThreadEnd {
        thread_id: ThreadId,
        status: ThreadStatus,
        output: Sockets,
    },
    #[serde(rename = "thread:input", rename_all = "camelCase")]
    ThreadInput {
        thread_id: ThreadId,
        name: String,
        value: Value,
    },
    #[serde(rename = "thread:output", rename_all = "camelCase")]
    ThreadOutput {
        thread_id: ThreadId,
        name: String,
        value: Value,
    },
    #[serde(rename = "thread:nodeState", rename_all = "camelCase")]
    ThreadNodeState {
        thread_id: ThreadId,
        id: NodeId,
        state: NodeRunState,
    },
    #[serde(rename = "thread:nodeStart", rename_all = "camelCase")]
    ThreadNodeStart {
        thread_id: ThreadId,
        id: NodeId,
        input: Sockets,
    },
    #[serde(rename = "thread:nodeTrace", rename_all = "camelCase")]
    ThreadNodeTrace {
        thread_id: ThreadId,
        id: NodeId,
        data: Value,
    },
    #[serde(rename = "thread:nodeError", rename_all = "camelCase")]
    ThreadNodeError {
        thread_id: ThreadId,
        id: NodeId,
        error: NodeError,
    },
    #[serde(rename = "thread:nodeEnd", rename_all = "camelCase")]
    ThreadNodeEnd {
        thread_id: ThreadId,
        id: NodeId,
        input: Sockets,
        output: Sockets,
    },

    #[serde(rename = "node:created")]
    NodeCreated {
        nodes: BTreeMap<NodeId, NodeDocument>,
    },
    #[serde(rename = "node:removed")]
    NodeRemoved { ids: Vec<NodeId> },
    #[serde(rename = "node:metaValueChanged")]
    NodeMetaValueChanged { id: NodeId, key: String, value: Value },
    #[serde(rename = "node:inputValueChanged")]
    NodeInputValueChanged {
        id: NodeId,
        key: String,
        value: Option<InputEntry>,
    },
    #[serde(rename = "node:inputOptionResult")]
    NodeInputOptionResult {
        id: NodeId,
        key: String,
        options: Vec<Value>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

impl From<ThreadEvent> for ServerMessage {
    fn from(event: ThreadEvent) -> Self {
        let thread_id = event.thread_id;
        match event.kind {
            ThreadEventKind::Start { input } => ServerMessage::ThreadStart { thread_id, input },
            ThreadEventKind::Input { name, value } => ServerMessage::ThreadInput {
                thread_id,
                name,
                value,
            },
            ThreadEventKind::Output { name, value } => ServerMessage::ThreadOutput {
                thread_id,
                name,
                value,
            },
            ThreadEventKind::NodeStart { node_id, input } => ServerMessage::ThreadNodeStart {
                thread_id,
                id: node_id,
                input,
            },
            ThreadEventKind::NodeTrace { node_id, data } => ServerMessage::ThreadNodeTrace {
                thread_id,
                id: node_id,
                data,
            },
            ThreadEventKind::NodeError { node_id, error } => ServerMessage::ThreadNodeError {
                thread_id,
                id: node_id,
                error,
            },
            ThreadEventKind::NodeEnd {
                node_id,
                input,
                output,
            } => ServerMessage::ThreadNodeEnd {
                thread_id,
                id: node_id,
                input,
                output,
            },
            ThreadEventKind::Abort => ServerMessage::ThreadAbort { thread_id },
            ThreadEventKind::Error { message } => ServerMessage::ThreadError { thread_id, message },
            ThreadEventKind::End { status, output } => ServerMessage::ThreadEnd {
                thread_id,
                status,
                output,
            },
        }
    }
}

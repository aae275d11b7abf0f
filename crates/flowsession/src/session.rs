//! Collaborative session: the single owner of one flow graph and its most
//! recent thread.
//!
//! A session is an actor. Handles queue commands on a channel and the
//! session task applies them one at a time, so graph edits from different
//! peers are serialized in arrival order and every save sees a consistent
//! graph. Thread events are routed through the same queue before they are
//! broadcast.

use crate::error::{PeerId, SessionError};
use crate::protocol::{ClientMessage, ServerMessage, UserInfo};
use crate::store::FlowStore;
use chrono::{DateTime, Utc};
use flowcore::{
    filter_options, FlowDocument, FlowGraph, NodeDocument, NodeId, Position, ThreadEvent,
    ThreadEventKind, ThreadId, ThreadStatus, Value,
};
use flowruntime::{FlowRuntime, NodeRunState, Thread, ThreadError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub type FlowId = String;

/// Authenticated user behind a peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One connection's outbound side.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Peer {
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// A peer plus the receiving end of its message queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, message: ServerMessage) {
        if self.sender.send(message).is_err() {
            tracing::debug!("Peer {} is gone; dropping message", self.id);
        }
    }
}

struct Participant {
    peer: Peer,
    user: User,
    color: String,
    owner: bool,
    cursor: Option<Position>,
    selected: Vec<NodeId>,
    joined_at: DateTime<Utc>,
    /// Thread and sequence number the join snapshot covered.
    replayed: Option<(ThreadId, u64)>,
}

impl Participant {
    fn has_seen(&self, event: &ThreadEvent) -> bool {
        self.replayed
            .is_some_and(|(thread_id, seq)| thread_id == event.thread_id && event.seq <= seq)
    }
}

impl Participant {
    fn info(&self) -> UserInfo {
        UserInfo {
            id: self.peer.id,
            user_id: self.user.id.clone(),
            name: self.user.name.clone(),
            color: self.color.clone(),
            owner: self.owner,
            cursor: self.cursor,
            selected_node_ids: self.selected.clone(),
        }
    }
}

/// Configuration for sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub command_buffer: usize,
    /// Participant colors, assigned round-robin by join order.
    pub palette: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_buffer: 256,
            palette: [
                "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6",
                "#bfef45",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

enum Command {
    Subscribe(Peer, User, oneshot::Sender<()>),
    Unsubscribe(PeerId, oneshot::Sender<bool>),
    Message(PeerId, ClientMessage, oneshot::Sender<()>),
    Document(oneshot::Sender<FlowDocument>),
    Participants(oneshot::Sender<Vec<UserInfo>>),
    Thread(oneshot::Sender<Option<Thread>>),
    ThreadEvent(ThreadEvent),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    flow_id: FlowId,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed(self.flow_id.clone()))?;
        response
            .await
            .map_err(|_| SessionError::Closed(self.flow_id.clone()))
    }

    /// Joins the session. Re-subscribing a known peer is a no-op.
    pub async fn subscribe(&self, peer: Peer, user: User) -> Result<(), SessionError> {
        self.request(|reply| Command::Subscribe(peer, user, reply))
            .await
    }

    /// Leaves the session. Returns `false` when the peer was not subscribed.
    pub async fn unsubscribe(&self, peer_id: PeerId) -> Result<bool, SessionError> {
        self.request(|reply| Command::Unsubscribe(peer_id, reply))
            .await
    }

    /// Handles one peer command. Resolves once the command is applied;
    /// failures are broadcast to the peers rather than returned.
    pub async fn on_message(
        &self,
        peer_id: PeerId,
        message: ClientMessage,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::Message(peer_id, message, reply))
            .await
    }

    pub async fn document(&self) -> Result<FlowDocument, SessionError> {
        self.request(Command::Document).await
    }

    pub async fn participants(&self) -> Result<Vec<UserInfo>, SessionError> {
        self.request(Command::Participants).await
    }

    /// Current or most recent thread.
    pub async fn thread(&self) -> Result<Option<Thread>, SessionError> {
        self.request(Command::Thread).await
    }

    /// Aborts the live thread and stops the session task.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(Command::Shutdown).await
    }
}

pub struct Session {
    flow_id: FlowId,
    graph: FlowGraph,
    runtime: FlowRuntime,
    store: Arc<dyn FlowStore>,
    config: SessionConfig,
    participants: Vec<Participant>,
    joined: usize,
    owner: Option<PeerId>,
    thread: Option<Thread>,
    commands: mpsc::WeakSender<Command>,
}

impl Session {
    /// Starts the session task and returns its handle.
    pub fn spawn(
        flow_id: impl Into<FlowId>,
        graph: FlowGraph,
        runtime: FlowRuntime,
        store: Arc<dyn FlowStore>,
        config: SessionConfig,
    ) -> SessionHandle {
        let flow_id = flow_id.into();
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let session = Session {
            flow_id: flow_id.clone(),
            graph,
            runtime,
            store,
            config,
            participants: Vec::new(),
            joined: 0,
            owner: None,
            thread: None,
            commands: tx.downgrade(),
        };
        tokio::spawn(session.run(rx));
        SessionHandle { flow_id, tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        tracing::info!("Session {} started with {} nodes", self.flow_id, self.graph.len());

        while let Some(command) = rx.recv().await {
            match command {
                Command::Subscribe(peer, user, reply) => {
                    self.subscribe(peer, user);
                    let _ = reply.send(());
                }
                Command::Unsubscribe(peer_id, reply) => {
                    let _ = reply.send(self.unsubscribe(peer_id));
                }
                Command::Message(peer_id, message, reply) => {
                    self.on_message(peer_id, message).await;
                    let _ = reply.send(());
                }
                Command::Document(reply) => {
                    let _ = reply.send(self.graph.to_document());
                }
                Command::Participants(reply) => {
                    let _ = reply.send(self.participants.iter().map(Participant::info).collect());
                }
                Command::Thread(reply) => {
                    let _ = reply.send(self.thread.clone());
                }
                Command::ThreadEvent(event) => {
                    self.broadcast_thread_event(event);
                }
                Command::Shutdown(reply) => {
                    self.abort_thread();
                    rx.close();
                    let _ = reply.send(());
                    break;
                }
            }
        }

        self.abort_thread();
        tracing::info!("Session {} closed", self.flow_id);
    }

    fn running_thread(&self) -> Option<&Thread> {
        self.thread
            .as_ref()
            .filter(|thread| thread.status() == ThreadStatus::Running)
    }

    fn abort_thread(&self) {
        if let Some(thread) = self.running_thread() {
            tracing::info!("Aborting thread {} of session {}", thread.id(), self.flow_id);
            thread.abort();
        }
    }

    fn broadcast(&self, exclude: Option<PeerId>, message: ServerMessage) {
        for participant in &self.participants {
            if Some(participant.peer.id) != exclude {
                participant.peer.send(message.clone());
            }
        }
    }

    /// Thread events skip peers whose join snapshot already includes them.
    fn broadcast_thread_event(&self, event: ThreadEvent) {
        let recipients: Vec<&Participant> = self
            .participants
            .iter()
            .filter(|p| !p.has_seen(&event))
            .collect();
        if recipients.is_empty() {
            return;
        }
        let message = ServerMessage::from(event);
        for participant in recipients {
            participant.peer.send(message.clone());
        }
    }

    fn participant_mut(&mut self, peer_id: PeerId) -> Result<&mut Participant, SessionError> {
        self.participants
            .iter_mut()
            .find(|p| p.peer.id == peer_id)
            .ok_or(SessionError::UnknownPeer(peer_id))
    }

    fn subscribe(&mut self, peer: Peer, user: User) {
        if self.participants.iter().any(|p| p.peer.id == peer.id) {
            tracing::debug!("Peer {} already subscribed to {}", peer.id, self.flow_id);
            return;
        }

        let palette = &self.config.palette;
        let color = if palette.is_empty() {
            "#888888".to_string()
        } else {
            palette[self.joined % palette.len()].clone()
        };
        self.joined += 1;
        let owner = self.owner.is_none();
        if owner {
            self.owner = Some(peer.id);
        }

        tracing::info!(
            "User {} joined session {} as {}",
            user.name,
            self.flow_id,
            color
        );

        let snapshot = self.thread.as_ref().map(Thread::snapshot);
        let participant = Participant {
            peer: peer.clone(),
            user,
            color,
            owner,
            cursor: None,
            selected: Vec::new(),
            joined_at: Utc::now(),
            replayed: snapshot.as_ref().map(|s| (s.id, s.seq)),
        };
        let joined = ServerMessage::UserJoin {
            id: peer.id,
            name: participant.user.name.clone(),
            color: participant.color.clone(),
            owner,
        };
        self.participants.push(participant);

        let snapshot = snapshot.filter(|s| s.status == ThreadStatus::Running);
        peer.send(ServerMessage::Init {
            flow_id: self.flow_id.clone(),
            you: peer.id,
            users: self.participants.iter().map(Participant::info).collect(),
            document: self.graph.to_document(),
            thread: snapshot.clone(),
        });
        if let Some(snapshot) = snapshot {
            for (id, state) in snapshot.nodes {
                if state != NodeRunState::Pending {
                    peer.send(ServerMessage::ThreadNodeState {
                        thread_id: snapshot.id,
                        id,
                        state,
                    });
                }
            }
        }

        self.broadcast(Some(peer.id), joined);
    }

    fn unsubscribe(&mut self, peer_id: PeerId) -> bool {
        let Some(index) = self.participants.iter().position(|p| p.peer.id == peer_id) else {
            return false;
        };
        let participant = self.participants.remove(index);
        tracing::info!(
            "User {} left session {} after {}s",
            participant.user.name,
            self.flow_id,
            (Utc::now() - participant.joined_at).num_seconds()
        );
        self.broadcast(None, ServerMessage::UserLeave { id: peer_id });

        if self.participants.is_empty() {
            self.abort_thread();
        }
        true
    }

    async fn on_message(&mut self, peer_id: PeerId, message: ClientMessage) {
        let mutation = message.is_mutation();
        let result = match self.apply(peer_id, message).await {
            Ok(()) if mutation => self.save().await,
            other => other,
        };
        if let Err(error) = result {
            tracing::error!("Session {}: {}", self.flow_id, error);
            self.broadcast(None, ServerMessage::error(error.to_string()));
        }
    }

    async fn save(&self) -> Result<(), SessionError> {
        self.store
            .save(&self.flow_id, &self.graph.to_document())
            .await?;
        Ok(())
    }

    async fn apply(&mut self, peer_id: PeerId, message: ClientMessage) -> Result<(), SessionError> {
        if !self.participants.iter().any(|p| p.peer.id == peer_id) {
            return Err(SessionError::UnknownPeer(peer_id));
        }
        let origin = Some(peer_id);

        match message {
            ClientMessage::Start { input } => self.start(input).await?,
            ClientMessage::Abort => {
                if let Some(thread) = self.running_thread() {
                    thread.abort();
                } else {
                    tracing::debug!("Abort requested but nothing runs in {}", self.flow_id);
                }
            }
            ClientMessage::Input { name, value } => {
                let thread = self.thread.as_ref().ok_or(SessionError::NotRunning)?;
                thread.input(name, value)?;
            }
            ClientMessage::SetMetaValue { key, value } => {
                self.graph.set_meta_value(key.clone(), value.clone());
                self.broadcast(origin, ServerMessage::Meta { key, value });
            }
            ClientMessage::CreateNode { kind, x, y } => {
                let id = self.graph.create_node(kind, Position::new(x, y));
                tracing::debug!("Created node {} in {}", id, self.flow_id);
                self.broadcast_created(&[id]);
            }
            ClientMessage::CloneNodes { id, x, y } => {
                let created = self.graph.clone_nodes(&id, Position::new(x, y));
                if !created.is_empty() {
                    self.broadcast_created(&created);
                }
            }
            ClientMessage::RemoveNodes { ids } => {
                let before = self.graph.clone();
                let removed = self.graph.remove_nodes(&ids);
                if !removed.is_empty() {
                    self.broadcast(origin, ServerMessage::NodeRemoved { ids: removed });
                    self.broadcast_input_changes(origin, &before);
                }
            }
            ClientMessage::SetNodeInputValue { id, key, value } => {
                if !self.graph.set_node_input_value(&id, &key, value.clone())? {
                    return Err(SessionError::NodeNotFound(id));
                }
                self.broadcast(origin, ServerMessage::NodeInputValueChanged { id, key, value });
            }
            ClientMessage::SetNodesPosition { positions } => {
                for position in positions {
                    let value = Value::object([
                        ("x", Value::Number(position.x)),
                        ("y", Value::Number(position.y)),
                    ]);
                    self.set_node_meta(origin, position.id, "position", value)?;
                }
            }
            ClientMessage::SetNodeLabel { id, label } => {
                let value = label.map(Value::String).unwrap_or_default();
                self.set_node_meta(origin, id, "label", value)?;
            }
            ClientMessage::SetNodeComment { id, comment } => {
                let value = comment.map(Value::String).unwrap_or_default();
                self.set_node_meta(origin, id, "comment", value)?;
            }
            ClientMessage::GetInputValueOptions { id, key, query } => {
                let options = self.input_options(&id, &key, &query).await?;
                if let Some(participant) = self.participants.iter().find(|p| p.peer.id == peer_id)
                {
                    participant
                        .peer
                        .send(ServerMessage::NodeInputOptionResult { id, key, options });
                }
            }
            ClientMessage::CreateLink {
                source_id,
                source_name,
                source_path,
                target_id,
                target_name,
                target_path,
            } => {
                let before = self.graph.clone();
                self.graph.create_link(ClientMessage::link(
                    source_id,
                    source_name,
                    source_path,
                    target_id,
                    target_name,
                    target_path,
                ))?;
                self.broadcast_input_changes(origin, &before);
            }
            ClientMessage::RemoveLink { id, name, path } => {
                let before = self.graph.clone();
                self.graph.remove_link(&id, &name, path.as_deref());
                self.broadcast_input_changes(origin, &before);
            }
            ClientMessage::SetUserPosition { x, y } => {
                self.participant_mut(peer_id)?.cursor = Some(Position::new(x, y));
                self.broadcast(origin, ServerMessage::UserPosition { id: peer_id, x, y });
            }
            ClientMessage::SetUserSelection { ids } => {
                self.participant_mut(peer_id)?.selected = ids.clone();
                self.broadcast(origin, ServerMessage::UserSelection { id: peer_id, ids });
            }
            ClientMessage::UserLeave => {
                self.unsubscribe(peer_id);
            }
        }
        Ok(())
    }

    async fn start(&mut self, input: flowcore::Sockets) -> Result<(), SessionError> {
        if self.running_thread().is_some() {
            return Err(ThreadError::InvalidState {
                expected: ThreadStatus::Idle,
                actual: ThreadStatus::Running,
            }
            .into());
        }
        let thread = self.runtime.create_thread(&self.graph).await?;
        self.forward(thread.subscribe());
        thread.start(input)?;
        tracing::info!("Session {} started thread {}", self.flow_id, thread.id());
        self.thread = Some(thread);
        Ok(())
    }

    /// Routes thread events back through the command queue until the run
    /// ends.
    fn forward(&self, mut events: mpsc::UnboundedReceiver<ThreadEvent>) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let flow_id = self.flow_id.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let last = matches!(
                    event.kind,
                    ThreadEventKind::End { .. } | ThreadEventKind::Abort
                );
                if commands.send(Command::ThreadEvent(event)).await.is_err() {
                    tracing::debug!("Session {} closed before its thread ended", flow_id);
                    break;
                }
                if last {
                    break;
                }
            }
        });
    }

    fn set_node_meta(
        &mut self,
        origin: Option<PeerId>,
        id: NodeId,
        key: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        let updated = self
            .graph
            .set_nodes_meta_value(std::slice::from_ref(&id), key, &value)?;
        if updated.is_empty() {
            return Err(SessionError::NodeNotFound(id));
        }
        self.broadcast(
            origin,
            ServerMessage::NodeMetaValueChanged {
                id,
                key: key.to_string(),
                value,
            },
        );
        Ok(())
    }

    async fn input_options(
        &self,
        id: &str,
        key: &str,
        query: &str,
    ) -> Result<Vec<Value>, SessionError> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| SessionError::NodeNotFound(id.to_string()))?;
        let component = self.runtime.component(&node.component).await;
        let options = match &component.process {
            Some(process) => process.input_options(&component.inputs, key, query).await?,
            None => filter_options(&component.inputs, key, query),
        };
        Ok(options)
    }

    /// `node:created` goes to every peer, the originator included, since
    /// only the session knows the allocated ids.
    fn broadcast_created(&self, ids: &[NodeId]) {
        let mut document = self.graph.to_document();
        let nodes: BTreeMap<NodeId, NodeDocument> = ids
            .iter()
            .filter_map(|id| document.nodes.remove_entry(id))
            .collect();
        self.broadcast(None, ServerMessage::NodeCreated { nodes });
    }

    /// Announces every input socket that differs from `before`.
    fn broadcast_input_changes(&self, origin: Option<PeerId>, before: &FlowGraph) {
        for node in self.graph.nodes() {
            let Some(old) = before.node(&node.id) else {
                continue;
            };
            let keys: BTreeSet<&String> = old.inputs.keys().chain(node.inputs.keys()).collect();
            for key in keys {
                let value = node.inputs.get(key);
                if old.inputs.get(key) != value {
                    self.broadcast(
                        origin,
                        ServerMessage::NodeInputValueChanged {
                            id: node.id.clone(),
                            key: key.clone(),
                            value: value.cloned(),
                        },
                    );
                }
            }
        }
    }
}

use flowcore::{FlowError, GraphError, NodeError, NodeId};
use flowruntime::ThreadError;
use thiserror::Error;

pub type PeerId = uuid::Uuid;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Thread error: {0}")]
    Thread(#[from] ThreadError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Document error: {0}")]
    Document(#[from] FlowError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Peer {0} is not subscribed")]
    UnknownPeer(PeerId),

    #[error("No thread is running")]
    NotRunning,

    #[error("Session {0} is closed")]
    Closed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document error: {0}")]
    Document(#[from] FlowError),

    #[error("Invalid flow id: {0}")]
    InvalidId(String),
}

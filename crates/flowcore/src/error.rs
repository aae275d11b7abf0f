use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Document error: {0}")]
    Document(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),
}

/// Kind of reference that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceKind {
    Variable,
    Secret,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Variable => f.write_str("variable"),
            ReferenceKind::Secret => f.write_str("secret"),
        }
    }
}

/// Failure of a single node. Recorded per node and never crosses the
/// thread API as a thrown error.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum NodeError {
    #[error("Missing required input: {name}")]
    MissingInput { name: String },

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("{kind} not found: {name}")]
    ReferenceNotFound { kind: ReferenceKind, name: String },

    #[error("Component {component} is not available")]
    ComponentUnavailable { component: String },

    #[error("Upstream node {node_id} failed")]
    UpstreamFailed { node_id: String },

    #[error("Execution failed: {message}")]
    Process { message: String },

    #[error("Process panicked: {message}")]
    Panicked { message: String },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    /// Wraps an arbitrary error raised inside a component's process.
    pub fn process(message: impl Into<String>) -> Self {
        NodeError::Process {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NodeError::ReferenceNotFound { .. })
    }
}

/// Errors raised by malformed graph edits and identifiers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Invalid component specifier '{input}': {reason}")]
    InvalidSpecifier { input: String, reason: String },

    #[error("Socket name '{0}' is reserved")]
    ReservedSocket(String),

    #[error("Unknown meta key: {0}")]
    UnknownMetaKey(String),

    #[error("Invalid meta value for '{key}': {reason}")]
    InvalidMetaValue { key: String, reason: String },

    #[error("Unsupported document version: {0}")]
    UnsupportedVersion(String),
}

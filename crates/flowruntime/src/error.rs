use flowcore::{ComponentSpecifier, GraphError, NodeId, ThreadStatus};
use thiserror::Error;

/// Errors crossing the thread API: construction and `start`/`input` misuse.
/// Node failures are reported on the event stream instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThreadError {
    #[error("Cyclic dependency detected at node {node_id}")]
    CyclicGraph { node_id: NodeId },

    #[error("Invalid thread state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ThreadStatus,
        actual: ThreadStatus,
    },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Recovered resolution failures, logged when the placeholder is substituted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Unresolved component: {0}")]
    UnresolvedComponent(ComponentSpecifier),
}

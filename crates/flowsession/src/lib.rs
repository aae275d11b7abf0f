//! Collaborative flow sessions
//!
//! A session owns one flow graph and its current thread, applies peer
//! commands in arrival order, fans thread events out to every subscribed
//! peer and persists the graph after each edit.

mod error;
pub mod protocol;
mod registry;
mod session;
mod store;

pub use error::{PeerId, SessionError, StoreError};
pub use protocol::{ClientMessage, NodePosition, ServerMessage, UserInfo};
pub use registry::SessionRegistry;
pub use session::{FlowId, Peer, Session, SessionConfig, SessionHandle, User};
pub use store::{FileFlowStore, FlowStore, MemoryFlowStore};

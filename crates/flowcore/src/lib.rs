//! Core abstractions for the flow engine
//!
//! This crate provides the fundamental types that all other components
//! depend on: values and socket types, component descriptors, references,
//! the flow graph model with its document form, and thread events.

mod component;
pub mod document;
mod error;
pub mod events;
mod graph;
mod reference;
mod socket;
mod value;

pub use component::{
    filter_options, Component, ComponentDescriptor, ComponentMetadata, ComponentRole,
    ComponentSpecifier, NodeOutput, Process, ProcessContext,
};
pub use document::{DocumentFormat, FlowDocument, NodeDocument};
pub use error::{FlowError, GraphError, NodeError, ReferenceKind};
pub use events::{
    EventSink, ThreadEvent, ThreadEventKind, ThreadId, ThreadStatus, TraceEmitter,
};
pub use graph::{
    FlowGraph, FlowLink, FlowNode, InputEntry, LinkSource, NodeId, NodeMeta, Position,
};
pub use reference::Reference;
pub use socket::{InputSchema, OutputSchema, SocketSchema, Type};
pub use value::Value;

/// Socket name to value map, ordered for deterministic serialization.
pub type Sockets = std::collections::BTreeMap<String, Value>;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

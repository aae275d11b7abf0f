//! Flow execution runtime
//!
//! This crate compiles flow graphs against component and reference
//! resolvers and runs them as threads: data-driven, parallel executions
//! that report progress as an ordered event stream.

mod error;
mod plan;
mod references;
mod registry;
mod resolver;
mod runtime;
mod thread;

pub use error::{ResolveError, ThreadError};
pub use references::{
    ProjectReferenceResolver, ProjectStore, ReferenceResolver, ReferenceResolverChain,
    StaticReferenceResolver,
};
pub use registry::ComponentRegistry;
pub use resolver::{CachedResolver, ComponentResolver, ComponentResolverChain};
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use thread::{NodeRunState, Thread, ThreadOutcome, ThreadSnapshot};

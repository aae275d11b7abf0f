use crate::{
    error::ThreadError,
    references::{ReferenceResolver, ReferenceResolverChain},
    registry::ComponentRegistry,
    resolver::{ComponentResolver, ComponentResolverChain},
    thread::{Thread, ThreadOutcome},
};
use flowcore::{Component, ComponentSpecifier, FlowGraph, Sockets};
use std::sync::Arc;

/// Main runtime for executing flows
#[derive(Clone)]
pub struct FlowRuntime {
    components: ComponentResolverChain,
    references: ReferenceResolverChain,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a new runtime with default settings and no resolvers
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            components: ComponentResolverChain::new(),
            references: ReferenceResolverChain::new(),
            config,
        }
    }

    /// Create a new runtime resolving components from a registry
    pub fn with_registry(registry: ComponentRegistry, config: RuntimeConfig) -> Self {
        Self::with_config(config).with_components(Arc::new(registry))
    }

    /// Append a component resolver; earlier resolvers win.
    pub fn with_components(mut self, resolver: impl ComponentResolver + 'static) -> Self {
        self.components.push(resolver);
        self
    }

    /// Append a reference resolver; earlier resolvers win.
    pub fn with_references(mut self, resolver: impl ReferenceResolver + 'static) -> Self {
        self.references = self.references.with(resolver);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn components(&self) -> &ComponentResolverChain {
        &self.components
    }

    /// Look up one component, falling back to the unavailable placeholder
    pub async fn component(&self, specifier: &ComponentSpecifier) -> Arc<Component> {
        self.components.resolve(specifier).await
    }

    /// Compile a graph into an idle thread
    pub async fn create_thread(&self, graph: &FlowGraph) -> Result<Thread, ThreadError> {
        Thread::compile(
            graph,
            &self.components,
            self.references.clone(),
            &self.config,
        )
        .await
    }

    /// Execute a graph directly and wait for the outcome
    pub async fn run(&self, graph: &FlowGraph, inputs: Sockets) -> Result<ThreadOutcome, ThreadError> {
        let thread = self.create_thread(graph).await?;
        thread.run(inputs).await
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    /// Keep runs alive for input nodes that got no value, until
    /// `Thread::input` feeds them. Otherwise such inputs starve their
    /// dependents.
    pub await_inputs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            await_inputs: false,
        }
    }
}

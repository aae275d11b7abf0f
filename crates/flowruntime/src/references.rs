use async_trait::async_trait;
use flowcore::{NodeError, Reference, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves references of one namespace.
///
/// `None` means the reference is not known here and the next resolver in
/// the chain is asked; `Some(Err(..))` is a definitive failure.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn resolve(&self, reference: &Reference) -> Option<Result<Value, NodeError>>;
}

/// Project variable and secret stores, provided by the host application.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn variable(&self, project: &str, name: &str) -> Result<Option<Value>, NodeError>;

    /// Returns the secret's cipher text.
    async fn secret(&self, project: &str, name: &str) -> Result<Option<String>, NodeError>;
}

/// Resolves `$fromVariable` / `$fromSecret` against one project.
pub struct ProjectReferenceResolver {
    project: String,
    store: Arc<dyn ProjectStore>,
}

impl ProjectReferenceResolver {
    pub fn new(project: impl Into<String>, store: Arc<dyn ProjectStore>) -> Self {
        Self {
            project: project.into(),
            store,
        }
    }
}

#[async_trait]
impl ReferenceResolver for ProjectReferenceResolver {
    async fn resolve(&self, reference: &Reference) -> Option<Result<Value, NodeError>> {
        let found = match reference {
            Reference::FromVariable { name } => self.store.variable(&self.project, name).await,
            Reference::FromSecret { name } => self
                .store
                .secret(&self.project, name)
                .await
                .map(|cipher| cipher.map(Value::String)),
        };
        match found {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

/// Fixed variables and secrets held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceResolver {
    variables: HashMap<String, Value>,
    secrets: HashMap<String, String>,
}

impl StaticReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_secret(mut self, name: impl Into<String>, cipher: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), cipher.into());
        self
    }
}

#[async_trait]
impl ReferenceResolver for StaticReferenceResolver {
    async fn resolve(&self, reference: &Reference) -> Option<Result<Value, NodeError>> {
        match reference {
            Reference::FromVariable { name } => self.variables.get(name).cloned().map(Ok),
            Reference::FromSecret { name } => {
                self.secrets.get(name).cloned().map(|s| Ok(Value::String(s)))
            }
        }
    }
}

/// Ordered reference namespaces; first answer wins.
#[derive(Clone, Default)]
pub struct ReferenceResolverChain {
    resolvers: Vec<Arc<dyn ReferenceResolver>>,
}

impl ReferenceResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl ReferenceResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub async fn resolve(&self, reference: &Reference) -> Result<Value, NodeError> {
        for resolver in &self.resolvers {
            if let Some(result) = resolver.resolve(reference).await {
                return result;
            }
        }
        Err(not_found(reference))
    }
}

fn not_found(reference: &Reference) -> NodeError {
    NodeError::ReferenceNotFound {
        kind: reference.kind(),
        name: reference.name().to_string(),
    }
}


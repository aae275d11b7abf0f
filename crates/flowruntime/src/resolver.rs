use crate::error::ResolveError;
use async_trait::async_trait;
use flowcore::{Component, ComponentSpecifier};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Locates the component definition for a specifier.
///
/// Implementations may perform I/O but must not mutate state outside
/// themselves. `None` means "not mine": the chain moves on.
#[async_trait]
pub trait ComponentResolver: Send + Sync {
    async fn resolve(&self, specifier: &ComponentSpecifier) -> Option<Arc<Component>>;
}

#[async_trait]
impl<T: ComponentResolver + ?Sized> ComponentResolver for Arc<T> {
    async fn resolve(&self, specifier: &ComponentSpecifier) -> Option<Arc<Component>> {
        (**self).resolve(specifier).await
    }
}

/// Memoizes hits of another resolver. Component definitions are immutable
/// once resolved, so one cache can be shared across sessions.
pub struct CachedResolver<R> {
    inner: R,
    cache: RwLock<HashMap<String, Arc<Component>>>,
}

impl<R: ComponentResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl<R: ComponentResolver> ComponentResolver for CachedResolver<R> {
    async fn resolve(&self, specifier: &ComponentSpecifier) -> Option<Arc<Component>> {
        let key = specifier.to_string();
        if let Some(hit) = self.cache.read().await.get(&key) {
            return Some(hit.clone());
        }
        let resolved = self.inner.resolve(specifier).await?;
        self.cache.write().await.insert(key, resolved.clone());
        Some(resolved)
    }
}

/// Ordered resolver strategies; the first hit wins and unknown kinds fall
/// back to [`Component::unavailable`].
#[derive(Clone, Default)]
pub struct ComponentResolverChain {
    resolvers: Vec<Arc<dyn ComponentResolver>>,
}

impl ComponentResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl ComponentResolver + 'static) -> Self {
        self.push(resolver);
        self
    }

    pub fn push(&mut self, resolver: impl ComponentResolver + 'static) {
        self.resolvers.push(Arc::new(resolver));
    }

    /// Never fails: misses yield the unavailable placeholder.
    pub async fn resolve(&self, specifier: &ComponentSpecifier) -> Arc<Component> {
        for resolver in &self.resolvers {
            if let Some(component) = resolver.resolve(specifier).await {
                return component;
            }
        }
        let error = ResolveError::UnresolvedComponent(specifier.clone());
        tracing::warn!("{}; substituting placeholder", error);
        Arc::new(Component::unavailable(specifier.clone()))
    }

    /// Resolves many specifiers, asking the chain once per distinct
    /// specifier string. Keys of the result are specifier strings.
    pub async fn resolve_all<'a>(
        &self,
        specifiers: impl IntoIterator<Item = &'a ComponentSpecifier>,
    ) -> HashMap<String, Arc<Component>> {
        let mut resolved = HashMap::new();
        for specifier in specifiers {
            let key = specifier.to_string();
            if resolved.contains_key(&key) {
                continue;
            }
            let component = self.resolve(specifier).await;
            resolved.insert(key, component);
        }
        resolved
    }
}

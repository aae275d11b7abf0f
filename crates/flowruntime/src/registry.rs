use crate::resolver::ComponentResolver;
use async_trait::async_trait;
use flowcore::{Component, ComponentDescriptor, ComponentSpecifier};
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory registry of installed components.
pub struct ComponentRegistry {
    components: BTreeMap<String, Arc<Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    /// Register a component under its specifier
    pub fn register(&mut self, component: Component) {
        let key = component.specifier.to_string();
        tracing::info!("Registering component: {}", key);
        self.components.insert(key, Arc::new(component));
    }

    /// Exact match first, then the untagged form of the specifier.
    pub fn get(&self, specifier: &ComponentSpecifier) -> Option<Arc<Component>> {
        self.components
            .get(&specifier.to_string())
            .or_else(|| {
                specifier
                    .tag
                    .as_ref()
                    .and_then(|_| self.components.get(&specifier.untagged().to_string()))
            })
            .cloned()
    }

    /// Get all registered specifiers
    pub fn list(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> Vec<ComponentDescriptor> {
        self.components.values().map(|c| c.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComponentResolver for ComponentRegistry {
    async fn resolve(&self, specifier: &ComponentSpecifier) -> Option<Arc<Component>> {
        self.get(specifier)
    }
}

use crate::providers::{AnalysisProvider, Specialty};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A provider plus the settings it was registered with.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub provider: Arc<dyn AnalysisProvider>,
    pub specialty: Specialty,
    pub timeout: Option<Duration>,
    pub instructions: Option<String>,
}

impl RegisteredProvider {
    pub fn id(&self) -> &str {
        self.provider.id()
    }
}

/// Providers keyed by id. Registration order is kept because the free tier uses a prefix.
pub struct ProviderRegistry {
    providers: HashMap<String, RegisteredProvider>,
    order: Vec<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register<P: AnalysisProvider + 'static>(&mut self, provider: P, specialty: Specialty) {
        self.register_entry(RegisteredProvider {
            provider: Arc::new(provider),
            specialty,
            timeout: None,
            instructions: None,
        });
    }

    /// Re-registering an id replaces the provider but keeps its original position.
    pub fn register_entry(&mut self, entry: RegisteredProvider) {
        let id = entry.id().to_string();
        if !self.providers.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.providers.insert(id, entry);
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredProvider> {
        self.providers.get(id)
    }

    pub fn provider(&self, id: &str) -> Option<Arc<dyn AnalysisProvider>> {
        self.providers.get(id).map(|entry| entry.provider.clone())
    }

    /// Entries in registration order.
    pub fn entries(&self) -> Vec<&RegisteredProvider> {
        self.order
            .iter()
            .filter_map(|id| self.providers.get(id))
            .collect()
    }

    pub fn by_specialty(&self, specialty: Specialty) -> Vec<&RegisteredProvider> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.specialty == specialty)
            .collect()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProviderRegistryBuilder {
    registry: ProviderRegistry,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::new(),
        }
    }

    pub fn with_provider<P: AnalysisProvider + 'static>(
        mut self,
        provider: P,
        specialty: Specialty,
    ) -> Self {
        self.registry.register(provider, specialty);
        self
    }

    pub fn with_entry(mut self, entry: RegisteredProvider) -> Self {
        self.registry.register_entry(entry);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        self.registry
    }
}

impl Default for ProviderRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedProvider;
    use serde_json::json;

    #[test]
    fn test_registration_order_is_preserved() {
        let registry = ProviderRegistryBuilder::new()
            .with_provider(ScriptedProvider::responding("zeta", json!({})), Specialty::Security)
            .with_provider(ScriptedProvider::responding("alpha", json!({})), Specialty::CodeQuality)
            .with_provider(ScriptedProvider::responding("mu", json!({})), Specialty::Security)
            .build();

        assert_eq!(registry.list_ids(), vec!["zeta", "alpha", "mu"]);
        assert_eq!(registry.by_specialty(Specialty::Security).len(), 2);
        assert!(registry.get("alpha").is_some());
        assert!(registry.provider("missing").is_none());
    }

    #[test]
    fn test_reregistering_keeps_position() {
        let mut registry = ProviderRegistry::new();
        registry.register(ScriptedProvider::responding("a", json!({})), Specialty::General);
        registry.register(ScriptedProvider::responding("b", json!({})), Specialty::General);
        registry.register(ScriptedProvider::failing("a", "x"), Specialty::Security);

        assert_eq!(registry.list_ids(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").map(|e| e.specialty), Some(Specialty::Security));
    }
}

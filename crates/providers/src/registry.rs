//! Model-to-adapter resolution.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::Provider;
use crate::http::HttpProvider;
use crate::stub::StubProvider;

/// Maps model identifiers to their provider adapters.
///
/// Built once at startup and shared via `Arc`. An unknown model id is a
/// terminal `NotFound` for the requesting generation, never a retry.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its model id. Replaces any previous
    /// adapter for the same model.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers
            .insert(provider.model_id().to_string(), provider);
    }

    /// Resolve the adapter for a model id.
    pub fn resolve(&self, model_id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(model_id).cloned()
    }

    /// Whether a model id is known.
    pub fn contains(&self, model_id: &str) -> bool {
        self.providers.contains_key(model_id)
    }

    /// All registered model ids, sorted.
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Build a registry from a `PROVIDER_ENDPOINTS` spec string.
    ///
    /// Format: semicolon-separated `model-id=base-url` pairs. The special
    /// value `stub` registers the deterministic in-process adapter, e.g.
    /// `demo-image=stub;flux-dev=https://flux.internal`. Malformed entries
    /// are skipped with a warning so one typo does not take down startup.
    pub fn from_spec(spec: &str) -> Self {
        let mut registry = Self::new();
        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((model_id, endpoint)) = entry.split_once('=') else {
                tracing::warn!(entry, "Skipping malformed provider entry");
                continue;
            };
            let (model_id, endpoint) = (model_id.trim(), endpoint.trim());
            if model_id.is_empty() || endpoint.is_empty() {
                tracing::warn!(entry, "Skipping malformed provider entry");
                continue;
            }
            if endpoint == "stub" {
                registry.register(Arc::new(StubProvider::completed(model_id, 1)));
            } else {
                registry.register(Arc::new(HttpProvider::new(model_id, endpoint)));
            }
        }
        registry
    }
}

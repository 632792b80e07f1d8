//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup
//! the registry reads the [`LlmConfig`], resolves authentication (env vars,
//! direct keys), and instantiates the adapter for each configured provider.

use std::collections::HashMap;
use std::sync::Arc;

use mn_domain::config::{LlmConfig, ProviderKind};
use mn_domain::error::Result;

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// Holds all instantiated LLM providers and role assignments.
///
/// Roles map a purpose (`executor` for chat turns, `embedder` for index
/// vectors) to a `"provider_id/model_name"` spec.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    roles: HashMap<String, String>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Providers that fail to initialize (usually a missing API key env
    /// var) are logged and skipped rather than aborting startup.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

        for pc in &config.providers {
            let result = match pc.kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc, config.default_timeout_ms)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        if providers.is_empty() && !config.providers.is_empty() {
            tracing::warn!(
                "no LLM providers initialized; chat and ingestion will fail until auth is configured"
            );
        }

        Ok(Self::from_providers(providers, config.roles.clone()))
    }

    /// Assemble a registry from already-built providers. `from_config` is a
    /// thin wrapper over this; tests use it to install scripted providers.
    pub fn from_providers(
        providers: HashMap<String, Arc<dyn LlmProvider>>,
        roles: HashMap<String, String>,
    ) -> Self {
        Self { providers, roles }
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Get the provider assigned to a given role. The role spec stores
    /// `"provider_id/model_name"`; the provider is keyed by the first
    /// segment.
    pub fn for_role(&self, role: &str) -> Option<Arc<dyn LlmProvider>> {
        let model_spec = self.roles.get(role)?;
        let provider_id = model_spec.split('/').next().unwrap_or(model_spec);
        self.providers.get(provider_id).cloned()
    }

    /// Get the model name assigned to a given role (the part after the
    /// first '/'), or `None` when the role is unassigned.
    pub fn model_for_role(&self, role: &str) -> Option<&str> {
        let spec = self.roles.get(role)?;
        spec.split_once('/').map(|(_, model)| model)
    }

    /// Iterate over all registered providers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LlmProvider>)> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mn_domain::config::{AuthConfig, ProviderConfig};

    fn provider_cfg(id: &str, env: &str) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "http://localhost:11434/v1".into(),
            auth: AuthConfig {
                env: Some(env.into()),
                ..Default::default()
            },
            default_model: None,
        }
    }

    #[test]
    fn missing_key_is_skipped_not_fatal() {
        let config = LlmConfig {
            providers: vec![provider_cfg("nokey", "MN_TEST_REGISTRY_MISSING_KEY")],
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn role_lookup_splits_provider_and_model() {
        std::env::set_var("MN_TEST_REGISTRY_KEY_OK", "sk-x");
        let mut config = LlmConfig {
            providers: vec![provider_cfg("local", "MN_TEST_REGISTRY_KEY_OK")],
            ..Default::default()
        };
        config
            .roles
            .insert("embedder".into(), "local/BAAI/bge-m3".into());

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.for_role("embedder").is_some());
        assert_eq!(registry.model_for_role("embedder"), Some("BAAI/bge-m3"));
        assert!(registry.for_role("planner").is_none());
        std::env::remove_var("MN_TEST_REGISTRY_KEY_OK");
    }
}

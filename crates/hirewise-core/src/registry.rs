//! Provider registry
//!
//! Built once at startup, then shared read-only behind an `Arc`. There is no
//! mutation API after construction, so lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ProviderEntry, ProviderKind, RouterConfig};
use crate::error::{RegistryError, RouterError};
use crate::providers::anthropic::AnthropicAdapter;
use crate::providers::google::GoogleAdapter;
use crate::providers::openai::OpenAiAdapter;
use crate::providers::openai_compat::OpenAiCompatAdapter;
use crate::providers::types::{ProviderAdapter, ProviderDescriptor};

/// A descriptor together with the adapter that executes calls for it
#[derive(Clone)]
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("descriptor", &self.descriptor)
            .field("kind", &self.adapter.kind())
            .field("model", &self.adapter.model())
            .finish()
    }
}

/// Registered providers, kept in registration order
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
    index: HashMap<String, usize>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider; ids must be unique
    pub fn register(
        &mut self,
        descriptor: ProviderDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), RegistryError> {
        if descriptor.id.trim().is_empty() {
            return Err(RegistryError::InvalidConfig {
                id: descriptor.id,
                reason: "provider id must not be empty".to_string(),
            });
        }
        if descriptor.timeout_ms == 0 {
            return Err(RegistryError::InvalidConfig {
                id: descriptor.id,
                reason: "timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.index.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateProvider(descriptor.id));
        }

        debug!(
            "Registering provider {} ({}/{}), tier={}, json={}, chat={}",
            descriptor.id,
            adapter.kind(),
            adapter.model(),
            descriptor.cost_tier,
            descriptor.supports_json_mode,
            descriptor.supports_chat
        );

        self.index.insert(descriptor.id.clone(), self.entries.len());
        self.entries.push(RegisteredProvider {
            descriptor,
            adapter,
        });
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_provider(
        mut self,
        descriptor: ProviderDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<Self, RegistryError> {
        self.register(descriptor, adapter)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Result<&ProviderDescriptor, RouterError> {
        self.entry(id)
            .map(|e| &e.descriptor)
            .ok_or_else(|| RouterError::ProviderNotFound(id.to_string()))
    }

    pub fn entry(&self, id: &str) -> Option<&RegisteredProvider> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Descriptors in registration order
    pub fn list(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn providers(&self) -> &[RegisteredProvider] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the registry from configuration, failing fast on bad entries.
    ///
    /// Disabled entries are skipped. An enabled entry that requires a key but
    /// has none is an error rather than a silently missing provider.
    pub fn from_config(config: &RouterConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entry in config.providers.iter().filter(|e| e.enabled) {
            let (descriptor, adapter) = build_provider(entry)?;
            registry.register(descriptor, adapter)?;
        }
        info!(
            "Provider registry ready with {} provider(s): [{}]",
            registry.len(),
            registry
                .list()
                .map(|d| d.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(registry)
    }
}

fn build_provider(
    entry: &ProviderEntry,
) -> Result<(ProviderDescriptor, Arc<dyn ProviderAdapter>), RegistryError> {
    if entry.requires_api_key && entry.api_key.trim().is_empty() {
        return Err(RegistryError::MissingCredentials(entry.id.clone()));
    }
    if entry.api_key.contains("${") {
        return Err(RegistryError::InvalidConfig {
            id: entry.id.clone(),
            reason: "api_key contains an unexpanded ${VAR} reference".to_string(),
        });
    }

    let base_url = resolve_base_url(entry)?;
    let api_key = entry.api_key.clone();
    let model = entry.model.clone();

    let adapter: Arc<dyn ProviderAdapter> = match entry.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(api_key, model, base_url, entry.max_tokens)?),
        ProviderKind::Anthropic => {
            Arc::new(AnthropicAdapter::new(api_key, model, base_url, entry.max_tokens)?)
        }
        ProviderKind::Google => Arc::new(GoogleAdapter::new(api_key, model, base_url, entry.max_tokens)?),
        ProviderKind::OpenAiCompat => Arc::new(OpenAiCompatAdapter::new(
            entry.id.clone(),
            api_key,
            model,
            base_url,
            entry.max_tokens,
        )?),
    };

    let descriptor = ProviderDescriptor {
        id: entry.id.clone(),
        supports_json_mode: entry
            .supports_json_mode
            .unwrap_or_else(|| entry.kind.default_json_mode()),
        supports_chat: entry.supports_chat,
        cost_tier: entry.cost_tier,
        max_input_tokens: entry.max_input_tokens,
        timeout_ms: entry.timeout_ms,
    };

    Ok((descriptor, adapter))
}

fn resolve_base_url(entry: &ProviderEntry) -> Result<String, RegistryError> {
    let raw = match (&entry.base_url, entry.kind.default_base_url()) {
        (Some(url), _) => url.clone(),
        (None, Some(default)) => default.to_string(),
        (None, None) => {
            return Err(RegistryError::InvalidConfig {
                id: entry.id.clone(),
                reason: "base_url is required for openai_compat providers".to_string(),
            });
        }
    };

    let parsed = url::Url::parse(&raw).map_err(|e| RegistryError::InvalidConfig {
        id: entry.id.clone(),
        reason: format!("invalid base_url '{}': {}", raw, e),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RegistryError::InvalidConfig {
            id: entry.id.clone(),
            reason: format!("base_url must be http or https, got '{}'", parsed.scheme()),
        });
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::providers::types::ProviderRequest;
    use crate::types::{CostTier, NormalizedResponse};
    use async_trait::async_trait;

    struct NullAdapter;

    #[async_trait]
    impl ProviderAdapter for NullAdapter {
        fn kind(&self) -> &str {
            "null"
        }
        fn model(&self) -> &str {
            "null-model"
        }
        async fn execute(
            &self,
            _request: &ProviderRequest,
            descriptor: &ProviderDescriptor,
        ) -> Result<NormalizedResponse, ProviderError> {
            Err(ProviderError::invalid_response(&descriptor.id, "null adapter"))
        }
    }

    fn entry(id: &str, kind: ProviderKind, api_key: &str) -> ProviderEntry {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "kind": kind,
            "api_key": api_key,
            "model": "m",
            "cost_tier": "low",
        }))
        .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ProviderRegistry::new()
            .with_provider(ProviderDescriptor::new("p1", CostTier::Low), Arc::new(NullAdapter))
            .unwrap()
            .with_provider(ProviderDescriptor::new("p2", CostTier::Mid), Arc::new(NullAdapter))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("p2").unwrap().cost_tier, CostTier::Mid);
        let ids: Vec<&str> = registry.list().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let registry = ProviderRegistry::new();
        assert!(matches!(registry.get("nope"), Err(RouterError::ProviderNotFound(id)) if id == "nope"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(ProviderDescriptor::new("p1", CostTier::Low), Arc::new(NullAdapter))
            .unwrap();
        let err = registry
            .register(ProviderDescriptor::new("p1", CostTier::High), Arc::new(NullAdapter))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateProvider("p1".to_string()));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut registry = ProviderRegistry::new();
        let err = registry
            .register(
                ProviderDescriptor::new("p1", CostTier::Low).with_timeout_ms(0),
                Arc::new(NullAdapter),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_config_missing_credentials_fails_fast() {
        let config = RouterConfig {
            providers: vec![entry("openai", ProviderKind::OpenAi, "")],
            ..Default::default()
        };
        let err = ProviderRegistry::from_config(&config).unwrap_err();
        assert_eq!(err, RegistryError::MissingCredentials("openai".to_string()));
    }

    #[test]
    fn test_from_config_rejects_unexpanded_key() {
        let config = RouterConfig {
            providers: vec![entry("openai", ProviderKind::OpenAi, "${OPENAI_API_KEY}")],
            ..Default::default()
        };
        assert!(matches!(
            ProviderRegistry::from_config(&config),
            Err(RegistryError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_from_config_skips_disabled() {
        let mut disabled = entry("claude", ProviderKind::Anthropic, "");
        disabled.enabled = false;
        let config = RouterConfig {
            providers: vec![disabled, entry("gemini", ProviderKind::Google, "AIza-key")],
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("gemini"));
        assert!(!registry.contains("claude"));
    }

    #[test]
    fn test_from_config_capability_defaults() {
        let config = RouterConfig {
            providers: vec![
                entry("claude", ProviderKind::Anthropic, "sk-ant-x"),
                entry("gpt", ProviderKind::OpenAi, "sk-x"),
            ],
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(!registry.get("claude").unwrap().supports_json_mode);
        assert!(registry.get("gpt").unwrap().supports_json_mode);
    }

    #[test]
    fn test_compat_requires_base_url() {
        let config = RouterConfig {
            providers: vec![entry("groq", ProviderKind::OpenAiCompat, "gsk")],
            ..Default::default()
        };
        assert!(matches!(
            ProviderRegistry::from_config(&config),
            Err(RegistryError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_keyless_local_provider() {
        let mut local = entry("ollama", ProviderKind::OpenAiCompat, "");
        local.requires_api_key = false;
        local.base_url = Some("http://localhost:11434/v1".to_string());
        let config = RouterConfig {
            providers: vec![local],
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.entry("ollama").unwrap().adapter.kind(), "ollama");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut e = entry("gpt", ProviderKind::OpenAi, "sk-x");
        e.base_url = Some("ftp://example.com".to_string());
        let config = RouterConfig {
            providers: vec![e],
            ..Default::default()
        };
        assert!(ProviderRegistry::from_config(&config).is_err());
    }
}

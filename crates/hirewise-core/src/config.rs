//! Routing configuration: provider entries, tier policy and retry policy
//!
//! These types deserialize straight out of the `[[providers]]`, `[routing]`,
//! `[retry]` and `[callers]` tables of the CLI config file.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CallerTier, Complexity, CostTier};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub callers: CallersConfig,
}

/// Wire family of a configured provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "openai_compat")]
    OpenAiCompat,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some(crate::providers::openai::DEFAULT_BASE_URL),
            Self::Anthropic => Some(crate::providers::anthropic::DEFAULT_BASE_URL),
            Self::Google => Some(crate::providers::google::DEFAULT_BASE_URL),
            Self::OpenAiCompat => None,
        }
    }

    /// Anthropic has no native JSON mode, so it is opt-in
    pub fn default_json_mode(&self) -> bool {
        !matches!(self, Self::Anthropic)
    }
}

/// One `[[providers]]` entry
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    /// Local OpenAI-compatible servers (Ollama, LM Studio) run without keys
    #[serde(default = "default_true")]
    pub requires_api_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_json_mode: Option<bool>,
    #[serde(default = "default_true")]
    pub supports_chat: bool,
    pub cost_tier: CostTier,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("cost_tier", &self.cost_tier)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn default_true() -> bool {
    true
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_input_tokens() -> u32 {
    128_000
}
fn default_timeout_ms() -> u64 {
    60_000
}

/// `[routing]`: tier policy and defaults applied to every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Highest cost tier a free caller may be routed to
    #[serde(default = "default_free_tier_max_cost")]
    pub free_tier_max_cost: CostTier,
    /// Complexity used to resolve chat session routes
    #[serde(default = "default_chat_complexity")]
    pub chat_complexity: Complexity,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
}

fn default_free_tier_max_cost() -> CostTier {
    CostTier::Mid
}
fn default_chat_complexity() -> Complexity {
    Complexity::Medium
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            free_tier_max_cost: default_free_tier_max_cost(),
            chat_complexity: default_chat_complexity(),
            default_temperature: default_temperature(),
        }
    }
}

/// `[retry]`: same-provider retries before falling back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_provider: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_base_delay_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_provider: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// `[callers]`: plan tier per caller id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallersConfig {
    /// Tier for identified callers without an explicit entry
    #[serde(default = "default_caller_tier")]
    pub default_tier: CallerTier,
    #[serde(default)]
    pub tiers: HashMap<String, CallerTier>,
}

fn default_caller_tier() -> CallerTier {
    CallerTier::Free
}

impl Default for CallersConfig {
    fn default() -> Self {
        Self {
            default_tier: default_caller_tier(),
            tiers: HashMap::new(),
        }
    }
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-...ijkl");
    }

    #[test]
    fn test_provider_entry_defaults() {
        let entry: ProviderEntry = serde_json::from_value(serde_json::json!({
            "id": "groq",
            "kind": "openai_compat",
            "model": "llama-3.3-70b",
            "cost_tier": "low"
        }))
        .unwrap();
        assert!(entry.enabled);
        assert!(entry.requires_api_key);
        assert!(entry.supports_chat);
        assert_eq!(entry.supports_json_mode, None);
        assert_eq!(entry.timeout_ms, 60_000);
        assert_eq!(entry.max_tokens, 4096);
    }

    #[test]
    fn test_provider_entry_debug_masks_key() {
        let entry: ProviderEntry = serde_json::from_value(serde_json::json!({
            "id": "openai",
            "kind": "openai",
            "api_key": "sk-proj-verysecretvalue",
            "model": "gpt-4o",
            "cost_tier": "high"
        }))
        .unwrap();
        let debug = format!("{:?}", entry);
        assert!(!debug.contains("verysecret"));
    }

    #[test]
    fn test_routing_defaults() {
        let cfg = RouterConfig::default();
        assert_eq!(cfg.routing.free_tier_max_cost, CostTier::Mid);
        assert_eq!(cfg.routing.chat_complexity, Complexity::Medium);
        assert_eq!(cfg.retry.max_attempts_per_provider, 1);
        assert_eq!(cfg.callers.default_tier, CallerTier::Free);
    }

    #[test]
    fn test_json_mode_defaults_by_kind() {
        assert!(ProviderKind::OpenAi.default_json_mode());
        assert!(ProviderKind::Google.default_json_mode());
        assert!(!ProviderKind::Anthropic.default_json_mode());
        assert!(ProviderKind::OpenAiCompat.default_base_url().is_none());
    }
}

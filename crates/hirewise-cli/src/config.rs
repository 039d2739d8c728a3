use anyhow::{Context, Result};
use hirewise_core::config::{
    CallersConfig, ProviderEntry, RetryConfig, RouterConfig, RoutingConfig, mask_secret,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HirewiseConfig {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub callers: CallersConfig,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hirewise")
}

impl HirewiseConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        check_permissions(&path)?;

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `hirewise init` first.",
                path.display()
            )
        })?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        for id in hardcoded_key_providers(&content) {
            warn!(
                "API key for provider '{}' is hardcoded in config file. For security, use environment variables: api_key = \"${{{}}}\"",
                id,
                suggested_env_var(&id)
            );
        }

        Ok(config)
    }

    /// Expand allowlisted env vars and parse
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content, |name| std::env::var(name).ok());
        Ok(toml::from_str(&expanded)?)
    }

    /// Routing config with unusable providers switched off. A provider whose
    /// key expanded to nothing is skipped with a warning instead of failing
    /// the whole registry.
    pub fn router_config(&self) -> RouterConfig {
        let providers = self
            .providers
            .iter()
            .cloned()
            .map(|mut entry| {
                if entry.enabled && entry.requires_api_key && entry.api_key.trim().is_empty() {
                    warn!(
                        "Provider '{}' has no API key, skipping it (set {} to enable)",
                        entry.id,
                        suggested_env_var(&entry.id)
                    );
                    entry.enabled = false;
                }
                entry
            })
            .collect();

        RouterConfig {
            providers,
            routing: self.routing.clone(),
            retry: self.retry.clone(),
            callers: self.callers.clone(),
        }
    }

    /// Copy safe to print: every key masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for entry in &mut copy.providers {
            entry.api_key = mask_secret(&entry.api_key);
        }
        copy
    }
}

/// Refuse config files readable by group or other (Unix only)
fn check_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(anyhow::anyhow!(
                    "Config file {:?} has overly permissive permissions ({:o}). \
                     It may contain secrets. Fix with: chmod 600 {:?}",
                    path,
                    mode & 0o777,
                    path
                ));
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Providers whose `api_key` is a literal in the unexpanded file text
fn hardcoded_key_providers(raw: &str) -> Vec<String> {
    toml::from_str::<HirewiseConfig>(raw)
        .map(|cfg| {
            cfg.providers
                .into_iter()
                .filter(|p| looks_hardcoded(&p.api_key))
                .map(|p| p.id)
                .collect()
        })
        .unwrap_or_default()
}

fn looks_hardcoded(key: &str) -> bool {
    !key.is_empty() && !key.contains("${")
}

fn suggested_env_var(provider_id: &str) -> String {
    format!(
        "{}_API_KEY",
        provider_id
            .to_uppercase()
            .replace(|c: char| !c.is_ascii_alphanumeric(), "_")
    )
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GOOGLE_AI_API_KEY",
    "GROQ_API_KEY",
    "DEEPSEEK_API_KEY",
    "OPENROUTER_API_KEY",
    "CUSTOM_LLM_API_KEY",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = lookup(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

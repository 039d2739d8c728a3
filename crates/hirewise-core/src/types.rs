//! Request, response and routing value types shared by callers and the core

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RouterError;

/// Caller-declared hint biasing selection toward cheaper or more capable models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Complexity {
    /// Cost tier the selector tries first for this complexity
    pub fn preferred_tier(&self) -> CostTier {
        match self {
            Self::Easy => CostTier::Low,
            Self::Medium => CostTier::Mid,
            Self::Hard => CostTier::High,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Complexity {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(RouterError::InvalidRequest(format!(
                "unknown complexity '{}', expected easy, medium or hard",
                other
            ))),
        }
    }
}

/// Relative spend class of a provider; ordered cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    #[default]
    Low,
    Mid,
    High,
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Mid => write!(f, "mid"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Output shape the caller asks the provider for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

impl ResponseFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Either let the selector decide, or hard-pin one provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderOverride {
    #[default]
    Auto,
    Pinned(String),
}

impl FromStr for ProviderOverride {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            Ok(Self::Pinned(trimmed.to_string()))
        }
    }
}

impl fmt::Display for ProviderOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Pinned(id) => write!(f, "{}", id),
        }
    }
}

/// Plan tier of the caller on whose behalf a request runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerTier {
    Free,
    #[default]
    Premium,
}

impl fmt::Display for CallerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

/// Message role in a chat transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single-shot generation request
///
/// Built with [`GenerationRequest::new`] and the `with_*` setters. Callers
/// without a caller id run on the premium route.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub complexity: Complexity,
    pub provider_override: ProviderOverride,
    pub response_format: ResponseFormat,
    pub temperature: Option<f32>,
    pub caller_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: None,
            complexity: Complexity::default(),
            provider_override: ProviderOverride::Auto,
            response_format: ResponseFormat::Text,
            temperature: None,
            caller_id: None,
        }
    }

    pub fn with_system_instruction(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_override(mut self, provider_override: ProviderOverride) -> Self {
        self.provider_override = provider_override;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn json(self) -> Self {
        self.with_response_format(ResponseFormat::Json)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_caller(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    /// Check caller input before any routing happens
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.prompt.trim().is_empty() {
            return Err(RouterError::InvalidRequest("prompt must not be empty".to_string()));
        }
        if let Some(t) = self.temperature {
            validate_temperature(t)?;
        }
        Ok(())
    }

    /// Rough input size in tokens, used for capability filtering
    pub fn estimated_input_tokens(&self) -> u32 {
        let system_len = self.system_instruction.as_deref().map_or(0, str::len);
        estimate_tokens(self.prompt.len() + system_len)
    }
}

pub(crate) fn validate_temperature(t: f32) -> Result<(), RouterError> {
    if !(0.0..=2.0).contains(&t) {
        return Err(RouterError::InvalidRequest(format!(
            "temperature {} is outside 0.0..=2.0",
            t
        )));
    }
    Ok(())
}

/// ~4 bytes per token is close enough for capacity checks
pub(crate) fn estimate_tokens(bytes: usize) -> u32 {
    u32::try_from(bytes.div_ceil(4)).unwrap_or(u32::MAX)
}

/// Provider-agnostic result handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub text: String,
    pub provider_id: String,
    pub latency_ms: u64,
    pub tokens_used: Option<u32>,
}

/// Ordered provider ids to attempt, most preferred first
///
/// A pinned decision came from an explicit override and never falls back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteDecision {
    pub providers: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl RouteDecision {
    pub fn auto(providers: Vec<String>) -> Self {
        Self {
            providers,
            pinned: false,
        }
    }

    pub fn pinned(provider: impl Into<String>) -> Self {
        Self {
            providers: vec![provider.into()],
            pinned: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn primary(&self) -> Option<&str> {
        self.providers.first().map(String::as_str)
    }

    /// Keep only the primary and disable fallback, for sessions that must
    /// never switch provider between turns
    pub fn pin_primary(self) -> Self {
        Self {
            providers: self.providers.into_iter().take(1).collect(),
            pinned: true,
        }
    }
}

//! Anthropic Claude provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{ProviderError, RegistryError};
use crate::types::{ChatRole, NormalizedResponse};

use super::types::{ProviderAdapter, ProviderDescriptor, ProviderRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Appended to the system prompt when the caller asked for JSON; the
/// messages API has no native JSON mode.
const JSON_DIRECTIVE: &str =
    "Respond with a single valid JSON object only. Do not wrap it in markdown or add commentary.";

/// Anthropic Claude provider
pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicAdapter {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
    ) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RegistryError::InvalidConfig {
                id: model.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
        })
    }

    /// Convert the generic request to Anthropic wire format.
    ///
    /// System turns move to the top-level `system` field; consecutive turns
    /// with the same role are merged because the API requires alternation.
    fn to_anthropic_messages(request: &ProviderRequest) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();
        for msg in request.conversation() {
            let role = match msg.role {
                ChatRole::Assistant => "assistant",
                ChatRole::User | ChatRole::System => "user",
            };
            match result.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&msg.content);
                }
                _ => result.push(AnthropicMessage {
                    role: role.to_string(),
                    content: msg.content.clone(),
                }),
            }
        }
        result
    }

    fn system_for(request: &ProviderRequest) -> Option<String> {
        let system = request.system_prompt();
        if !request.response_format.is_json() {
            return system;
        }
        Some(match system {
            Some(s) => format!("{}\n\n{}", s, JSON_DIRECTIVE),
            None => JSON_DIRECTIVE.to_string(),
        })
    }

    fn build_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": request.temperature.min(1.0),
            "messages": Self::to_anthropic_messages(request),
        });
        if let Some(system) = Self::system_for(request) {
            body["system"] = serde_json::Value::String(system);
        }
        body
    }

    /// Concatenate text blocks from the Anthropic envelope
    fn from_anthropic_response(
        provider_id: &str,
        resp: AnthropicApiResponse,
    ) -> Result<(String, Option<u32>), ProviderError> {
        let text: String = resp
            .content
            .iter()
            .filter_map(|b| match b {
                AnthropicBlock::Text { text } => Some(text.as_str()),
                AnthropicBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::invalid_response(
                provider_id,
                format!("response had no text blocks (stop_reason={:?})", resp.stop_reason),
            ));
        }

        let tokens = resp.usage.map(|u| u.input_tokens + u.output_tokens);
        Ok((text, tokens))
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn execute(
        &self,
        request: &ProviderRequest,
        descriptor: &ProviderDescriptor,
    ) -> Result<NormalizedResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(request);
        let started = Instant::now();

        debug!(
            "Anthropic request: provider={}, model={}, messages={}",
            descriptor.id,
            self.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(descriptor.timeout())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&descriptor.id, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            // 529 is Anthropic's "overloaded" signal
            if status.as_u16() == 529 {
                return Err(ProviderError::new(
                    crate::error::ProviderErrorKind::RateLimited,
                    &descriptor.id,
                    format!("status {}: {}", status, error_text),
                ));
            }
            return Err(ProviderError::from_status(&descriptor.id, status, &error_text));
        }

        let api_response: AnthropicApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(&descriptor.id, &e))?;

        debug!(
            "Anthropic response: provider={}, blocks={}, stop_reason={:?}",
            descriptor.id,
            api_response.content.len(),
            api_response.stop_reason
        );

        let (text, tokens_used) = Self::from_anthropic_response(&descriptor.id, api_response)?;

        Ok(NormalizedResponse {
            text,
            provider_id: descriptor.id.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
            tokens_used,
        })
    }
}

// ── Anthropic wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicApiResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

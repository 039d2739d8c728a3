//! Google Gemini provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{ProviderError, RegistryError};
use crate::types::{ChatRole, NormalizedResponse};

use super::types::{ProviderAdapter, ProviderDescriptor, ProviderRequest};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider
pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for GoogleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAdapter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl GoogleAdapter {
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

    /// Convert the generic request to Gemini wire format
    fn to_gemini_contents(request: &ProviderRequest) -> Vec<GeminiContent> {
        request
            .conversation()
            .map(|m| {
                let role = match m.role {
                    ChatRole::Assistant => "model",
                    ChatRole::User | ChatRole::System => "user",
                };
                GeminiContent {
                    role: role.to_string(),
                    parts: vec![GeminiPart {
                        text: Some(m.content.clone()),
                    }],
                }
            })
            .collect()
    }

    fn build_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut generation_config = serde_json::json!({
            "maxOutputTokens": self.max_tokens,
            "temperature": request.temperature,
        });
        if request.response_format.is_json() {
            generation_config["responseMimeType"] =
                serde_json::Value::String("application/json".to_string());
        }

        let mut body = serde_json::json!({
            "contents": Self::to_gemini_contents(request),
            "generationConfig": generation_config,
        });
        if let Some(system) = request.system_prompt() {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }
        body
    }

    /// Join the text parts of the first candidate
    fn from_gemini_response(
        provider_id: &str,
        resp: GeminiApiResponse,
    ) -> Result<(String, Option<u32>), ProviderError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response(provider_id, "response had no candidates"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::invalid_response(
                provider_id,
                format!(
                    "candidate had no text (finish_reason={:?})",
                    candidate.finish_reason
                ),
            ));
        }

        let tokens = resp.usage_metadata.and_then(|u| u.total_token_count);
        Ok((text, tokens))
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn kind(&self) -> &str {
        "google"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn execute(
        &self,
        request: &ProviderRequest,
        descriptor: &ProviderDescriptor,
    ) -> Result<NormalizedResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_body(request);
        let started = Instant::now();

        debug!(
            "Gemini request: provider={}, model={}, messages={}",
            descriptor.id,
            self.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(descriptor.timeout())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
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
            return Err(ProviderError::from_status(&descriptor.id, status, &error_text));
        }

        let api_response: GeminiApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(&descriptor.id, &e))?;

        debug!(
            "Gemini response: provider={}, candidates={}",
            descriptor.id,
            api_response.candidates.len()
        );

        let (text, tokens_used) = Self::from_gemini_response(&descriptor.id, api_response)?;

        Ok(NormalizedResponse {
            text,
            provider_id: descriptor.id.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
            tokens_used,
        })
    }
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use crate::types::{ChatMessage, CostTier, ResponseFormat};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base_url: &str) -> GoogleAdapter {
        GoogleAdapter::new(
            "AIza-secret".to_string(),
            "gemini-2.0-flash".to_string(),
            base_url.to_string(),
            1024,
        )
        .unwrap()
    }

    #[test]
    fn test_assistant_maps_to_model_role() {
        let req = ProviderRequest::chat(
            &[
                ChatMessage::system("persona"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
            ],
            0.7,
        );
        let contents = GoogleAdapter::to_gemini_contents(&req);
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1].role, "model");
    }

    #[test]
    fn test_json_mode_sets_mime_type() {
        let req = ProviderRequest::completion("x", Some("sys"), ResponseFormat::Json, 0.2);
        let body = adapter("http://localhost").build_body(&req);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
    }

    #[test]
    fn test_no_candidates_is_invalid() {
        let resp = GeminiApiResponse {
            candidates: vec![],
            usage_metadata: None,
        };
        let err = GoogleAdapter::from_gemini_response("gemini", resp).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidResponse);
    }

    #[test]
    fn test_google_adapter_debug_hides_key() {
        let debug = format!("{:?}", adapter(DEFAULT_BASE_URL));
        assert!(!debug.contains("AIza-secret"));
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "AIza-secret"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{\"score\":"}, {"text": "80}"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "totalTokenCount": 20}
            })))
            .mount(&server)
            .await;

        let req = ProviderRequest::completion("cv", None, ResponseFormat::Json, 0.2);
        let d = ProviderDescriptor::new("gemini", CostTier::Low);
        let resp = adapter(&server.uri()).execute(&req, &d).await.unwrap();
        assert_eq!(resp.text, "{\"score\":80}");
        assert_eq!(resp.tokens_used, Some(20));
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let req = ProviderRequest::completion("cv", None, ResponseFormat::Text, 0.2);
        let d = ProviderDescriptor::new("gemini", CostTier::Low);
        let err = adapter(&server.uri()).execute(&req, &d).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::AuthFailure);
    }
}

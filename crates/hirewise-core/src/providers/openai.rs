//! OpenAI chat-completions provider (GPT-4o, o3, etc.)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{ProviderError, RegistryError};
use crate::types::{ChatRole, NormalizedResponse};

use super::types::{ProviderAdapter, ProviderDescriptor, ProviderRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider
pub struct OpenAiAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiAdapter {
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

    /// Convert the generic request to OpenAI wire format
    fn to_openai_messages(request: &ProviderRequest) -> Vec<OpenAiMessage> {
        let mut result = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = request.system_prompt() {
            result.push(OpenAiMessage {
                role: "system".to_string(),
                content: system,
            });
        }

        for msg in request.conversation() {
            let role = match msg.role {
                ChatRole::Assistant => "assistant",
                ChatRole::User | ChatRole::System => "user",
            };
            result.push(OpenAiMessage {
                role: role.to_string(),
                content: msg.content.clone(),
            });
        }

        result
    }

    fn build_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let messages = Self::to_openai_messages(request);
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });

        if request.response_format.is_json() {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    /// Pull the text payload out of the OpenAI envelope
    fn from_openai_response(
        provider_id: &str,
        resp: OpenAiApiResponse,
    ) -> Result<(String, Option<u32>), ProviderError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response(provider_id, "response had no choices"))?;

        let text = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::invalid_response(
                    provider_id,
                    format!(
                        "response had no text content (finish_reason={:?})",
                        choice.finish_reason
                    ),
                )
            })?;

        Ok((text, resp.usage.map(|u| u.total_tokens)))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn execute(
        &self,
        request: &ProviderRequest,
        descriptor: &ProviderDescriptor,
    ) -> Result<NormalizedResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(request);
        let started = Instant::now();

        debug!(
            "OpenAI request: provider={}, model={}, messages={}, json={}",
            descriptor.id,
            self.model,
            request.messages.len(),
            request.response_format.is_json()
        );

        let mut builder = self
            .client
            .post(&url)
            .timeout(descriptor.timeout())
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
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

        let api_response: OpenAiApiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::from_transport(&descriptor.id, &e)
            } else {
                ProviderError::invalid_response(&descriptor.id, format!("unparsable body: {}", e))
            }
        })?;

        debug!(
            "OpenAI response: provider={}, choices={}",
            descriptor.id,
            api_response.choices.len()
        );

        let (text, tokens_used) = Self::from_openai_response(&descriptor.id, api_response)?;

        Ok(NormalizedResponse {
            text,
            provider_id: descriptor.id.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
            tokens_used,
        })
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiUsage {
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use crate::types::{ChatMessage, CostTier, ResponseFormat};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base_url: &str) -> OpenAiAdapter {
        OpenAiAdapter::new(
            "sk-test".to_string(),
            "gpt-4o-mini".to_string(),
            base_url.to_string(),
            1024,
        )
        .unwrap()
    }

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor::new("openai", CostTier::Mid).with_timeout_ms(2_000)
    }

    #[test]
    fn test_to_openai_messages_with_system_instruction() {
        let req = ProviderRequest::completion("hello", Some("You are helpful."), ResponseFormat::Text, 0.7);
        let result = OpenAiAdapter::to_openai_messages(&req);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].role, "system");
        assert_eq!(result[0].content, "You are helpful.");
        assert_eq!(result[1].role, "user");
    }

    #[test]
    fn test_to_openai_messages_chat_transcript() {
        let req = ProviderRequest::chat(
            &[
                ChatMessage::system("persona"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("next"),
            ],
            0.7,
        );
        let result = OpenAiAdapter::to_openai_messages(&req);
        let roles: Vec<&str> = result.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let a = adapter("http://localhost");
        let req = ProviderRequest::completion("x", None, ResponseFormat::Json, 0.2);
        let body = a.build_body(&req);
        assert_eq!(body["response_format"]["type"], "json_object");
        let req = ProviderRequest::completion("x", None, ResponseFormat::Text, 0.2);
        assert!(a.build_body(&req).get("response_format").is_none());
    }

    #[test]
    fn test_from_openai_response_no_choices() {
        let resp = OpenAiApiResponse {
            choices: vec![],
            usage: None,
        };
        let err = OpenAiAdapter::from_openai_response("openai", resp).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidResponse);
    }

    #[test]
    fn test_openai_adapter_debug_hides_key() {
        let a = adapter("https://api.openai.com/v1");
        let debug = format!("{:?}", a);
        assert!(!debug.contains("sk-test"));
    }

    #[tokio::test]
    async fn test_execute_extracts_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"ok\":true}"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
            })))
            .mount(&server)
            .await;

        let req = ProviderRequest::completion("hi", None, ResponseFormat::Json, 0.2);
        let resp = adapter(&server.uri()).execute(&req, &descriptor()).await.unwrap();
        assert_eq!(resp.text, "{\"ok\":true}");
        assert_eq!(resp.provider_id, "openai");
        assert_eq!(resp.tokens_used, Some(14));
    }

    #[tokio::test]
    async fn test_execute_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let req = ProviderRequest::completion("hi", None, ResponseFormat::Text, 0.7);
        let err = adapter(&server.uri()).execute(&req, &descriptor()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert_eq!(err.provider_id, "openai");
    }

    #[tokio::test]
    async fn test_execute_maps_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let req = ProviderRequest::completion("hi", None, ResponseFormat::Text, 0.7);
        let err = adapter(&server.uri()).execute(&req, &descriptor()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::AuthFailure);
    }

    #[tokio::test]
    async fn test_execute_enforces_descriptor_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let req = ProviderRequest::completion("hi", None, ResponseFormat::Text, 0.7);
        let short = ProviderDescriptor::new("openai", CostTier::Mid).with_timeout_ms(50);
        let err = adapter(&server.uri()).execute(&req, &short).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_execute_garbage_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let req = ProviderRequest::completion("hi", None, ResponseFormat::Text, 0.7);
        let err = adapter(&server.uri()).execute(&req, &descriptor()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidResponse);
    }
}

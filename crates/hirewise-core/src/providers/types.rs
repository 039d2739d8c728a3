//! Provider-facing types: capability descriptors and the adapter trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{ChatMessage, ChatRole, CostTier, NormalizedResponse, ResponseFormat};

/// Capability metadata for one registered provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub supports_json_mode: bool,
    pub supports_chat: bool,
    pub cost_tier: CostTier,
    pub max_input_tokens: u32,
    pub timeout_ms: u64,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, cost_tier: CostTier) -> Self {
        Self {
            id: id.into(),
            supports_json_mode: true,
            supports_chat: true,
            cost_tier,
            max_input_tokens: 128_000,
            timeout_ms: 60_000,
        }
    }

    pub fn with_json_mode(mut self, supported: bool) -> Self {
        self.supports_json_mode = supported;
        self
    }

    pub fn with_chat(mut self, supported: bool) -> Self {
        self.supports_chat = supported;
        self
    }

    pub fn with_max_input_tokens(mut self, max: u32) -> Self {
        self.max_input_tokens = max;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// User turn inserted when a chat transcript has no turns or opens with the
/// assistant; Anthropic and Gemini require the conversation to start with a
/// user turn
pub const OPENING_TURN: &str = "Please begin.";

/// Whether a call came in through `route_request` or `chat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Completion,
    Chat,
}

/// The generic request an adapter translates into its native wire shape
///
/// Completions arrive as a single user message plus an optional system
/// instruction; chats carry the caller's transcript, system turns included.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub mode: CallMode,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
    pub temperature: f32,
}

impl ProviderRequest {
    pub fn completion(
        prompt: &str,
        system: Option<&str>,
        response_format: ResponseFormat,
        temperature: f32,
    ) -> Self {
        Self {
            mode: CallMode::Completion,
            system: system.map(str::to_string),
            messages: vec![ChatMessage::user(prompt)],
            response_format,
            temperature,
        }
    }

    pub fn chat(messages: &[ChatMessage], temperature: f32) -> Self {
        let mut messages = messages.to_vec();
        let first_turn = messages.iter().position(|m| m.role != ChatRole::System);
        match first_turn {
            Some(idx) if messages[idx].role == ChatRole::User => {}
            Some(idx) => messages.insert(idx, ChatMessage::user(OPENING_TURN)),
            None => messages.push(ChatMessage::user(OPENING_TURN)),
        }
        Self {
            mode: CallMode::Chat,
            system: None,
            messages,
            response_format: ResponseFormat::Text,
            temperature,
        }
    }

    /// Explicit system instruction and any system turns, joined in order
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .system
            .as_deref()
            .into_iter()
            .chain(
                self.messages
                    .iter()
                    .filter(|m| m.role == ChatRole::System)
                    .map(|m| m.content.as_str()),
            )
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Non-system turns, for providers that take the system prompt separately
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != ChatRole::System)
    }
}

/// Trait that every backing provider implements
///
/// `execute` must honor `descriptor.timeout_ms` as a hard deadline and map
/// every failure into a [`ProviderError`] kind.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Wire family (e.g. "openai", "anthropic")
    fn kind(&self) -> &str;

    /// Model identifier sent to the provider
    fn model(&self) -> &str;

    async fn execute(
        &self,
        request: &ProviderRequest,
        descriptor: &ProviderDescriptor,
    ) -> Result<NormalizedResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_shape() {
        let req = ProviderRequest::completion("hello", Some("be brief"), ResponseFormat::Json, 0.2);
        assert_eq!(req.mode, CallMode::Completion);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, ChatRole::User);
        assert_eq!(req.system_prompt().as_deref(), Some("be brief"));
    }

    #[test]
    fn test_chat_system_turns_are_collected() {
        let msgs = vec![
            ChatMessage::system("persona"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ];
        let req = ProviderRequest::chat(&msgs, 0.7);
        assert_eq!(req.system_prompt().as_deref(), Some("persona"));
        assert_eq!(req.conversation().count(), 2);
    }

    #[test]
    fn test_system_only_chat_gets_opening_turn() {
        let req = ProviderRequest::chat(&[ChatMessage::system("persona")], 0.7);
        let turns: Vec<&ChatMessage> = req.conversation().collect();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[0].content, OPENING_TURN);
    }

    #[test]
    fn test_assistant_first_chat_gets_opening_turn() {
        let req = ProviderRequest::chat(
            &[
                ChatMessage::system("persona"),
                ChatMessage::assistant("Hi, I'm Alex."),
                ChatMessage::user("Hello"),
            ],
            0.7,
        );
        let roles: Vec<ChatRole> = req.conversation().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant, ChatRole::User]);
    }

    #[test]
    fn test_no_system_prompt() {
        let req = ProviderRequest::chat(&[ChatMessage::user("hi")], 0.7);
        assert!(req.system_prompt().is_none());
    }

    #[test]
    fn test_descriptor_builders() {
        let d = ProviderDescriptor::new("groq", CostTier::Low)
            .with_json_mode(false)
            .with_timeout_ms(1500);
        assert!(!d.supports_json_mode);
        assert!(d.supports_chat);
        assert_eq!(d.timeout(), std::time::Duration::from_millis(1500));
    }
}

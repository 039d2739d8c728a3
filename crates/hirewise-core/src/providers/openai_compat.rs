//! OpenAI-compatible provider for Groq, DeepSeek, OpenRouter, Ollama, etc.
//!
//! Reuses the OpenAI wire format with a configurable base URL.

use async_trait::async_trait;

use crate::error::{ProviderError, RegistryError};
use crate::types::NormalizedResponse;

use super::openai::OpenAiAdapter;
use super::types::{ProviderAdapter, ProviderDescriptor, ProviderRequest};

/// OpenAI-compatible provider; wraps [`OpenAiAdapter`] with a custom name
pub struct OpenAiCompatAdapter {
    inner: OpenAiAdapter,
    name: String,
}

impl std::fmt::Debug for OpenAiCompatAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatAdapter")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

impl OpenAiCompatAdapter {
    /// Create a new OpenAI-compatible adapter.
    ///
    /// - `name`: human-readable label (e.g. "groq", "deepseek", "ollama")
    /// - `base_url`: the endpoint root including the version segment
    ///   (e.g. `https://api.groq.com/openai/v1`)
    pub fn new(
        name: String,
        api_key: String,
        model: String,
        base_url: String,
        max_tokens: u32,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            inner: OpenAiAdapter::new(api_key, model, base_url, max_tokens)?,
            name,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn kind(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn execute(
        &self,
        request: &ProviderRequest,
        descriptor: &ProviderDescriptor,
    ) -> Result<NormalizedResponse, ProviderError> {
        self.inner.execute(request, descriptor).await
    }
}

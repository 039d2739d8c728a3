//! Provider adapters
//!
//! Supports OpenAI, Anthropic, Google Gemini, and any OpenAI-compatible endpoint.
//! Adapters implement the [`ProviderAdapter`] trait and are registered in a
//! [`ProviderRegistry`](crate::registry::ProviderRegistry) alongside their
//! [`ProviderDescriptor`].

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod openai_compat;
pub mod types;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAiAdapter;
pub use openai_compat::OpenAiCompatAdapter;
pub use types::{CallMode, ProviderAdapter, ProviderDescriptor, ProviderRequest};

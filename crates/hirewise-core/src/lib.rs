//! hirewise-core - Provider routing for the hirewise career tools
//!
//! This crate provides:
//! - Provider registry holding capability descriptors and adapters
//! - Route selection by complexity, cost tier, JSON mode and caller plan
//! - Adapters for OpenAI, Anthropic, Google Gemini and OpenAI-compatible APIs
//! - [`AiRouter`], which runs requests with sequential fallback and timeouts

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod selector;
pub mod types;

// Re-export main types for convenience
pub use config::{ProviderEntry, ProviderKind, RouterConfig};
pub use error::{ProviderError, ProviderErrorKind, RegistryError, RouterError};
pub use orchestrator::{AiRouter, RetryPolicy};
pub use providers::{ProviderAdapter, ProviderDescriptor, ProviderRequest};
pub use registry::{ProviderRegistry, RegisteredProvider};
pub use selector::{StaticTierResolver, TierPolicy, TierResolver, select_route};
pub use types::{
    CallerTier, ChatMessage, ChatRole, Complexity, CostTier, GenerationRequest,
    NormalizedResponse, ProviderOverride, ResponseFormat, RouteDecision,
};

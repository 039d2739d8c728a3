//! hirewise-coach - CV and interview services on top of the provider router
//!
//! Both coaches hold a shared [`AiRouter`](hirewise_core::AiRouter) and never
//! talk to a provider directly:
//! - [`CareerCoach`] scores, rewrites and drafts CVs
//! - [`InterviewCoach`] runs mock interviews pinned to one chat route
//! - [`AccountType`] maps sign-up kinds onto routing plan tiers

pub mod account;
pub mod career;
pub mod error;
pub mod interview;
pub mod payload;

pub use account::AccountType;
pub use career::{
    ANALYSIS_FALLBACK, CareerCoach, CvAnalysis, CvProfile, CvRewrite, GENERATED_CV_FALLBACK,
    GeneratedCv, Market, MatchLevel,
};
pub use error::CoachError;
pub use interview::{INTERVIEW_FALLBACK_REPLY, InterviewCoach, InterviewMode, InterviewSession};
pub use payload::{PayloadError, parse_payload, strip_code_fences};

/// Longest prefix of `text` holding at most `max` characters
pub(crate) fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use hirewise_core::{
        AiRouter, CostTier, NormalizedResponse, ProviderAdapter, ProviderDescriptor,
        ProviderError, ProviderErrorKind, ProviderRegistry, ProviderRequest,
    };

    /// Adapter that answers with canned text and records every request
    pub struct CannedAdapter {
        reply: Result<String, ProviderErrorKind>,
        pub seen: Mutex<Vec<ProviderRequest>>,
    }

    impl CannedAdapter {
        pub fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(kind: ProviderErrorKind) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(kind),
                seen: Mutex::new(Vec::new()),
            })
        }

        pub fn last(&self) -> ProviderRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }

        pub fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProviderAdapter for CannedAdapter {
        fn kind(&self) -> &str {
            "canned"
        }
        fn model(&self) -> &str {
            "canned-model"
        }
        async fn execute(
            &self,
            request: &ProviderRequest,
            descriptor: &ProviderDescriptor,
        ) -> Result<NormalizedResponse, ProviderError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(NormalizedResponse {
                    text: text.clone(),
                    provider_id: descriptor.id.clone(),
                    latency_ms: 1,
                    tokens_used: None,
                }),
                Err(kind) => Err(ProviderError::new(*kind, descriptor.id.as_str(), "canned failure")),
            }
        }
    }

    /// Router over a single high-tier provider
    pub fn router_with(adapter: Arc<CannedAdapter>) -> Arc<AiRouter> {
        let registry = ProviderRegistry::new()
            .with_provider(ProviderDescriptor::new("canned", CostTier::High), adapter)
            .unwrap();
        Arc::new(AiRouter::new(Arc::new(registry)))
    }
}

//! Request orchestration with sequential fallback across providers
//!
//! [`AiRouter`] is the entry point callers hold. It validates a request, asks
//! the selector for an ordered route, then walks that route one provider at a
//! time until one succeeds. Providers are never raced: each attempt finishes
//! (success, error or deadline) before the next begins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::error::{ProviderError, ProviderErrorKind, RouterError};
use crate::providers::types::{CallMode, ProviderRequest};
use crate::registry::{ProviderRegistry, RegisteredProvider};
use crate::selector::{Requirements, RouteQuery, StaticTierResolver, TierPolicy, TierResolver, select_route};
use crate::types::{
    CallerTier, ChatMessage, ChatRole, Complexity, GenerationRequest, NormalizedResponse,
    ProviderOverride, RouteDecision, estimate_tokens,
};

/// Upper bound on per-provider attempts accepted from config
pub const MAX_ATTEMPTS_PER_PROVIDER: u32 = 10;

/// Same-provider retry policy applied before falling back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per provider, including the first; 1 disables retries
    pub max_attempts_per_provider: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_provider: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Routes generation and chat requests across registered providers
pub struct AiRouter {
    registry: Arc<ProviderRegistry>,
    tier_policy: TierPolicy,
    tiers: Arc<dyn TierResolver>,
    retry: RetryPolicy,
    chat_complexity: Complexity,
    default_temperature: f32,
}

impl std::fmt::Debug for AiRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiRouter")
            .field("providers", &self.registry.len())
            .field("tier_policy", &self.tier_policy)
            .field("retry", &self.retry)
            .field("chat_complexity", &self.chat_complexity)
            .field("default_temperature", &self.default_temperature)
            .finish()
    }
}

impl AiRouter {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            tier_policy: TierPolicy::default(),
            tiers: Arc::new(StaticTierResolver::default()),
            retry: RetryPolicy::default(),
            chat_complexity: Complexity::Medium,
            default_temperature: 0.7,
        }
    }

    /// Build a router whose policies come from the `[routing]`, `[retry]`
    /// and `[callers]` config tables
    pub fn from_config(registry: Arc<ProviderRegistry>, config: &RouterConfig) -> Self {
        Self::new(registry)
            .with_tier_policy(TierPolicy::from_config(&config.routing))
            .with_tier_resolver(Arc::new(StaticTierResolver::from_config(&config.callers)))
            .with_retry_policy(RetryPolicy {
                max_attempts_per_provider: config
                    .retry
                    .max_attempts_per_provider
                    .clamp(1, MAX_ATTEMPTS_PER_PROVIDER),
                base_delay: config.retry.base_delay(),
            })
            .with_chat_complexity(config.routing.chat_complexity)
            .with_default_temperature(config.routing.default_temperature)
    }

    pub fn with_tier_policy(mut self, policy: TierPolicy) -> Self {
        self.tier_policy = policy;
        self
    }

    pub fn with_tier_resolver(mut self, resolver: Arc<dyn TierResolver>) -> Self {
        self.tiers = resolver;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chat_complexity(mut self, complexity: Complexity) -> Self {
        self.chat_complexity = complexity;
        self
    }

    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolve the plan tier for a caller; anonymous callers run as premium
    pub fn caller_tier(&self, caller_id: Option<&str>) -> CallerTier {
        caller_id.map_or(CallerTier::Premium, |id| self.tiers.tier_for(id))
    }

    /// Validate a request and compute its route without calling any provider
    pub fn plan(&self, request: &GenerationRequest) -> Result<RouteDecision, RouterError> {
        request.validate()?;
        let query = RouteQuery {
            complexity: request.complexity,
            provider_override: &request.provider_override,
            caller_tier: self.caller_tier(request.caller_id.as_deref()),
            requirements: Requirements {
                json_mode: request.response_format.is_json(),
                chat: false,
                input_tokens: request.estimated_input_tokens(),
            },
        };
        Ok(select_route(&self.registry, &self.tier_policy, &query))
    }

    /// Single-shot generation: validate, route, then attempt providers in order
    pub async fn route_request(
        &self,
        request: &GenerationRequest,
    ) -> Result<NormalizedResponse, RouterError> {
        let span = info_span!(
            "route_request",
            request_id = %Uuid::new_v4(),
            complexity = %request.complexity,
            provider_override = %request.provider_override,
        );

        async {
            let decision = self.plan(request)?;
            if decision.is_empty() {
                return Err(no_provider(&request.provider_override, request.response_format.is_json()));
            }

            let provider_request = ProviderRequest::completion(
                &request.prompt,
                request.system_instruction.as_deref(),
                request.response_format,
                request.temperature.unwrap_or(self.default_temperature),
            );
            self.dispatch(&decision, &provider_request).await
        }
        .instrument(span)
        .await
    }

    /// [`route_request`](Self::route_request) that gives up as soon as
    /// `cancel` fires, dropping the in-flight provider call
    pub async fn route_request_cancellable(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<NormalizedResponse, RouterError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("route_request cancelled by caller");
                Err(RouterError::Cancelled)
            }
            result = self.route_request(request) => result,
        }
    }

    /// Resolve the chat route for a caller so a whole session can be pinned
    /// to it. `None` resolves to the premium route.
    pub fn get_route(&self, caller_id: Option<&str>) -> RouteDecision {
        let query = RouteQuery {
            complexity: self.chat_complexity,
            provider_override: &ProviderOverride::Auto,
            caller_tier: self.caller_tier(caller_id),
            requirements: Requirements {
                json_mode: false,
                chat: true,
                input_tokens: 0,
            },
        };
        select_route(&self.registry, &self.tier_policy, &query)
    }

    /// Multi-turn chat over a route previously obtained from
    /// [`get_route`](Self::get_route). The selector is not consulted again.
    ///
    /// Each turn starts at the route's primary. A failed turn falls back
    /// along the route unless it is pinned, so the next turn goes back to
    /// the primary. Route entries whose input limit is below the transcript
    /// size are skipped.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        route: &RouteDecision,
    ) -> Result<NormalizedResponse, RouterError> {
        let span = info_span!(
            "chat",
            request_id = %Uuid::new_v4(),
            turns = messages.len(),
            primary = route.primary().unwrap_or("none"),
        );

        async {
            validate_chat(messages)?;
            if route.is_empty() {
                return Err(RouterError::NoProviderAvailable {
                    reason: "chat route is empty".to_string(),
                });
            }
            let request = ProviderRequest::chat(messages, self.default_temperature);
            self.dispatch(route, &request).await
        }
        .instrument(span)
        .await
    }

    /// [`chat`](Self::chat) that gives up as soon as `cancel` fires
    pub async fn chat_cancellable(
        &self,
        messages: &[ChatMessage],
        route: &RouteDecision,
        cancel: &CancellationToken,
    ) -> Result<NormalizedResponse, RouterError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("chat cancelled by caller");
                Err(RouterError::Cancelled)
            }
            result = self.chat(messages, route) => result,
        }
    }

    /// Walk the route in order; first success wins
    async fn dispatch(
        &self,
        decision: &RouteDecision,
        request: &ProviderRequest,
    ) -> Result<NormalizedResponse, RouterError> {
        let mut failures: Vec<ProviderError> = Vec::with_capacity(decision.len());
        // completions were already size-filtered by the selector
        let chat_tokens =
            (request.mode == CallMode::Chat).then(|| estimate_chat_tokens(&request.messages));

        for (idx, id) in decision.providers.iter().enumerate() {
            debug!(
                "Attempting provider {} ({}/{}), pinned={}",
                id,
                idx + 1,
                decision.len(),
                decision.pinned
            );

            let outcome = match self.registry.entry(id) {
                Some(provider) if request.mode == CallMode::Chat && !provider.descriptor.supports_chat => {
                    Err(ProviderError::new(
                        ProviderErrorKind::Unknown,
                        id.as_str(),
                        "provider does not support chat",
                    ))
                }
                Some(provider)
                    if chat_tokens.is_some_and(|t| t > provider.descriptor.max_input_tokens) =>
                {
                    Err(ProviderError::new(
                        ProviderErrorKind::Unknown,
                        id.as_str(),
                        format!(
                            "transcript of ~{} tokens exceeds input limit of {}",
                            chat_tokens.unwrap_or_default(),
                            provider.descriptor.max_input_tokens
                        ),
                    ))
                }
                Some(provider) => self.attempt(provider, request).await,
                None => Err(ProviderError::new(
                    ProviderErrorKind::Unknown,
                    id.as_str(),
                    "provider is not registered",
                )),
            };

            match outcome {
                Ok(response) => {
                    if idx > 0 {
                        info!(
                            "Request succeeded on fallback provider {} after {} failure(s)",
                            response.provider_id,
                            failures.len()
                        );
                    }
                    debug!(
                        "Provider {} answered in {}ms, tokens={:?}",
                        response.provider_id, response.latency_ms, response.tokens_used
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Provider {} failed ({}): {}", e.provider_id, e.kind, e.cause);
                    failures.push(e);

                    if decision.pinned {
                        debug!("Route is pinned to {}, not falling back", id);
                        break;
                    }
                    if let Some(next) = decision.providers.get(idx + 1) {
                        info!("Failing over from {} to {}", id, next);
                    }
                }
            }
        }

        Err(RouterError::AllProvidersFailed { failures })
    }

    /// One provider, with the descriptor deadline and optional retries
    async fn attempt(
        &self,
        provider: &RegisteredProvider,
        request: &ProviderRequest,
    ) -> Result<NormalizedResponse, ProviderError> {
        let descriptor = &provider.descriptor;
        let max_attempts = self.retry.max_attempts_per_provider.max(1);
        let mut attempt = 0u32;

        loop {
            let started = Instant::now();
            let result = match tokio::time::timeout(
                descriptor.timeout(),
                provider.adapter.execute(request, descriptor),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::timeout(
                    descriptor.id.as_str(),
                    format!("no response within {}ms", descriptor.timeout_ms),
                )),
            };

            match result {
                Ok(mut response) => {
                    response.provider_id = descriptor.id.clone();
                    if response.latency_ms == 0 {
                        response.latency_ms = started.elapsed().as_millis() as u64;
                    }
                    return Ok(response);
                }
                Err(e) if e.kind.is_transient() && attempt + 1 < max_attempts => {
                    let delay = backoff_delay(self.retry.base_delay, attempt);
                    warn!(
                        "Provider {} {} (attempt {}/{}), retrying in {:?}",
                        descriptor.id,
                        e.kind,
                        attempt + 1,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn validate_chat(messages: &[ChatMessage]) -> Result<(), RouterError> {
    if messages.is_empty() {
        return Err(RouterError::InvalidRequest(
            "chat requires at least one message".to_string(),
        ));
    }
    if messages.iter().all(|m| m.content.trim().is_empty()) {
        return Err(RouterError::InvalidRequest(
            "chat messages are all empty".to_string(),
        ));
    }
    let system_count = messages.iter().filter(|m| m.role == ChatRole::System).count();
    if system_count > 1 {
        debug!("Chat carries {} system messages; they will be merged", system_count);
    }
    Ok(())
}

fn no_provider(provider_override: &ProviderOverride, json: bool) -> RouterError {
    let reason = match provider_override {
        ProviderOverride::Pinned(id) => format!(
            "pinned provider '{}' is not registered or cannot serve this request",
            id
        ),
        ProviderOverride::Auto if json => {
            "no registered provider supports JSON mode for this caller and input size".to_string()
        }
        ProviderOverride::Auto => {
            "no registered provider satisfies the request for this caller".to_string()
        }
    };
    RouterError::NoProviderAvailable { reason }
}

/// `base * 2^attempt`, saturating instead of overflowing
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Input size of a chat transcript, system turns included
pub fn estimate_chat_tokens(messages: &[ChatMessage]) -> u32 {
    estimate_tokens(messages.iter().map(|m| m.content.len()).sum())
}

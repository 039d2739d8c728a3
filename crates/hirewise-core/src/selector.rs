//! Route selection
//!
//! A pure decision function from (complexity, override, caller tier,
//! capability requirements) to an ordered list of provider ids. It never
//! performs I/O and never relaxes a capability requirement: if nothing
//! qualifies, the decision is empty.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{CallersConfig, RoutingConfig};
use crate::providers::types::ProviderDescriptor;
use crate::registry::ProviderRegistry;
use crate::types::{CallerTier, Complexity, CostTier, ProviderOverride, RouteDecision};

/// What a request needs from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirements {
    pub json_mode: bool,
    pub chat: bool,
    pub input_tokens: u32,
}

impl Requirements {
    pub fn satisfied_by(&self, descriptor: &ProviderDescriptor) -> bool {
        (!self.json_mode || descriptor.supports_json_mode)
            && (!self.chat || descriptor.supports_chat)
            && descriptor.max_input_tokens >= self.input_tokens
    }
}

/// Inputs to one selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuery<'a> {
    pub complexity: Complexity,
    pub provider_override: &'a ProviderOverride,
    pub caller_tier: CallerTier,
    pub requirements: Requirements,
}

/// Which cost tiers each caller tier may reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    pub free_max_cost: CostTier,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            free_max_cost: CostTier::Mid,
        }
    }
}

impl TierPolicy {
    pub fn from_config(routing: &RoutingConfig) -> Self {
        Self {
            free_max_cost: routing.free_tier_max_cost,
        }
    }

    pub fn allows(&self, caller: CallerTier, cost: CostTier) -> bool {
        match caller {
            CallerTier::Premium => true,
            CallerTier::Free => cost <= self.free_max_cost,
        }
    }
}

/// Select the ordered candidate list for a request.
///
/// - An override naming a provider pins the route to that provider alone, as
///   long as it is registered and passes the same capability and tier filters.
/// - Otherwise providers matching the complexity's preferred cost tier come
///   first, then the rest in ascending cost order. Registration order breaks
///   ties. For `hard` requests with no capable high-tier provider, the
///   highest capable tier is preferred instead.
/// - The caller tier is applied after ordering. It only removes candidates
///   and never reorders them.
pub fn select_route(
    registry: &ProviderRegistry,
    policy: &TierPolicy,
    query: &RouteQuery<'_>,
) -> RouteDecision {
    let capable = |d: &ProviderDescriptor| query.requirements.satisfied_by(d);
    let allowed = |d: &ProviderDescriptor| capable(d) && policy.allows(query.caller_tier, d.cost_tier);

    if let ProviderOverride::Pinned(id) = query.provider_override {
        let decision = match registry.get(id) {
            Ok(d) if allowed(d) => RouteDecision::pinned(id.clone()),
            Ok(_) => {
                debug!("Pinned provider {} does not satisfy request requirements", id);
                RouteDecision {
                    providers: vec![],
                    pinned: true,
                }
            }
            Err(_) => {
                debug!("Pinned provider {} is not registered", id);
                RouteDecision {
                    providers: vec![],
                    pinned: true,
                }
            }
        };
        return decision;
    }

    // order over every capable provider, then drop what the caller may not use
    let candidates: Vec<&ProviderDescriptor> = registry.list().filter(|d| capable(d)).collect();

    let preferred = preferred_tier(query.complexity, &candidates);

    let mut ordered: Vec<&ProviderDescriptor> = candidates
        .iter()
        .copied()
        .filter(|d| Some(d.cost_tier) == preferred)
        .collect();
    let mut rest: Vec<&ProviderDescriptor> = candidates
        .iter()
        .copied()
        .filter(|d| Some(d.cost_tier) != preferred)
        .collect();
    // stable sort keeps registration order within a tier
    rest.sort_by_key(|d| d.cost_tier);
    ordered.extend(rest);

    let decision = RouteDecision::auto(
        ordered
            .into_iter()
            .filter(|d| policy.allows(query.caller_tier, d.cost_tier))
            .map(|d| d.id.clone())
            .collect(),
    );
    debug!(
        "Route for complexity={} caller={}: [{}]",
        query.complexity,
        query.caller_tier,
        decision.providers.join(", ")
    );
    decision
}

fn preferred_tier(complexity: Complexity, candidates: &[&ProviderDescriptor]) -> Option<CostTier> {
    let target = complexity.preferred_tier();
    if candidates.iter().any(|d| d.cost_tier == target) {
        return Some(target);
    }
    match complexity {
        Complexity::Hard => candidates.iter().map(|d| d.cost_tier).max(),
        Complexity::Easy | Complexity::Medium => None,
    }
}

/// Maps caller ids to plan tiers
pub trait TierResolver: Send + Sync {
    fn tier_for(&self, caller_id: &str) -> CallerTier;
}

/// Tier lookup backed by the `[callers]` config table
#[derive(Debug, Clone)]
pub struct StaticTierResolver {
    default_tier: CallerTier,
    tiers: HashMap<String, CallerTier>,
}

impl StaticTierResolver {
    pub fn new(default_tier: CallerTier) -> Self {
        Self {
            default_tier,
            tiers: HashMap::new(),
        }
    }

    pub fn with_caller(mut self, caller_id: impl Into<String>, tier: CallerTier) -> Self {
        self.tiers.insert(caller_id.into(), tier);
        self
    }

    pub fn from_config(callers: &CallersConfig) -> Self {
        Self {
            default_tier: callers.default_tier,
            tiers: callers.tiers.clone(),
        }
    }
}

impl Default for StaticTierResolver {
    fn default() -> Self {
        Self::from_config(&CallersConfig::default())
    }
}

impl TierResolver for StaticTierResolver {
    fn tier_for(&self, caller_id: &str) -> CallerTier {
        self.tiers.get(caller_id).copied().unwrap_or(self.default_tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::providers::types::{ProviderAdapter, ProviderRequest};
    use crate::types::NormalizedResponse;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullAdapter;

    #[async_trait]
    impl ProviderAdapter for NullAdapter {
        fn kind(&self) -> &str {
            "null"
        }
        fn model(&self) -> &str {
            "null"
        }
        async fn execute(
            &self,
            _request: &ProviderRequest,
            descriptor: &ProviderDescriptor,
        ) -> Result<NormalizedResponse, ProviderError> {
            Err(ProviderError::invalid_response(&descriptor.id, "unused"))
        }
    }

    fn registry(descriptors: Vec<ProviderDescriptor>) -> ProviderRegistry {
        let mut r = ProviderRegistry::new();
        for d in descriptors {
            r.register(d, Arc::new(NullAdapter)).unwrap();
        }
        r
    }

    fn mixed() -> ProviderRegistry {
        registry(vec![
            ProviderDescriptor::new("claude", CostTier::High).with_json_mode(false),
            ProviderDescriptor::new("groq", CostTier::Low),
            ProviderDescriptor::new("gpt", CostTier::High),
            ProviderDescriptor::new("gemini", CostTier::Mid),
            ProviderDescriptor::new("deepseek", CostTier::Low).with_chat(false),
        ])
    }

    fn query(complexity: Complexity, ov: &ProviderOverride, caller: CallerTier, json: bool) -> RouteQuery<'_> {
        RouteQuery {
            complexity,
            provider_override: ov,
            caller_tier: caller,
            requirements: Requirements {
                json_mode: json,
                chat: false,
                input_tokens: 10,
            },
        }
    }

    #[test]
    fn test_easy_prefers_low_then_ascending() {
        let d = select_route(&mixed(), &TierPolicy::default(), &query(Complexity::Easy, &ProviderOverride::Auto, CallerTier::Premium, false));
        assert_eq!(d.providers, vec!["groq", "deepseek", "gemini", "claude", "gpt"]);
        assert!(!d.pinned);
    }

    #[test]
    fn test_medium_prefers_mid() {
        let d = select_route(&mixed(), &TierPolicy::default(), &query(Complexity::Medium, &ProviderOverride::Auto, CallerTier::Premium, false));
        assert_eq!(d.providers, vec!["gemini", "groq", "deepseek", "claude", "gpt"]);
    }

    #[test]
    fn test_hard_json_excludes_non_json_provider() {
        let d = select_route(&mixed(), &TierPolicy::default(), &query(Complexity::Hard, &ProviderOverride::Auto, CallerTier::Premium, true));
        assert_eq!(d.providers, vec!["gpt", "groq", "deepseek", "gemini"]);
    }

    #[test]
    fn test_free_caller_excluded_from_high_tier() {
        let d = select_route(&mixed(), &TierPolicy::default(), &query(Complexity::Hard, &ProviderOverride::Auto, CallerTier::Free, false));
        // same order as the premium route with the high tier removed
        assert_eq!(d.providers, vec!["groq", "deepseek", "gemini"]);
    }

    #[test]
    fn test_hard_without_capable_high_tier_prefers_highest() {
        let r = registry(vec![
            ProviderDescriptor::new("groq", CostTier::Low),
            ProviderDescriptor::new("gemini", CostTier::Mid),
        ]);
        let d = select_route(&r, &TierPolicy::default(), &query(Complexity::Hard, &ProviderOverride::Auto, CallerTier::Premium, false));
        assert_eq!(d.providers, vec!["gemini", "groq"]);
    }

    #[test]
    fn test_caller_tier_does_not_reorder() {
        let policy = TierPolicy::default();
        let three = registry(vec![
            ProviderDescriptor::new("gpt", CostTier::High),
            ProviderDescriptor::new("groq", CostTier::Low),
            ProviderDescriptor::new("gemini", CostTier::Mid),
        ]);
        for r in [mixed(), three] {
            for c in [Complexity::Easy, Complexity::Medium, Complexity::Hard] {
                let premium = select_route(&r, &policy, &query(c, &ProviderOverride::Auto, CallerTier::Premium, false));
                let free = select_route(&r, &policy, &query(c, &ProviderOverride::Auto, CallerTier::Free, false));
                let filtered: Vec<String> = premium
                    .providers
                    .into_iter()
                    .filter(|id| {
                        let tier = r.get(id).unwrap().cost_tier;
                        policy.allows(CallerTier::Free, tier)
                    })
                    .collect();
                assert_eq!(filtered, free.providers, "complexity={c}");
            }
        }
    }

    #[test]
    fn test_chat_requirement_filters() {
        let mut q = query(Complexity::Easy, &ProviderOverride::Auto, CallerTier::Premium, false);
        q.requirements.chat = true;
        let d = select_route(&mixed(), &TierPolicy::default(), &q);
        assert!(!d.providers.contains(&"deepseek".to_string()));
    }

    #[test]
    fn test_input_size_filters() {
        let r = registry(vec![
            ProviderDescriptor::new("small", CostTier::Low).with_max_input_tokens(100),
            ProviderDescriptor::new("large", CostTier::Mid),
        ]);
        let mut q = query(Complexity::Easy, &ProviderOverride::Auto, CallerTier::Premium, false);
        q.requirements.input_tokens = 5_000;
        let d = select_route(&r, &TierPolicy::default(), &q);
        assert_eq!(d.providers, vec!["large"]);
    }

    #[test]
    fn test_override_pins_regardless_of_complexity() {
        let ov = ProviderOverride::Pinned("groq".to_string());
        for c in [Complexity::Easy, Complexity::Medium, Complexity::Hard] {
            let d = select_route(&mixed(), &TierPolicy::default(), &query(c, &ov, CallerTier::Premium, false));
            assert_eq!(d.providers, vec!["groq"]);
            assert!(d.pinned);
        }
    }

    #[test]
    fn test_override_unknown_or_incapable_is_empty() {
        let unknown = ProviderOverride::Pinned("mistral".to_string());
        let d = select_route(&mixed(), &TierPolicy::default(), &query(Complexity::Easy, &unknown, CallerTier::Premium, false));
        assert!(d.is_empty());

        let no_json = ProviderOverride::Pinned("claude".to_string());
        let d = select_route(&mixed(), &TierPolicy::default(), &query(Complexity::Easy, &no_json, CallerTier::Premium, true));
        assert!(d.is_empty());
        assert!(d.pinned);
    }

    #[test]
    fn test_json_only_non_json_provider_registered() {
        let r = registry(vec![ProviderDescriptor::new("claude", CostTier::High).with_json_mode(false)]);
        let d = select_route(&r, &TierPolicy::default(), &query(Complexity::Easy, &ProviderOverride::Auto, CallerTier::Premium, true));
        assert!(d.is_empty());
    }

    #[test]
    fn test_easy_two_json_providers_low_first() {
        let r = registry(vec![
            ProviderDescriptor::new("P2", CostTier::Mid),
            ProviderDescriptor::new("P1", CostTier::Low),
        ]);
        let d = select_route(&r, &TierPolicy::default(), &query(Complexity::Easy, &ProviderOverride::Auto, CallerTier::Premium, true));
        assert_eq!(d.providers, vec!["P1", "P2"]);
    }

    #[test]
    fn test_static_tier_resolver() {
        let resolver = StaticTierResolver::new(CallerTier::Free).with_caller("student-42", CallerTier::Premium);
        assert_eq!(resolver.tier_for("student-42"), CallerTier::Premium);
        assert_eq!(resolver.tier_for("anon"), CallerTier::Free);
    }
}

//! Error taxonomy for routing and provider execution

use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;

/// Category of a single failed provider attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Timeout,
    RateLimited,
    AuthFailure,
    InvalidResponse,
    Unknown,
}

impl ProviderErrorKind {
    /// Map an HTTP status from a provider into an error kind
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthFailure,
            429 => Self::RateLimited,
            408 | 504 => Self::Timeout,
            _ => Self::Unknown,
        }
    }

    /// Whether the same provider may succeed if asked again shortly
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::AuthFailure => write!(f, "auth_failure"),
            Self::InvalidResponse => write!(f, "invalid_response"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A typed failure from one provider attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider '{provider_id}' failed ({kind}): {cause}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub provider_id: String,
    pub cause: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, provider_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            kind,
            provider_id: provider_id.into(),
            cause: cause.into(),
        }
    }

    pub fn timeout(provider_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, provider_id, cause)
    }

    pub fn invalid_response(provider_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidResponse, provider_id, cause)
    }

    /// Build an error from a non-success HTTP response
    pub fn from_status(provider_id: impl Into<String>, status: StatusCode, body: &str) -> Self {
        Self::new(
            ProviderErrorKind::from_status(status),
            provider_id,
            format!("status {}: {}", status, truncate(body, 512)),
        )
    }

    /// Build an error from a transport-level reqwest failure
    pub fn from_transport(provider_id: impl Into<String>, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else if err.is_decode() {
            ProviderErrorKind::InvalidResponse
        } else if let Some(status) = err.status() {
            ProviderErrorKind::from_status(status)
        } else {
            ProviderErrorKind::Unknown
        };
        Self::new(kind, provider_id, err.to_string())
    }
}

/// Terminal failures surfaced by the orchestrator
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no provider available: {reason}")]
    NoProviderAvailable { reason: String },

    #[error("provider '{0}' is not registered")]
    ProviderNotFound(String),

    #[error("all providers failed: {}", summarize(.failures))]
    AllProvidersFailed { failures: Vec<ProviderError> },

    #[error("request cancelled by caller")]
    Cancelled,
}

impl RouterError {
    /// Per-provider failures in attempt order, empty for non-dispatch errors
    pub fn failures(&self) -> &[ProviderError] {
        match self {
            Self::AllProvidersFailed { failures } => failures,
            _ => &[],
        }
    }
}

/// Errors raised while building the provider registry at startup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("provider '{0}' is registered twice")]
    DuplicateProvider(String),

    #[error("provider '{0}' requires an api_key but none was configured")]
    MissingCredentials(String),

    #[error("provider '{id}' has invalid configuration: {reason}")]
    InvalidConfig { id: String, reason: String },
}

fn summarize(failures: &[ProviderError]) -> String {
    if failures.is_empty() {
        return "no attempts recorded".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}={}", f.provider_id, f.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_status() {
        assert_eq!(ProviderErrorKind::from_status(StatusCode::UNAUTHORIZED), ProviderErrorKind::AuthFailure);
        assert_eq!(ProviderErrorKind::from_status(StatusCode::FORBIDDEN), ProviderErrorKind::AuthFailure);
        assert_eq!(ProviderErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS), ProviderErrorKind::RateLimited);
        assert_eq!(ProviderErrorKind::from_status(StatusCode::GATEWAY_TIMEOUT), ProviderErrorKind::Timeout);
        assert_eq!(ProviderErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR), ProviderErrorKind::Unknown);
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ProviderErrorKind::RateLimited.is_transient());
        assert!(ProviderErrorKind::Timeout.is_transient());
        assert!(!ProviderErrorKind::AuthFailure.is_transient());
        assert!(!ProviderErrorKind::InvalidResponse.is_transient());
    }

    #[test]
    fn test_all_failed_display_lists_attempts() {
        let err = RouterError::AllProvidersFailed {
            failures: vec![
                ProviderError::timeout("p1", "deadline"),
                ProviderError::new(ProviderErrorKind::RateLimited, "p2", "429"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("p1=timeout"));
        assert!(msg.contains("p2=rate_limited"));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_from_status_truncates_body() {
        let body = "x".repeat(2000);
        let err = ProviderError::from_status("p", StatusCode::BAD_GATEWAY, &body);
        assert!(err.cause.len() < 600);
        assert_eq!(err.kind, ProviderErrorKind::Unknown);
    }
}

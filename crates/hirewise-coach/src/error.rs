use hirewise_core::RouterError;
use thiserror::Error;

use crate::payload::PayloadError;

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("CV text too short: {chars} characters, at least {min} required")]
    CvTooShort { chars: usize, min: usize },

    #[error("no CV text to rewrite")]
    EmptyCv,

    #[error("failed to rewrite CV: {0}")]
    RewriteFailed(#[source] RewriteFailure),

    #[error("student accounts need an access code of at least {min} characters")]
    InvalidAccessCode { min: usize },

    #[error("unknown {what}: {value}")]
    UnknownVariant { what: &'static str, value: String },
}

/// Underlying cause of a failed rewrite
#[derive(Debug, Error)]
pub enum RewriteFailure {
    #[error(transparent)]
    Routing(#[from] RouterError),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl From<RouterError> for CoachError {
    fn from(err: RouterError) -> Self {
        Self::RewriteFailed(err.into())
    }
}

impl From<PayloadError> for CoachError {
    fn from(err: PayloadError) -> Self {
        Self::RewriteFailed(err.into())
    }
}

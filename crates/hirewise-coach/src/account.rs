//! Sign-up account kinds and the plan tier each one routes under

use std::str::FromStr;

use hirewise_core::CallerTier;
use serde::{Deserialize, Serialize};

use crate::error::CoachError;

pub const MIN_ACCESS_CODE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Sponsored accounts unlocked with an institution access code
    #[default]
    Student,
    Freemium,
}

impl AccountType {
    pub fn caller_tier(&self) -> CallerTier {
        match self {
            Self::Student => CallerTier::Premium,
            Self::Freemium => CallerTier::Free,
        }
    }

    /// Check sign-up input for this account kind
    pub fn validate_signup(&self, access_code: Option<&str>) -> Result<(), CoachError> {
        match self {
            Self::Student => {
                let len = access_code.map_or(0, |c| c.trim().chars().count());
                if len < MIN_ACCESS_CODE_LEN {
                    return Err(CoachError::InvalidAccessCode {
                        min: MIN_ACCESS_CODE_LEN,
                    });
                }
                Ok(())
            }
            Self::Freemium => Ok(()),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Freemium => write!(f, "freemium"),
        }
    }
}

impl FromStr for AccountType {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "freemium" | "free" => Ok(Self::Freemium),
            other => Err(CoachError::UnknownVariant {
                what: "account type",
                value: other.to_string(),
            }),
        }
    }
}

//! Rate-limit mode value object

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Which quota applies to a request
///
/// `Strict` is used for sensitive paths such as authentication endpoints and
/// carries a tighter quota than `Standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    /// Default quota for ordinary API traffic
    #[default]
    Standard,
    /// Tighter quota for sensitive endpoints
    Strict,
}

impl RateMode {
    /// Returns all modes for iteration
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Standard, Self::Strict]
    }

    /// Stable lowercase name, used in logs and metrics labels
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RateMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            other => Err(DomainError::InvalidRateMode(other.to_string())),
        }
    }
}

//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Unknown rate-limit mode name
    #[error("Invalid rate mode: {0}")]
    InvalidRateMode(String),

    /// Unknown injection category name
    #[error("Invalid threat category: {0}")]
    InvalidThreatCategory(String),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Reasons a signed request is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The signature does not match the request material
    #[error("Signature does not match request")]
    Invalid,

    /// The timestamp lies outside the accepted replay window
    #[error("Signature timestamp outside tolerance ({skew_secs}s skew)")]
    Expired {
        /// Absolute distance between the request timestamp and now
        skew_secs: u64,
    },

    /// Signature or timestamp could not be parsed
    #[error("Malformed signature material: {0}")]
    Malformed(String),
}

impl SignatureError {
    /// Machine-readable code used in error bodies
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid | Self::Malformed(_) => "signature_invalid",
            Self::Expired { .. } => "signature_expired",
        }
    }
}

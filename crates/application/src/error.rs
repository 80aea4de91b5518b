//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A threat detector could not complete its scan
    #[error("Detector '{detector}' failed: {reason}")]
    DetectorFailure { detector: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Create a detector failure error
    pub fn detector_failure(detector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DetectorFailure {
            detector: detector.into(),
            reason: reason.into(),
        }
    }
}

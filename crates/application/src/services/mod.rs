//! Application services - Security checks applied to inbound requests

mod input_validator;
mod rate_limiter;
mod request_signer;

#[cfg(test)]
pub use input_validator::MockThreatDetector;
pub use input_validator::{
    CommandInjectionDetector, DEFAULT_ALLOWED_TAGS, InputValidator, InputValidatorConfig,
    MarkupSanitizer, PathTraversalDetector, ROOT_FIELD, SqlInjectionDetector, ThreatDetector,
    XssDetector, default_detectors,
};
pub use rate_limiter::{Quota, RateLimiter, RateLimiterConfig};
pub use request_signer::{DEFAULT_TOLERANCE_SECS, RequestSigner};

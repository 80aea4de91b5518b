//! Domain entities - Request-scoped results produced by the security checks

mod rate_limit_decision;
mod validation;

pub use rate_limit_decision::RateLimitDecision;
pub use validation::{ThreatCategory, ValidationIssue, ValidationResult};

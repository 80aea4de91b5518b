//! Input validation service
//!
//! Sanitizes untrusted payloads and classifies every string leaf against the
//! injection detectors. Stateless apart from its immutable configuration, so
//! one instance can be shared by any number of concurrent requests.

mod detectors;
mod sanitizer;

pub use detectors::{
    CommandInjectionDetector, PathTraversalDetector, SqlInjectionDetector, ThreatDetector,
    XssDetector, default_detectors,
};
#[cfg(test)]
pub use detectors::MockThreatDetector;
pub use sanitizer::{DEFAULT_ALLOWED_TAGS, MarkupSanitizer};

use domain::{ValidationIssue, ValidationResult};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ApplicationError;

/// Field path reported for a top-level scalar payload
pub const ROOT_FIELD: &str = "$";

/// Configuration for the input validator
#[derive(Debug, Clone)]
pub struct InputValidatorConfig {
    /// Markup tags kept by [`InputValidator::sanitize_string`]
    pub allowed_tags: Vec<String>,
}

impl Default for InputValidatorConfig {
    fn default() -> Self {
        Self {
            allowed_tags: DEFAULT_ALLOWED_TAGS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Sanitizer plus an ordered list of injection detectors
#[derive(Debug)]
pub struct InputValidator {
    sanitizer: MarkupSanitizer,
    detectors: Vec<Box<dyn ThreatDetector>>,
}

impl InputValidator {
    /// Create a validator with the built-in detectors
    pub fn new(config: &InputValidatorConfig) -> Self {
        Self::with_detectors(config, default_detectors())
    }

    /// Create a validator with a custom detector list
    ///
    /// Detectors run in the given order against every string leaf.
    pub fn with_detectors(
        config: &InputValidatorConfig,
        detectors: Vec<Box<dyn ThreatDetector>>,
    ) -> Self {
        Self {
            sanitizer: MarkupSanitizer::new(&config.allowed_tags),
            detectors,
        }
    }

    /// Number of configured detectors
    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Remove disallowed markup and control characters
    pub fn sanitize_string(&self, text: &str) -> String {
        self.sanitizer.sanitize(text)
    }

    /// True when `text` carries no SQL injection markers
    pub fn validate_sql_injection(&self, text: &str) -> bool {
        SqlInjectionDetector::scan(text)
    }

    /// True when `text` carries no XSS markers
    pub fn validate_xss(&self, text: &str) -> bool {
        XssDetector::scan(text)
    }

    /// True when `text` carries no command injection markers
    pub fn validate_command_injection(&self, text: &str) -> bool {
        CommandInjectionDetector::scan(text)
    }

    /// True when `text` carries no path traversal sequence
    pub fn validate_path_traversal(&self, text: &str) -> bool {
        PathTraversalDetector::scan(text)
    }

    /// Sanitize every string leaf, keeping shape, key order and non-string
    /// leaves
    pub fn sanitize_structured(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.sanitize_string(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.sanitize_structured(v)).collect())
            },
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.sanitize_structured(v)))
                    .collect::<Map<String, Value>>(),
            ),
            other => other.clone(),
        }
    }

    /// Run every detector against every string leaf
    ///
    /// One issue is recorded per (leaf, detector) that reports the leaf
    /// unsafe. A detector error aborts validation; callers must treat it as
    /// a failed validation.
    pub fn validate_request_data(&self, value: &Value) -> Result<ValidationResult, ApplicationError> {
        let mut result = ValidationResult::valid();
        let mut path = Vec::new();
        self.walk(value, &mut path, &mut result)?;

        if result.is_valid() {
            debug!("Payload passed validation");
        } else {
            warn!(
                issues = result.errors.len(),
                categories = ?result.categories(),
                "Payload failed validation"
            );
        }
        Ok(result)
    }

    /// Validate a single string as the leaf at `field`
    pub fn validate_text(&self, field: &str, text: &str) -> Result<ValidationResult, ApplicationError> {
        let mut result = ValidationResult::valid();
        self.check_leaf(field, text, &mut result)?;
        Ok(result)
    }

    fn walk(
        &self,
        value: &Value,
        path: &mut Vec<String>,
        result: &mut ValidationResult,
    ) -> Result<(), ApplicationError> {
        match value {
            Value::String(s) => {
                let field = if path.is_empty() {
                    ROOT_FIELD.to_string()
                } else {
                    path.join(".")
                };
                self.check_leaf(&field, s, result)?;
            },
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    path.push(index.to_string());
                    self.walk(item, path, result)?;
                    path.pop();
                }
            },
            Value::Object(map) => {
                for (key, item) in map {
                    path.push(key.clone());
                    self.walk(item, path, result)?;
                    path.pop();
                }
            },
            Value::Null | Value::Bool(_) | Value::Number(_) => {},
        }
        Ok(())
    }

    fn check_leaf(
        &self,
        field: &str,
        text: &str,
        result: &mut ValidationResult,
    ) -> Result<(), ApplicationError> {
        for detector in &self.detectors {
            let category = detector.category();
            let safe = detector.is_safe(text).map_err(|e| match e {
                ApplicationError::DetectorFailure { .. } => e,
                other => ApplicationError::detector_failure(category.as_str(), other.to_string()),
            })?;
            if !safe {
                debug!(%category, field, "Detector flagged field");
                result.push(ValidationIssue::new(category, field));
            }
        }
        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(&InputValidatorConfig::default())
    }
}

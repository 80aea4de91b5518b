//! Injection categories and validation results
//!
//! Types for reporting which string leaves of a request payload matched which
//! class of injection attack.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Category of detected injection attempt
///
/// This is a closed set: every detector reports exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    /// SQL statement or tautology smuggled into a value
    SqlInjection,
    /// Script, event handler or embed markup
    Xss,
    /// Shell metacharacters or command substitution
    CommandInjection,
    /// Directory traversal sequences, raw or URL-encoded
    PathTraversal,
}

impl ThreatCategory {
    /// Returns all threat categories for iteration
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::SqlInjection,
            Self::Xss,
            Self::CommandInjection,
            Self::PathTraversal,
        ]
    }

    /// Stable machine-readable name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SqlInjection => "sql_injection",
            Self::Xss => "xss",
            Self::CommandInjection => "command_injection",
            Self::PathTraversal => "path_traversal",
        }
    }

    /// Human-readable description used in error messages
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::SqlInjection => "Potential SQL injection detected",
            Self::Xss => "Potential cross-site scripting detected",
            Self::CommandInjection => "Potential command injection detected",
            Self::PathTraversal => "Potential path traversal detected",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ThreatCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::InvalidThreatCategory(s.to_string()))
    }
}

/// A single finding against one string leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Category of the detector that fired
    pub category: ThreatCategory,
    /// Dotted path of the offending field, e.g. `nested.value` or `items.0`
    pub field: String,
    /// Human-readable explanation
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue with the category's default message
    #[must_use]
    pub fn new(category: ThreatCategory, field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{} in field '{}'", category.description(), field);
        Self {
            category,
            field,
            message,
        }
    }
}

/// Outcome of validating one payload
///
/// Issues are kept in the order they were found: depth-first over the
/// payload, detectors in their fixed order per leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Findings, empty when the payload is clean
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// A result with no findings
    #[must_use]
    pub const fn valid() -> Self {
        Self { errors: Vec::new() }
    }

    /// True iff no issue was recorded
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record a finding
    pub fn push(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Whether any finding has the given category
    #[must_use]
    pub fn has_category(&self, category: ThreatCategory) -> bool {
        self.errors.iter().any(|e| e.category == category)
    }

    /// Unique categories found, in canonical order
    #[must_use]
    pub fn categories(&self) -> Vec<ThreatCategory> {
        let mut categories: Vec<_> = self.errors.iter().map(|e| e.category).collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

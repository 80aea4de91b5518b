//! Security validation for application configuration
//!
//! Validates configuration for security issues and provides warnings at startup.
//! Critical issues in production will prevent startup unless explicitly allowed.

use std::fmt;

use crate::config::AppConfig;

/// Secrets shorter than this are flagged as weak
const MIN_SECRET_BYTES: usize = 32;

/// Replay windows longer than this are flagged
const MAX_RECOMMENDED_TOLERANCE_SECS: u64 = 900;

/// Environment variable that lets production start despite critical findings
pub const ALLOW_INSECURE_ENV: &str = "CLAIMS_GUARD_ALLOW_INSECURE_CONFIG";

/// Severity level for security warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningSeverity {
    /// Informational - no action required
    Info,
    /// Warning - should be addressed but not critical
    Warning,
    /// Critical - must be addressed in production
    Critical,
}

impl fmt::Display for WarningSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A security warning with severity and description
#[derive(Debug, Clone)]
pub struct SecurityWarning {
    /// Severity level of the warning
    pub severity: WarningSeverity,
    /// Short code identifying the warning type
    pub code: String,
    /// Human-readable description of the issue
    pub message: String,
    /// Recommended action to resolve the issue
    pub recommendation: String,
}

impl SecurityWarning {
    /// Create a new security warning
    #[must_use]
    pub fn new(
        severity: WarningSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }

    /// Create a critical warning
    #[must_use]
    pub fn critical(
        code: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(WarningSeverity::Critical, code, message, recommendation)
    }

    /// Create a warning-level issue
    #[must_use]
    pub fn warning(
        code: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(WarningSeverity::Warning, code, message, recommendation)
    }

    /// Create an informational notice
    #[must_use]
    pub fn info(
        code: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(WarningSeverity::Info, code, message, recommendation)
    }

    /// Check if this warning is critical
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self.severity, WarningSeverity::Critical)
    }
}

impl fmt::Display for SecurityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} - {}",
            self.severity, self.code, self.message, self.recommendation
        )
    }
}

/// Validates application configuration for security issues
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityValidator;

impl SecurityValidator {
    /// Validate configuration and return all security warnings
    ///
    /// Returns a list of warnings sorted by severity (critical first).
    #[must_use]
    pub fn validate(config: &AppConfig) -> Vec<SecurityWarning> {
        let mut warnings = Vec::new();
        let is_production = config.is_production();

        Self::check_signature_secret(config, is_production, &mut warnings);
        Self::check_signature_tolerance(config, &mut warnings);
        Self::check_rate_limiting(config, is_production, &mut warnings);
        Self::check_quotas(config, is_production, &mut warnings);
        Self::check_bypass_paths(config, is_production, &mut warnings);
        Self::check_body_limit(config, &mut warnings);

        // Sort by severity (critical first)
        warnings.sort_by(|a, b| b.severity.cmp(&a.severity));

        warnings
    }

    /// Check if startup should be blocked due to critical security issues
    ///
    /// Returns `true` if the server should refuse to start.
    #[must_use]
    pub fn should_block_startup(config: &AppConfig, warnings: &[SecurityWarning]) -> bool {
        let has_critical = warnings.iter().any(SecurityWarning::is_critical);
        let allow_insecure = std::env::var(ALLOW_INSECURE_ENV)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        config.is_production() && has_critical && !allow_insecure
    }

    /// Log all warnings using tracing
    pub fn log_warnings(warnings: &[SecurityWarning]) {
        for warning in warnings {
            match warning.severity {
                WarningSeverity::Critical => {
                    tracing::error!(
                        code = %warning.code,
                        message = %warning.message,
                        recommendation = %warning.recommendation,
                        "Security configuration issue"
                    );
                },
                WarningSeverity::Warning => {
                    tracing::warn!(
                        code = %warning.code,
                        message = %warning.message,
                        recommendation = %warning.recommendation,
                        "Security configuration warning"
                    );
                },
                WarningSeverity::Info => {
                    tracing::info!(
                        code = %warning.code,
                        message = %warning.message,
                        recommendation = %warning.recommendation,
                        "Security configuration notice"
                    );
                },
            }
        }
    }

    fn check_signature_secret(
        config: &AppConfig,
        is_production: bool,
        warnings: &mut Vec<SecurityWarning>,
    ) {
        let secret_len = config.signature.secret_len();

        if config.signature.secret.is_none() {
            warnings.push(SecurityWarning::info(
                "SEC001",
                "No signature secret configured; signed callback routes are disabled",
                "Set CLAIMS_GUARD__SIGNATURE__SECRET to accept signed callbacks",
            ));
            return;
        }

        if secret_len < MIN_SECRET_BYTES {
            let severity = if is_production {
                WarningSeverity::Critical
            } else {
                WarningSeverity::Warning
            };

            warnings.push(SecurityWarning::new(
                severity,
                "SEC002",
                format!("Signature secret is only {secret_len} bytes"),
                format!("Use a random secret of at least {MIN_SECRET_BYTES} bytes"),
            ));
        }
    }

    fn check_signature_tolerance(config: &AppConfig, warnings: &mut Vec<SecurityWarning>) {
        if config.signature.tolerance_secs > MAX_RECOMMENDED_TOLERANCE_SECS {
            warnings.push(SecurityWarning::warning(
                "SEC003",
                format!(
                    "Signature tolerance of {}s widens the replay window",
                    config.signature.tolerance_secs
                ),
                "Keep signature.tolerance_secs at 300 or below",
            ));
        }
    }

    fn check_rate_limiting(
        config: &AppConfig,
        is_production: bool,
        warnings: &mut Vec<SecurityWarning>,
    ) {
        if !config.security.rate_limit.enabled {
            let severity = if is_production {
                WarningSeverity::Warning
            } else {
                WarningSeverity::Info
            };

            warnings.push(SecurityWarning::new(
                severity,
                "SEC004",
                "Rate limiting is disabled",
                "Enable security.rate_limit.enabled to protect against abuse",
            ));
        }
    }

    fn check_quotas(config: &AppConfig, is_production: bool, warnings: &mut Vec<SecurityWarning>) {
        let rate_limit = &config.security.rate_limit;

        if rate_limit.strict_limit >= rate_limit.standard_limit {
            warnings.push(SecurityWarning::warning(
                "SEC005",
                "Strict quota is not lower than the standard quota",
                "Lower security.rate_limit.strict_limit for sensitive paths",
            ));
        }

        if rate_limit.abuse_multiplier < 1.0 {
            let severity = if is_production {
                WarningSeverity::Critical
            } else {
                WarningSeverity::Warning
            };

            warnings.push(SecurityWarning::new(
                severity,
                "SEC006",
                "Abuse multiplier below 1.0 blocks clients before their quota is used",
                "Set security.rate_limit.abuse_multiplier to 1.0 or higher",
            ));
        }
    }

    fn check_bypass_paths(
        config: &AppConfig,
        is_production: bool,
        warnings: &mut Vec<SecurityWarning>,
    ) {
        let bypasses_everything = config
            .security
            .bypass_paths
            .iter()
            .any(|p| p.is_empty() || p == "/");

        if bypasses_everything {
            let severity = if is_production {
                WarningSeverity::Critical
            } else {
                WarningSeverity::Warning
            };

            warnings.push(SecurityWarning::new(
                severity,
                "SEC007",
                "A bypass path matches every request",
                "Remove \"/\" and empty entries from security.bypass_paths",
            ));
        }
    }

    fn check_body_limit(config: &AppConfig, warnings: &mut Vec<SecurityWarning>) {
        if config.security.max_body_bytes > 10 * 1024 * 1024 {
            warnings.push(SecurityWarning::info(
                "SEC008",
                "Request bodies above 10MB are buffered for validation",
                "Lower security.max_body_bytes unless large uploads are expected",
            ));
        }
    }
}

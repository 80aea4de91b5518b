//! Security configuration: rate limiting, input validation, response headers.

use std::{net::IpAddr, time::Duration};

use application::{
    ApplicationError, DEFAULT_ALLOWED_TAGS, InputValidatorConfig, Quota, RateLimiterConfig,
};
use serde::{Deserialize, Serialize};

use super::default_true;

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests per window for ordinary traffic
    #[serde(default = "default_standard_limit")]
    pub standard_limit: u32,

    /// Standard window length in seconds
    #[serde(default = "default_window_secs")]
    pub standard_window_secs: u64,

    /// Requests per window on sensitive paths
    #[serde(default = "default_strict_limit")]
    pub strict_limit: u32,

    /// Strict window length in seconds
    #[serde(default = "default_window_secs")]
    pub strict_window_secs: u64,

    /// Attempts above `limit × abuse_multiplier` block the client
    #[serde(default = "default_abuse_multiplier")]
    pub abuse_multiplier: f64,

    /// Period over which abuse attempts are counted (default: standard window)
    #[serde(default)]
    pub abuse_period_secs: Option<u64>,

    /// How long an abuse block lasts (default: standard window)
    #[serde(default)]
    pub abuse_cooldown_secs: Option<u64>,

    /// Path globs that use the strict quota
    ///
    /// `*` matches any run of characters, including `/`.
    #[serde(default = "default_sensitive_paths")]
    pub sensitive_path_patterns: Vec<String>,

    /// Stale window cleanup interval in seconds (default: 300 = 5 minutes)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Window idle time in seconds before cleanup (default: 600 = 10 minutes)
    #[serde(default = "default_cleanup_max_idle")]
    pub cleanup_max_idle_secs: u64,
}

const fn default_standard_limit() -> u32 {
    100
}

const fn default_strict_limit() -> u32 {
    10
}

const fn default_window_secs() -> u64 {
    60
}

const fn default_abuse_multiplier() -> f64 {
    1.5
}

fn default_sensitive_paths() -> Vec<String> {
    vec!["*/auth/*".to_string()]
}

const fn default_cleanup_interval() -> u64 {
    300 // 5 minutes
}

const fn default_cleanup_max_idle() -> u64 {
    600 // 10 minutes
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            standard_limit: default_standard_limit(),
            standard_window_secs: default_window_secs(),
            strict_limit: default_strict_limit(),
            strict_window_secs: default_window_secs(),
            abuse_multiplier: default_abuse_multiplier(),
            abuse_period_secs: None,
            abuse_cooldown_secs: None,
            sensitive_path_patterns: default_sensitive_paths(),
            cleanup_interval_secs: default_cleanup_interval(),
            cleanup_max_idle_secs: default_cleanup_max_idle(),
        }
    }
}

impl RateLimitConfig {
    /// Build the rate limiter settings
    #[must_use]
    pub fn limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            standard: Quota::per_secs(self.standard_limit, self.standard_window_secs),
            strict: Quota::per_secs(self.strict_limit, self.strict_window_secs),
            abuse_multiplier: self.abuse_multiplier,
            abuse_period: Duration::from_secs(
                self.abuse_period_secs.unwrap_or(self.standard_window_secs),
            ),
            abuse_cooldown: Duration::from_secs(
                self.abuse_cooldown_secs.unwrap_or(self.standard_window_secs),
            ),
        }
    }

    /// Cleanup interval
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Idle time after which windows are dropped
    #[must_use]
    pub const fn cleanup_max_idle(&self) -> Duration {
        Duration::from_secs(self.cleanup_max_idle_secs)
    }

    /// Check the cleanup schedule against the limiter settings
    ///
    /// # Errors
    ///
    /// Fails when the interval is zero, or when the idle time is shorter than
    /// the longest window or abuse period, which would drop live counters.
    pub fn validate_cleanup(&self) -> Result<(), ApplicationError> {
        if self.cleanup_interval_secs == 0 {
            return Err(ApplicationError::Configuration(
                "rate limit cleanup interval must be greater than zero".to_string(),
            ));
        }
        let min_idle = self.limiter_config().min_idle();
        if self.cleanup_max_idle() < min_idle {
            return Err(ApplicationError::Configuration(format!(
                "rate limit cleanup idle time of {}s is shorter than the {}s the limiter \
                 needs to keep live windows",
                self.cleanup_max_idle_secs,
                min_idle.as_secs()
            )));
        }
        Ok(())
    }
}

/// Security middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Rate limiting settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Path prefixes that skip every check (health probes)
    #[serde(default = "default_bypass_paths")]
    pub bypass_paths: Vec<String>,

    /// Trusted proxy IP addresses for X-Forwarded-For header validation
    ///
    /// Only IPs in this list are trusted to set X-Forwarded-For headers.
    /// If empty, the direct connection IP is always used.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,

    /// Largest accepted request body in bytes (default: 1MB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Forward the sanitized body instead of the original bytes
    #[serde(default)]
    pub forward_sanitized_body: bool,

    /// Markup tags kept when sanitizing strings
    #[serde(default = "default_allowed_tags")]
    pub allowed_tags: Vec<String>,

    /// `Strict-Transport-Security` header value
    #[serde(default = "default_hsts_policy")]
    pub hsts_policy: String,
}

fn default_bypass_paths() -> Vec<String> {
    vec!["/health".to_string(), "/ready".to_string()]
}

const fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1MB
}

fn default_allowed_tags() -> Vec<String> {
    DEFAULT_ALLOWED_TAGS.iter().map(ToString::to_string).collect()
}

fn default_hsts_policy() -> String {
    "max-age=31536000; includeSubDomains".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            bypass_paths: default_bypass_paths(),
            trusted_proxies: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
            forward_sanitized_body: false,
            allowed_tags: default_allowed_tags(),
            hsts_policy: default_hsts_policy(),
        }
    }
}

impl SecurityConfig {
    /// Build the input validator settings
    #[must_use]
    pub fn validator_config(&self) -> InputValidatorConfig {
        InputValidatorConfig {
            allowed_tags: self.allowed_tags.clone(),
        }
    }
}

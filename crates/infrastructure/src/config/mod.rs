//! Application configuration
//!
//! Split into focused sub-modules:
//! - `server`: HTTP server settings
//! - `security`: Rate limiting, input validation, response headers
//! - `signature`: Request signing secret and replay window
//!
//! Values are layered: serde defaults, then an optional `config.toml`, then
//! `CLAIMS_GUARD__*` environment variables.

mod security;
mod server;
mod signature;

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

pub use security::{RateLimitConfig, SecurityConfig};
pub use server::ServerConfig;
pub use signature::SignatureConfig;

use crate::telemetry::TelemetryConfig;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "CLAIMS_GUARD";

/// Separator between prefix and nested keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Keys parsed as comma-separated lists when set from the environment
const LIST_KEYS: &[&str] = &[
    "security.bypass_paths",
    "security.trusted_proxies",
    "security.allowed_tags",
    "security.rate_limit.sensitive_path_patterns",
];

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Application environment (development or production)
///
/// Controls security validation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment - relaxed security warnings
    #[default]
    Development,
    /// Production environment - strict security validation
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!(
                "Invalid environment: {s}. Use 'development' or 'production'"
            )),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development or production)
    ///
    /// In production, critical security warnings prevent startup unless
    /// `CLAIMS_GUARD_ALLOW_INSECURE_CONFIG=true`.
    #[serde(default)]
    pub environment: Option<Environment>,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Security middleware configuration
    #[serde(default)]
    pub security: SecurityConfig,

    /// Request signing configuration
    #[serde(default)]
    pub signature: SignatureConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from `config.toml` (if present) and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::build(config::File::with_name("config").required(false))
    }

    /// Load configuration from a specific file, then environment overrides
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        Self::build(config::File::from(path).required(true))
    }

    fn build<S>(file: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let environment = LIST_KEYS.iter().fold(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .list_separator(",")
                .try_parsing(true),
            |env, key| env.with_list_parse_key(key),
        );

        let config = config::Config::builder()
            .add_source(file)
            // Override with environment variables (e.g., CLAIMS_GUARD__SERVER__PORT)
            .add_source(environment)
            .build()?;
        config.try_deserialize()
    }

    /// Effective environment, defaulting to development
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment.unwrap_or_default()
    }

    /// Whether running in production
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment() == Environment::Production
    }
}

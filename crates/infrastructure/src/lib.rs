//! Infrastructure layer - Configuration, logging and port adapters
//!
//! Loads the layered configuration, installs the tracing subscriber and
//! provides the wall-clock adapter for the application services.

pub mod adapters;
pub mod config;
pub mod telemetry;
pub mod validation;

pub use adapters::SystemClock;
pub use config::{
    AppConfig, Environment, RateLimitConfig, SecurityConfig, ServerConfig, SignatureConfig,
};
pub use telemetry::{LogFormat, TelemetryConfig, TelemetryError, init_telemetry};
pub use validation::{SecurityValidator, SecurityWarning, WarningSeverity};

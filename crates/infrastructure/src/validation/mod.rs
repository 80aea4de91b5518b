//! Startup checks for application configuration

pub mod security;

pub use security::{ALLOW_INSECURE_ENV, SecurityValidator, SecurityWarning, WarningSeverity};

//! Clock port
//!
//! Every time-dependent decision (window expiry, abuse cooldown, signature
//! freshness) reads the current time through this port so that tests can
//! drive time explicitly.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

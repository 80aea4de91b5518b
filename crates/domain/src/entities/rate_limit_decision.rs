//! Outcome of a single rate-limit check

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::RateMode;

/// Admission decision with the quota information reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Mode whose quota was consulted
    pub mode: RateMode,
    /// Quota for the current window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window (or abuse block) ends
    pub reset_at: DateTime<Utc>,
    /// Seconds to wait before retrying, set only on rejection
    pub retry_after_secs: Option<u64>,
    /// Whether the rejection came from an abuse block rather than the window
    pub blocked: bool,
}

impl RateLimitDecision {
    /// An admitted request
    #[must_use]
    pub const fn admitted(
        mode: RateMode,
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    ) -> Self {
        Self {
            allowed: true,
            mode,
            limit,
            remaining,
            reset_at,
            retry_after_secs: None,
            blocked: false,
        }
    }

    /// A request rejected because the window quota is used up
    #[must_use]
    pub const fn rejected(
        mode: RateMode,
        limit: u32,
        reset_at: DateTime<Utc>,
        retry_after_secs: u64,
    ) -> Self {
        Self {
            allowed: false,
            mode,
            limit,
            remaining: 0,
            reset_at,
            retry_after_secs: Some(retry_after_secs),
            blocked: false,
        }
    }

    /// A request rejected because its identity is under an abuse block
    #[must_use]
    pub const fn blocked(
        mode: RateMode,
        limit: u32,
        blocked_until: DateTime<Utc>,
        retry_after_secs: u64,
    ) -> Self {
        Self {
            allowed: false,
            mode,
            limit,
            remaining: 0,
            reset_at: blocked_until,
            retry_after_secs: Some(retry_after_secs),
            blocked: true,
        }
    }

    /// Seconds to wait, or zero for admitted requests
    #[must_use]
    pub fn retry_after(&self) -> u64 {
        self.retry_after_secs.unwrap_or(0)
    }
}

//! Fixed-window rate limiter with abuse escalation
//!
//! Counts requests per `(identity, mode)` over fixed windows. Every call
//! increments the window counter, admitted or not, so the counter also serves
//! as the attempt count.
//!
//! Abuse attempts are tracked per identity over the abuse period. Attempts in
//! one mode are checked against `limit × abuse_multiplier` for that mode, and
//! attempts across all modes against the largest of those thresholds, so
//! alternating between modes does not reset the count. Crossing either blocks
//! the whole identity for a cooldown during which every mode is rejected
//! without touching the window counters.
//!
//! All state of one identity sits behind a single mutex, so the block check
//! and the window update happen atomically. The outer map is only locked long
//! enough to fetch or insert that mutex, so unrelated identities never wait on
//! each other.

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use domain::{ClientIdentity, RateLimitDecision, RateMode};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{error::ApplicationError, ports::Clock};

/// Request allowance for one mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Requests admitted per window
    pub limit: u32,
    /// Window length
    pub window: StdDuration,
}

impl Quota {
    /// Create a quota of `limit` requests per `window_secs` seconds
    #[must_use]
    pub const fn per_secs(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window: StdDuration::from_secs(window_secs),
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Quota for ordinary traffic
    pub standard: Quota,
    /// Quota for sensitive paths
    pub strict: Quota,
    /// Attempts above `limit × abuse_multiplier` trigger a block
    pub abuse_multiplier: f64,
    /// Observation period for counting abuse attempts
    pub abuse_period: StdDuration,
    /// How long an abuse block lasts
    pub abuse_cooldown: StdDuration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            standard: Quota::per_secs(100, 60),
            strict: Quota::per_secs(10, 60),
            abuse_multiplier: 1.5,
            abuse_period: StdDuration::from_secs(60),
            abuse_cooldown: StdDuration::from_secs(60),
        }
    }
}

impl RateLimiterConfig {
    /// Quota for a mode
    #[must_use]
    pub const fn quota(&self, mode: RateMode) -> Quota {
        match mode {
            RateMode::Standard => self.standard,
            RateMode::Strict => self.strict,
        }
    }

    /// Attempts in `mode` above which the identity is blocked
    #[must_use]
    pub fn abuse_threshold(&self, mode: RateMode) -> f64 {
        f64::from(self.quota(mode).limit) * self.abuse_multiplier
    }

    /// Shortest idle time after which dropping a client's state cannot hand
    /// it a fresh quota or attempt count early
    #[must_use]
    pub fn min_idle(&self) -> StdDuration {
        self.standard
            .window
            .max(self.strict.window)
            .max(self.abuse_period)
    }

    /// Reject configurations that would make the limiter meaningless
    pub fn validate(&self) -> Result<(), ApplicationError> {
        for mode in RateMode::all() {
            let quota = self.quota(*mode);
            if quota.limit == 0 {
                return Err(ApplicationError::Configuration(format!(
                    "{mode} rate limit must be greater than zero"
                )));
            }
            if quota.window.is_zero() {
                return Err(ApplicationError::Configuration(format!(
                    "{mode} rate limit window must be greater than zero"
                )));
            }
        }
        if !self.abuse_multiplier.is_finite() || self.abuse_multiplier <= 0.0 {
            return Err(ApplicationError::Configuration(
                "abuse multiplier must be a positive number".to_string(),
            ));
        }
        if self.abuse_period.is_zero() {
            return Err(ApplicationError::Configuration(
                "abuse period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn to_delta(duration: StdDuration) -> Duration {
    Duration::from_std(duration).unwrap_or(Duration::MAX)
}

fn add_clamped(at: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whole seconds from `now` until `until`, rounded up and at least one
fn seconds_until(until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (until - now).num_milliseconds().max(1);
    u64::try_from(millis).map_or(1, |m| m.div_ceil(1000))
}

const fn mode_index(mode: RateMode) -> usize {
    match mode {
        RateMode::Standard => 0,
        RateMode::Strict => 1,
    }
}

/// Counter of one `(identity, mode)` window
#[derive(Debug)]
struct RateWindow {
    count: u32,
    window_start: DateTime<Utc>,
    window: Duration,
    attempts: u32,
}

impl RateWindow {
    const fn new(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            window_start: now,
            window,
            attempts: 0,
        }
    }

    fn window_end(&self) -> DateTime<Utc> {
        add_clamped(self.window_start, self.window)
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if now >= self.window_end() {
            self.count = 0;
            self.window_start = now;
        }
    }
}

/// Everything the limiter knows about one identity
#[derive(Debug)]
struct ClientState {
    windows: [Option<RateWindow>; 2],
    attempts: u32,
    attempts_start: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
    last_seen: DateTime<Utc>,
}

impl ClientState {
    const fn new(now: DateTime<Utc>) -> Self {
        Self {
            windows: [None, None],
            attempts: 0,
            attempts_start: now,
            blocked_until: None,
            last_seen: now,
        }
    }

    fn active_block(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.blocked_until {
            Some(until) if until > now => Some(until),
            Some(_) => {
                self.blocked_until = None;
                None
            }
            None => None,
        }
    }

    fn roll_attempts(&mut self, now: DateTime<Utc>, abuse_period: Duration) {
        if now >= add_clamped(self.attempts_start, abuse_period) {
            self.reset_attempts(now);
        }
    }

    fn reset_attempts(&mut self, now: DateTime<Utc>) {
        self.attempts = 0;
        self.attempts_start = now;
        for window in self.windows.iter_mut().flatten() {
            window.attempts = 0;
        }
    }

    fn window_mut(
        &mut self,
        mode: RateMode,
        now: DateTime<Utc>,
        length: Duration,
    ) -> &mut RateWindow {
        let window =
            self.windows[mode_index(mode)].get_or_insert_with(|| RateWindow::new(now, length));
        window.roll(now);
        window
    }
}

/// Per-identity, per-mode fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    identity_threshold: f64,
    clients: DashMap<ClientIdentity, Arc<Mutex<ClientState>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter
    pub fn new(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Result<Self, ApplicationError> {
        config.validate()?;
        let identity_threshold = RateMode::all()
            .iter()
            .map(|mode| config.abuse_threshold(*mode))
            .fold(0.0, f64::max);
        Ok(Self {
            config,
            identity_threshold,
            clients: DashMap::new(),
            clock,
        })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Count one request from `identity` against `mode` and decide admission
    pub fn check_rate_limit(&self, identity: &ClientIdentity, mode: RateMode) -> RateLimitDecision {
        let now = self.clock.now();
        let quota = self.config.quota(mode);

        let state = self.client_for(identity, now);
        let mut client = state.lock();
        client.last_seen = now;

        if let Some(until) = client.active_block(now) {
            debug!(client = %identity, mode = %mode, "Identity is blocked for abuse");
            return RateLimitDecision::blocked(mode, quota.limit, until, seconds_until(until, now));
        }

        client.roll_attempts(now, to_delta(self.config.abuse_period));
        client.attempts = client.attempts.saturating_add(1);
        let identity_attempts = client.attempts;

        let window = client.window_mut(mode, now, to_delta(quota.window));
        window.count = window.count.saturating_add(1);
        window.attempts = window.attempts.saturating_add(1);
        let (count, mode_attempts, reset_at) = (window.count, window.attempts, window.window_end());

        if f64::from(mode_attempts) > self.config.abuse_threshold(mode)
            || f64::from(identity_attempts) > self.identity_threshold
        {
            let until = add_clamped(now, to_delta(self.config.abuse_cooldown));
            client.blocked_until = Some(until);
            client.reset_attempts(now);
            drop(client);

            warn!(
                client = %identity,
                mode = %mode,
                limit = quota.limit,
                mode_attempts,
                identity_attempts,
                cooldown_secs = self.config.abuse_cooldown.as_secs(),
                "Abuse threshold exceeded, blocking identity"
            );
            return RateLimitDecision::blocked(mode, quota.limit, until, seconds_until(until, now));
        }

        if count <= quota.limit {
            RateLimitDecision::admitted(mode, quota.limit, quota.limit - count, reset_at)
        } else {
            RateLimitDecision::rejected(mode, quota.limit, reset_at, seconds_until(reset_at, now))
        }
    }

    /// Requests left for `identity` in its current `mode` window, without
    /// counting a request
    #[must_use]
    pub fn remaining(&self, identity: &ClientIdentity, mode: RateMode) -> u32 {
        let now = self.clock.now();
        let limit = self.config.quota(mode).limit;
        let Some(state) = self.clients.get(identity).map(|c| Arc::clone(c.value())) else {
            return limit;
        };
        let client = state.lock();
        match &client.windows[mode_index(mode)] {
            Some(window) if now < window.window_end() => limit.saturating_sub(window.count),
            _ => limit,
        }
    }

    /// Whether `identity` is currently under an abuse block
    #[must_use]
    pub fn is_blocked(&self, identity: &ClientIdentity) -> bool {
        let now = self.clock.now();
        self.clients
            .get(identity)
            .map(|c| Arc::clone(c.value()))
            .is_some_and(|state| state.lock().active_block(now).is_some())
    }

    /// Drop clients idle for longer than `max_idle` that are not blocked
    ///
    /// Returns the number of clients removed.
    pub fn cleanup(&self, max_idle: StdDuration) -> usize {
        let now = self.clock.now();
        let cutoff = now
            .checked_sub_signed(to_delta(max_idle))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = self.clients.len();

        self.clients.retain(|_, state| {
            // A client another request is holding right now is not idle.
            if Arc::strong_count(state) > 1 {
                return true;
            }
            let mut client = state.lock();
            client.last_seen > cutoff || client.active_block(now).is_some()
        });

        let removed = before.saturating_sub(self.clients.len());
        if removed > 0 {
            debug!(removed, remaining = self.clients.len(), "Cleaned up idle rate-limit state");
        }
        removed
    }

    /// Number of identities currently tracked
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    fn client_for(
        &self,
        identity: &ClientIdentity,
        now: DateTime<Utc>,
    ) -> Arc<Mutex<ClientState>> {
        if let Some(client) = self.clients.get(identity) {
            return Arc::clone(client.value());
        }
        let client = self
            .clients
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ClientState::new(now))));
        Arc::clone(client.value())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::testing::MockClock;

    fn limiter_with(config: RateLimiterConfig) -> (RateLimiter, MockClock) {
        let clock = MockClock::at_unix(1_700_000_000);
        let limiter = RateLimiter::new(config, Arc::new(clock.clone())).unwrap();
        (limiter, clock)
    }

    fn limiter() -> (RateLimiter, MockClock) {
        limiter_with(RateLimiterConfig::default())
    }

    fn id(key: &str) -> ClientIdentity {
        ClientIdentity::new(key)
    }

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let (limiter, _clock) = limiter();
        let client = id("10.0.0.1");

        for i in 1..=100 {
            let decision = limiter.check_rate_limit(&client, RateMode::Standard);
            assert!(decision.allowed, "request {i} should be admitted");
            assert_eq!(decision.remaining, 100 - i);
            assert_eq!(decision.limit, 100);
        }

        let decision = limiter.check_rate_limit(&client, RateMode::Standard);
        assert!(!decision.allowed);
        assert!(!decision.blocked);
        assert!(decision.retry_after() > 0);
        assert!(decision.retry_after() <= 60);
    }

    #[test]
    fn retry_after_counts_down_with_time() {
        let (limiter, clock) = limiter();
        let client = id("10.0.0.2");

        for _ in 0..100 {
            limiter.check_rate_limit(&client, RateMode::Standard);
        }
        clock.advance_secs(45);

        let decision = limiter.check_rate_limit(&client, RateMode::Standard);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after(), 15);
    }

    #[test]
    fn window_resets_after_expiry() {
        let (limiter, clock) = limiter();
        let client = id("10.0.0.3");

        for _ in 0..101 {
            limiter.check_rate_limit(&client, RateMode::Standard);
        }
        clock.advance_secs(60);

        let decision = limiter.check_rate_limit(&client, RateMode::Standard);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 99);
    }

    #[test]
    fn reset_at_is_window_end() {
        let (limiter, clock) = limiter();
        let start = clock.now();

        let decision = limiter.check_rate_limit(&id("a"), RateMode::Standard);

        assert_eq!(decision.reset_at, start + Duration::seconds(60));
    }

    #[test]
    fn identities_are_independent() {
        let (limiter, _clock) = limiter();
        let a = id("10.0.0.10");
        let b = id("10.0.0.11");

        for _ in 0..100 {
            limiter.check_rate_limit(&a, RateMode::Standard);
        }
        assert!(!limiter.check_rate_limit(&a, RateMode::Standard).allowed);

        assert_eq!(limiter.remaining(&b, RateMode::Standard), 100);
        let decision = limiter.check_rate_limit(&b, RateMode::Standard);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 99);
    }

    #[test]
    fn strict_mode_admits_exactly_ten() {
        let (limiter, _clock) = limiter();
        let client = id("10.0.0.20");

        for _ in 0..5 {
            limiter.check_rate_limit(&client, RateMode::Standard);
        }
        for i in 1..=10 {
            assert!(
                limiter.check_rate_limit(&client, RateMode::Strict).allowed,
                "strict request {i} should be admitted"
            );
        }
        let eleventh = limiter.check_rate_limit(&client, RateMode::Strict);
        assert!(!eleventh.allowed);
        assert_eq!(eleventh.limit, 10);

        assert_eq!(limiter.remaining(&client, RateMode::Standard), 95);
    }

    #[test]
    fn abuse_blocks_every_mode_until_cooldown() {
        let (limiter, clock) = limiter();
        let client = id("10.0.0.30");

        // 10 × 1.5 = 15 attempts allowed before the block.
        for _ in 0..15 {
            limiter.check_rate_limit(&client, RateMode::Strict);
        }
        assert!(!limiter.is_blocked(&client));

        let trigger = limiter.check_rate_limit(&client, RateMode::Strict);
        assert!(!trigger.allowed);
        assert!(trigger.blocked);
        assert!(limiter.is_blocked(&client));

        let standard = limiter.check_rate_limit(&client, RateMode::Standard);
        assert!(!standard.allowed);
        assert!(standard.blocked);
        assert_eq!(standard.retry_after(), 60);

        clock.advance_secs(61);
        assert!(!limiter.is_blocked(&client));
        assert!(limiter.check_rate_limit(&client, RateMode::Standard).allowed);
    }

    #[test]
    fn blocked_requests_do_not_consume_quota() {
        let (limiter, clock) = limiter();
        let client = id("10.0.0.31");

        for _ in 0..16 {
            limiter.check_rate_limit(&client, RateMode::Strict);
        }
        for _ in 0..50 {
            limiter.check_rate_limit(&client, RateMode::Standard);
        }
        assert_eq!(limiter.remaining(&client, RateMode::Standard), 100);

        clock.advance_secs(60);
        assert_eq!(limiter.remaining(&client, RateMode::Standard), 100);
    }

    #[test]
    fn abuse_block_does_not_affect_other_identities() {
        let (limiter, _clock) = limiter();
        let abuser = id("10.0.0.40");
        let bystander = id("10.0.0.41");

        for _ in 0..20 {
            limiter.check_rate_limit(&abuser, RateMode::Strict);
        }
        assert!(limiter.is_blocked(&abuser));
        assert!(limiter.check_rate_limit(&bystander, RateMode::Strict).allowed);
    }

    #[test]
    fn alternating_modes_does_not_evade_abuse_block() {
        let (limiter, _clock) = limiter();
        let client = id("10.0.0.32");

        // Below each mode's own threshold (150 and 15), 150 attempts in total.
        for _ in 0..140 {
            limiter.check_rate_limit(&client, RateMode::Standard);
        }
        for _ in 0..10 {
            limiter.check_rate_limit(&client, RateMode::Strict);
        }
        assert!(!limiter.is_blocked(&client));

        let trigger = limiter.check_rate_limit(&client, RateMode::Strict);
        assert!(trigger.blocked);
        assert!(limiter.check_rate_limit(&client, RateMode::Standard).blocked);
    }

    #[test]
    fn full_use_of_both_quotas_is_not_abuse() {
        let (limiter, _clock) = limiter();
        let client = id("10.0.0.33");

        for _ in 0..100 {
            assert!(limiter.check_rate_limit(&client, RateMode::Standard).allowed);
        }
        for _ in 0..10 {
            assert!(limiter.check_rate_limit(&client, RateMode::Strict).allowed);
        }
        assert!(!limiter.is_blocked(&client));
    }

    #[test]
    fn abuse_attempts_expire_with_the_period() {
        let (limiter, clock) = limiter();
        let client = id("10.0.0.34");

        for _ in 0..15 {
            limiter.check_rate_limit(&client, RateMode::Strict);
        }
        clock.advance_secs(60);

        let decision = limiter.check_rate_limit(&client, RateMode::Strict);
        assert!(decision.allowed);
        assert!(!limiter.is_blocked(&client));
    }

    #[test]
    fn nothing_passes_once_the_block_is_set() {
        let (limiter, _clock) = limiter();
        let limiter = Arc::new(limiter);
        let client = id("10.0.0.51");

        let decisions: Vec<RateLimitDecision> = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let limiter = Arc::clone(&limiter);
                    let client = client.clone();
                    scope.spawn(move || {
                        (0..20)
                            .map(|_| limiter.check_rate_limit(&client, RateMode::Standard))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        // 150 attempts are counted, the 151st sets the block, the rest hit it.
        assert_eq!(decisions.iter().filter(|d| d.allowed).count(), 100);
        assert_eq!(decisions.iter().filter(|d| d.blocked).count(), 170);
        assert!(limiter.is_blocked(&client));
    }

    #[test]
    fn cleanup_keeps_blocked_clients() {
        let config = RateLimiterConfig {
            abuse_cooldown: StdDuration::from_secs(3600),
            ..RateLimiterConfig::default()
        };
        let (limiter, clock) = limiter_with(config);
        let client = id("10.0.0.35");
        for _ in 0..16 {
            limiter.check_rate_limit(&client, RateMode::Strict);
        }
        clock.advance_secs(700);

        assert_eq!(limiter.cleanup(StdDuration::from_secs(600)), 0);
        assert!(limiter.is_blocked(&client));
    }

    #[test]
    fn min_idle_covers_longest_window_and_abuse_period() {
        let config = RateLimiterConfig {
            strict: Quota::per_secs(10, 900),
            abuse_period: StdDuration::from_secs(120),
            ..RateLimiterConfig::default()
        };
        assert_eq!(config.min_idle(), StdDuration::from_secs(900));
        assert_eq!(RateLimiterConfig::default().min_idle(), StdDuration::from_secs(60));
    }

    #[test]
    fn cleanup_drops_idle_windows_only() {
        let (limiter, clock) = limiter();
        limiter.check_rate_limit(&id("old"), RateMode::Standard);
        clock.advance_secs(700);
        limiter.check_rate_limit(&id("fresh"), RateMode::Standard);

        let removed = limiter.cleanup(StdDuration::from_secs(600));

        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.remaining(&id("old"), RateMode::Standard), 100);
    }

    #[test]
    fn empty_and_odd_identities_are_ordinary_keys() {
        let (limiter, _clock) = limiter();
        assert!(limiter.check_rate_limit(&id(""), RateMode::Standard).allowed);
        assert!(limiter.check_rate_limit(&id("../\u{0}✓"), RateMode::Strict).allowed);
        assert_eq!(limiter.remaining(&id(""), RateMode::Standard), 99);
    }

    #[test]
    fn concurrent_bursts_never_exceed_limit() {
        let (limiter, _clock) = limiter_with(RateLimiterConfig {
            abuse_multiplier: 100.0,
            ..RateLimiterConfig::default()
        });
        let limiter = Arc::new(limiter);
        let client = id("10.0.0.50");

        let admitted: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let limiter = Arc::clone(&limiter);
                    let client = client.clone();
                    scope.spawn(move || {
                        (0..25)
                            .filter(|_| limiter.check_rate_limit(&client, RateMode::Standard).allowed)
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(admitted, 100);
    }

    #[test]
    fn rejects_zero_limit_config() {
        let config = RateLimiterConfig {
            strict: Quota::per_secs(0, 60),
            ..RateLimiterConfig::default()
        };
        let err = RateLimiter::new(config, Arc::new(MockClock::at_unix(0))).unwrap_err();
        assert!(err.to_string().contains("strict rate limit"));
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let config = RateLimiterConfig {
            abuse_multiplier: 0.0,
            ..RateLimiterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn seconds_until_rounds_up() {
        let now = Utc::now();
        assert_eq!(seconds_until(now + Duration::milliseconds(1500), now), 2);
        assert_eq!(seconds_until(now, now), 1);
    }
}

//! Rate limiter cleanup task
//!
//! Periodically drops rate-limit windows and abuse blocks that have gone idle,
//! so memory stays bounded by recently active clients.

use std::{sync::Arc, time::Duration};

use application::RateLimiter;
use tracing::{debug, info};

/// Spawn a background task that periodically cleans up idle rate-limit state.
///
/// Windows untouched for longer than `max_idle` are removed every `interval`.
/// A removed identity starts again with a full quota.
///
/// Returns a `JoinHandle` that can be used to abort the task when shutting down.
///
/// # Example
///
/// ```ignore
/// let cleanup_handle = spawn_rate_limit_cleanup_task(
///     Arc::clone(&limiter),
///     Duration::from_secs(300),
///     Duration::from_secs(600),
/// );
///
/// // On shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_rate_limit_cleanup_task(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(
        interval_secs = interval.as_secs(),
        max_idle_secs = max_idle.as_secs(),
        "Starting rate limiter cleanup task"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Don't run immediately on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = limiter.cleanup(max_idle);
            if removed > 0 {
                info!(
                    removed_count = removed,
                    tracked = limiter.tracked_clients(),
                    "Cleaned up idle rate-limit state"
                );
            } else {
                debug!(tracked = limiter.tracked_clients(), "No idle rate-limit state");
            }
        }
    })
}

//! Sliding-window rate limiter
//!
//! Bounds an operation to `calls` invocations within any trailing window of
//! length `period`. Callers that arrive at capacity are suspended until the
//! oldest recorded call leaves the window.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter
///
/// The timestamp window is held behind an async mutex for the whole of
/// `acquire`, so concurrent callers queue up behind each other and the
/// window can never hold more than `calls` entries.
#[derive(Debug)]
pub struct RateLimiter {
    calls: usize,
    period: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `calls` invocations per `period`
    ///
    /// A quota of zero calls is treated as one.
    pub fn new(calls: u32, period: Duration) -> Self {
        let calls = calls.max(1) as usize;
        Self {
            calls,
            period,
            timestamps: Mutex::new(VecDeque::with_capacity(calls)),
        }
    }

    /// Creates a limiter from the `[rate-limit]` config section
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.calls, Duration::from_millis(config.period_ms))
    }

    /// Suspends until a call can proceed without exceeding the quota, then
    /// records it
    pub async fn acquire(&self) {
        let mut timestamps = self.timestamps.lock().await;

        loop {
            let now = Instant::now();

            // Drop calls that have left the trailing window
            while let Some(&oldest) = timestamps.front() {
                if now.duration_since(oldest) >= self.period {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }

            if timestamps.len() < self.calls {
                timestamps.push_back(now);
                return;
            }

            // At capacity: wait for the oldest call to expire, then re-evaluate
            let Some(&oldest) = timestamps.front() else {
                continue;
            };
            let wait = (oldest + self.period).saturating_duration_since(now);
            tracing::debug!("Rate limit reached. Waiting {:.2} seconds", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }

    /// Returns the configured quota
    pub fn quota(&self) -> (usize, Duration) {
        (self.calls, self.period)
    }

    /// Number of calls currently recorded in the window
    pub async fn in_window(&self) -> usize {
        let timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        timestamps
            .iter()
            .filter(|&&t| now.duration_since(t) < self.period)
            .count()
    }
}

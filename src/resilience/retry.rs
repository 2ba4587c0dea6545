//! Retry executor with exponential backoff
//!
//! A [`RetryPolicy`] describes how many times to retry, how long to back off
//! and which errors are worth retrying. A [`RetryExecutor`] applies a policy
//! (optionally gated by a shared [`RateLimiter`]) to an operation value.
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Success | Return immediately |
//! | Retryable error, budget left | Sleep `delay`, multiply delay, try again |
//! | Retryable error, last attempt | `RetryExhausted` with the last error |
//! | Non-retryable error | Propagate immediately |

use crate::config::RetryConfig;
use crate::resilience::RateLimiter;
use crate::{HarvestError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy value
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Factor applied to the delay after every failed attempt
    pub backoff_multiplier: f64,

    retry_on: fn(&HarvestError) -> bool,
}

impl RetryPolicy {
    /// Creates a policy that retries every error [`HarvestError::is_retryable`] accepts
    pub fn new(retries: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            retries,
            initial_delay,
            backoff_multiplier,
            retry_on: HarvestError::is_retryable,
        }
    }

    /// Creates a policy from the `[retry]` config section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_multiplier,
        )
    }

    /// Replaces the retry predicate
    pub fn retry_on(mut self, predicate: fn(&HarvestError) -> bool) -> Self {
        self.retry_on = predicate;
        self
    }

    /// Returns true if `error` should consume another attempt
    pub fn should_retry(&self, error: &HarvestError) -> bool {
        (self.retry_on)(error)
    }

    /// Delay slept after the failed attempt with index `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 0..attempt {
            delay = next_delay(delay, self.backoff_multiplier);
        }
        delay
    }

    /// Total number of attempts the policy allows
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("initial_delay", &self.initial_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0)
    }
}

fn next_delay(current: Duration, multiplier: f64) -> Duration {
    Duration::try_from_secs_f64(current.as_secs_f64() * multiplier).unwrap_or(Duration::MAX)
}

/// Applies a [`RetryPolicy`] to fallible async operations
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    limiter: Option<Arc<RateLimiter>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            limiter: None,
        }
    }

    /// Gates every attempt behind `limiter`
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, fails permanently or the retry
    /// budget is spent
    ///
    /// # Arguments
    ///
    /// * `label` - Operation name used in log lines
    /// * `operation` - Produces a fresh future for every attempt
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The first successful result
    /// * `Err(HarvestError::RetryExhausted)` - Every attempt failed with a retryable error
    /// * `Err(e)` - The first non-retryable error, unchanged
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.policy.max_attempts();
        let mut delay = self.policy.initial_delay;
        let mut attempt = 0;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            let error = match operation().await {
                Ok(value) => {
                    tracing::debug!("{}: attempt {}/{} succeeded", label, attempt + 1, attempts);
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !self.policy.should_retry(&error) {
                tracing::warn!(
                    "{}: attempt {}/{} failed with non-retryable error: {}",
                    label,
                    attempt + 1,
                    attempts,
                    error
                );
                return Err(error);
            }

            if attempt >= self.policy.retries {
                tracing::error!(
                    "{}: all {} attempts failed. Last error: {}",
                    label,
                    attempts,
                    error
                );
                return Err(HarvestError::RetryExhausted {
                    attempts,
                    last: Box::new(error),
                });
            }

            tracing::warn!(
                "{}: attempt {}/{} failed: {}. Retrying in {:.2} seconds...",
                label,
                attempt + 1,
                attempts,
                error,
                delay.as_secs_f64()
            );

            tokio::time::sleep(delay).await;
            delay = next_delay(delay, self.policy.backoff_multiplier);
            attempt += 1;
        }
    }
}

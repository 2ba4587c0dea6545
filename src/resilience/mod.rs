//! Resilience primitives shared by the crawler and the proxy pool
//!
//! - `RateLimiter`: sliding-window quota for outbound calls
//! - `RetryPolicy` / `RetryExecutor`: bounded retries with exponential backoff

mod rate_limiter;
mod retry;

pub use rate_limiter::RateLimiter;
pub use retry::{RetryExecutor, RetryPolicy};

//! Retry with backoff for best-effort list producers.
//!
//! Source workers treat an empty result exactly like a failure: a blocked or
//! captcha'd search page usually parses fine but yields nothing. So
//! [`retry_with_backoff`] retries on `Err` *and* on `Ok(vec![])`, stops on
//! the first non-empty result, and never surfaces an error. Exhausting every
//! attempt yields an empty vector.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Retry schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Factor applied to the delay for every further attempt.
    /// `1` gives a fixed interval.
    pub multiplier: u32,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 5 attempts, 1 second apart.
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 1,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Delay to wait after `attempt` (1-indexed) came back empty.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.saturating_pow(exponent);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Why an attempt is being retried.
#[derive(Debug)]
pub enum RetryCause<'a> {
    Empty,
    Failed(&'a AppError),
}

/// Run `operation` until it yields a non-empty vector or the policy's
/// attempts are used up.
///
/// `operation` receives the 1-indexed attempt number. `on_retry` is called
/// before each sleep with the attempt that just failed and why.
pub async fn retry_with_backoff<T, F, Fut, R>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: R,
) -> Vec<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, AppError>>,
    R: FnMut(u32, RetryCause<'_>),
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        let outcome = operation(attempt).await;
        let last = attempt == attempts;
        match outcome {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) if !last => on_retry(attempt, RetryCause::Empty),
            Err(err) if !last => on_retry(attempt, RetryCause::Failed(&err)),
            _ => break,
        }
        tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
    }
    Vec::new()
}

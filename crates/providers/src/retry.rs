//! Retry policy with jittered exponential backoff for transient provider
//! failures.

use std::future::Future;
use std::time::Duration;

use av_domain::error::Result;

/// Controls how provider calls are retried.
///
/// Only errors classified retryable by [`av_domain::Error::is_retryable`]
/// (network failures, timeouts, 5xx responses) are retried; 4xx responses
/// fail immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the exponential delay.
    pub max_delay: Duration,
    /// Upper bound of the additive jitter.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy with negligible delays, for tests.
    pub fn fast() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: Duration::ZERO,
        }
    }

    /// Compute the delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = exp_ms.min(self.max_delay.as_millis() as u64);

        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            (pseudo_random_fraction(attempt) * jitter_ms as f64) as u64
        };
        Duration::from_millis(capped_ms + jitter)
    }
}

/// Cheap deterministic "random" fraction [0, 1) based on the attempt
/// number. Not cryptographically secure; just enough to spread retry
/// storms.
fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_add(1).wrapping_mul(2654435761); // Knuth multiplicative hash
    (hash as f64) / (u32::MAX as f64)
}

/// Run `op`, retrying transient failures per `policy`.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying provider call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Retry executor for flaky collaborator calls (fetch, SERP, summary).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter. Attempt n sleeps
/// `base * 2^(n-1)` plus up to `max_jitter`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let jitter_ms = if self.max_jitter.is_zero() {
            0
        } else {
            rand::rng().random_range(0..self.max_jitter.as_millis() as u64)
        };
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Runs `op` up to `policy.attempts` times, sleeping between failures.
/// The last error is returned when every attempt fails.
pub async fn with_retries<T, E, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(label, attempt, error = %e, "Giving up after final attempt");
                return Err(e);
            }
        }
    }
}

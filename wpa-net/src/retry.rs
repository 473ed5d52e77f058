// wpa-net/src/retry.rs
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};
use wpa_common::error::{Result, WpaError};
use wpa_common::CancelToken;

const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Exponential backoff with up to 25% jitter, capped at ten seconds.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(MAX_BACKOFF);
        let jitter_ms = (capped.as_millis() as u64) / 4;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        capped + Duration::from_millis(jitter)
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// attempt budget is spent. Sleeps between attempts are cut short by `cancel`.
pub async fn with_retries<T, F, Fut>(
    what: &str,
    policy: RetryPolicy,
    cancel: &CancelToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(WpaError::Cancelled);
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    what, attempt, policy.max_attempts, e, delay
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(WpaError::Cancelled),
                }
                attempt += 1;
            }
            Err(e) => {
                debug!("{} giving up after {} attempt(s): {}", what, attempt, e);
                return Err(e);
            }
        }
    }
}

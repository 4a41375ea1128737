//! Bounded retry with exponential backoff + jitter
//!
//! Every external attempt (channel, contact, emergency call) runs through a
//! `RetryPolicy`: a per-attempt timeout, a fixed attempt bound, and no retry
//! for permanent failures.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rand::Rng;

use crate::logic::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Push / Sound / Vibration
    pub fn local_device() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_millis(250),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(400),
        }
    }

    pub fn email() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(4),
        }
    }

    /// SMS / voice contact notification
    pub fn contact() -> Self {
        Self {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(15),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        }
    }

    pub fn emergency_call() -> Self {
        Self {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        }
    }

    /// Delay before attempt `attempt + 1`: doubling from `initial_backoff`,
    /// capped at `max_backoff`, plus up to 50% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);

        let jitter_ms = (base.as_millis() as u64) / 2;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt bound
    /// is reached. The attempt count is published to `attempts` as it goes
    /// so a caller that gives up early still knows how far it got.
    pub async fn run<F, Fut>(
        &self,
        label: &str,
        attempts: &AtomicU32,
        mut op: F,
    ) -> Result<(), ChannelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), ChannelError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            attempts.store(attempt, Ordering::SeqCst);

            let result = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ChannelError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(()) => {
                    if attempt > 1 {
                        log::info!("{} delivered on attempt {}", label, attempt);
                    }
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    log::debug!(
                        "{} attempt {}/{} failed: {} (retrying in {:?})",
                        label,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    log::warn!("{} failed after {} attempt(s): {}", label, attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::local_device()
    }
}

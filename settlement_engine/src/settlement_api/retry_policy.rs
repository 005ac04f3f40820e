use std::{env, future::Future, time::Duration};

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use log::*;

use crate::SettlementError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 25;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 10_000;

/// Bounded exponential backoff for optimistic transactions.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on the time spent reading, validating and staging a single attempt.
    pub transaction_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            transaction_timeout: Duration::from_millis(DEFAULT_TRANSACTION_TIMEOUT_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let max_attempts = env::var("SSE_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                info!("🪛️ SSE_MAX_ATTEMPTS is not set or invalid. Using the default, {DEFAULT_MAX_ATTEMPTS}");
                DEFAULT_MAX_ATTEMPTS
            });
        let base_backoff = duration_from_env("SSE_BASE_BACKOFF_MS", DEFAULT_BASE_BACKOFF_MS);
        let max_backoff = duration_from_env("SSE_MAX_BACKOFF_MS", DEFAULT_MAX_BACKOFF_MS);
        let transaction_timeout = duration_from_env("SSE_TRANSACTION_TIMEOUT_MS", DEFAULT_TRANSACTION_TIMEOUT_MS);
        Self { max_attempts, base_backoff, max_backoff, transaction_timeout }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// The delays between successive attempts, without jitter: `base`, `2 * base`, `4 * base`... capped at
    /// `max_backoff`. There is one delay fewer than there are attempts.
    pub fn nominal_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    /// The nominal delays with jitter added, so that a herd of conflicting settlements does not retry in lockstep.
    /// Each delay falls in `[nominal, 2 * nominal]`.
    pub fn backoff(&self) -> ExponentialBackoff {
        self.nominal_backoff().with_jitter().build()
    }

    /// Runs `attempt_fn` until it succeeds, fails with a non-retryable error, or the attempt budget is spent.
    ///
    /// `attempt_fn` receives the 1-based attempt number, and must do all its reads afresh on every call. Retryable
    /// failures ([`SettlementError::is_retryable`]) are retried after a backoff. If the last attempt also fails with a
    /// retryable error, [`SettlementError::ContentionExhausted`] is returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut attempt_fn: F) -> Result<(T, u32), SettlementError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SettlementError>>,
    {
        let mut attempt = 1;
        let mut delays = self.backoff();
        loop {
            match attempt_fn(attempt).await {
                Ok(v) => {
                    if attempt > 1 {
                        debug!("🔁️ {label} succeeded on attempt {attempt}");
                    }
                    return Ok((v, attempt));
                },
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = delays.next().unwrap_or(self.max_backoff);
                    debug!("🔁️ {label} attempt {attempt} failed: {e}. Retrying in {}ms", delay.as_millis());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) if e.is_retryable() => {
                    warn!("🔁️ {label} failed after {attempt} attempts. Last error: {e}");
                    return Err(SettlementError::ContentionExhausted { attempts: attempt });
                },
                Err(e) => return Err(e),
            }
        }
    }
}

fn duration_from_env(name: &str, default_ms: u64) -> Duration {
    let ms = env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or_else(|| {
        info!("🪛️ {name} is not set or invalid. Using the default, {default_ms}ms");
        default_ms
    });
    Duration::from_millis(ms)
}

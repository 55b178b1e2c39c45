//! Bounded retry with backoff.
//!
//! # Invariants
//! - The operation runs at most `attempts` times.
//! - Non-retryable errors return immediately.

use log::warn;
use serde::Deserialize;
use std::time::Duration;

/// Retry schedule for operations against contended storage or services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of tries, including the first one.
    pub attempts: u32,
    pub base_delay_ms: u64,
    /// Doubles the delay after each failed try when `true`.
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay_ms: 200,
            exponential: true,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts.
    pub fn fixed(attempts: u32, delay_ms: u64) -> Self {
        Self {
            attempts,
            base_delay_ms: delay_ms,
            exponential: false,
        }
    }

    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self::fixed(1, 0)
    }

    /// Delay to wait after the failed try number `failed_try` (0-based).
    pub fn delay_after(&self, failed_try: u32) -> Duration {
        if !self.exponential {
            return Duration::from_millis(self.base_delay_ms);
        }
        let factor = 1u64.checked_shl(failed_try.min(16)).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is exhausted. Returns the last error in the latter case.
    pub fn run<T, E, F, P>(&self, op_name: &str, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut failed_try = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if failed_try + 1 >= attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_after(failed_try);
                    warn!(
                        "event=retry module=store status=retry op={} attempt={} delay_ms={} error={}",
                        op_name,
                        failed_try + 1,
                        delay.as_millis(),
                        err
                    );
                    std::thread::sleep(delay);
                    failed_try += 1;
                }
            }
        }
    }
}

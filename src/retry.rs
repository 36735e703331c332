/// Bounded retry with exponential backoff around a single provider call.
///
/// Transient errors (`Network`, `RateLimited`, `Server`) are retried up to
/// the attempt limit; `NotFound` and `Schema` are terminal — retrying would
/// return the same answer. A provider-supplied Retry-After hint takes
/// precedence over the exponential schedule. Cancellation is checked
/// between attempts, never mid-call.

use crate::model::{AcquireError, CancelToken};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first (default 3).
    pub max_attempts: u32,
    /// First backoff delay; doubles each retry.
    pub base_delay: Duration,
    /// Cap on any single backoff sleep.
    pub max_delay: Duration,
    /// Budget for the sum of all backoff sleeps; once a further sleep would
    /// exceed it, the task fails with the last error.
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_total_wait: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` until success, a terminal error, attempt exhaustion,
    /// or cancellation. Returns the result together with the number of
    /// attempts actually made (0 when cancelled before the first attempt).
    pub fn run<T>(
        &self,
        cancel: &CancelToken,
        mut operation: impl FnMut() -> Result<T, AcquireError>,
    ) -> (Result<T, AcquireError>, u32) {
        let mut attempts = 0u32;
        let mut total_wait = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return (Err(AcquireError::Cancelled), attempts);
            }
            attempts += 1;

            let err = match operation() {
                Ok(value) => return (Ok(value), attempts),
                Err(err) => err,
            };

            if !err.is_transient() || attempts >= self.max_attempts {
                return (Err(err), attempts);
            }

            let delay = self.delay_for(attempts, &err);
            if total_wait + delay > self.max_total_wait {
                tracing::warn!(
                    attempts,
                    error = %err,
                    "retry wait budget exhausted, giving up"
                );
                return (Err(err), attempts);
            }

            tracing::warn!(
                attempts,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient provider error, retrying after backoff"
            );
            std::thread::sleep(delay);
            total_wait += delay;
        }
    }

    /// Backoff before the next attempt: a Retry-After hint when the
    /// provider supplied one, else base × 2^(attempt−1) with uniform jitter.
    fn delay_for(&self, attempt: u32, err: &AcquireError) -> Duration {
        if let AcquireError::RateLimited {
            retry_after: Some(hint),
        } = err
        {
            return (*hint).min(self.max_delay);
        }

        // Clamp before jitter: saturating_mul can reach Duration::MAX,
        // which mul_f64 with a factor above 1.0 cannot represent.
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16))
            .min(self.max_delay);
        let jittered = exp.mul_f64(rand::rng().random_range(0.5..1.5));
        jittered.min(self.max_delay)
    }
}

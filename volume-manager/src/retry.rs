// SPDX-License-Identifier: GPL-3.0-only

//! Bounded fixed-interval retry

use std::time::Duration;

use volume_types::MountPollPolicy;

/// Retry an operation a bounded number of times with a fixed pause.
///
/// The pause also follows the last failed attempt, so an exhausted policy
/// has waited for its whole deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl RetryPolicy {
    /// As many attempts as `interval` fits into `deadline`, at least one.
    pub fn with_deadline(interval: Duration, deadline: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            (deadline.as_micros() / interval.as_micros()).clamp(1, u128::from(u32::MAX)) as u32
        };
        Self { interval, attempts }
    }

    pub fn total_wait(&self) -> Duration {
        self.interval * self.attempts
    }

    /// Run `op` until it succeeds, `retryable` rejects an error, or attempts run out.
    ///
    /// `op` receives the zero-based attempt number. `sleep` is called with
    /// `interval` after each failed attempt.
    pub fn run<T, E>(
        &self,
        mut sleep: impl FnMut(Duration),
        mut retryable: impl FnMut(&E) -> bool,
        mut op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !retryable(&error) {
                        return Err(error);
                    }
                    sleep(self.interval);
                    attempt += 1;
                    if attempt >= self.attempts {
                        return Err(error);
                    }
                }
            }
        }
    }
}

impl From<MountPollPolicy> for RetryPolicy {
    fn from(policy: MountPollPolicy) -> Self {
        Self::with_deadline(policy.interval(), policy.deadline())
    }
}

use std::ops::AsyncFnMut;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::error::{EngineError, Result};

/// Bounded exponential backoff. `max_total_wait` is a sleep budget shared
/// across all retries of one operation, not a per-attempt cap and not an
/// attempt count: the number of retries is however many doubling waits fit
/// inside the budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub initial_wait: Duration,
    pub max_total_wait: Duration,
}

impl RetryPolicy {
    pub fn new(initial_wait: Duration, max_total_wait: Duration) -> Self {
        Self {
            initial_wait,
            max_total_wait,
        }
    }
}

/// What the backoff state machine wants next after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Sleep(Duration),
    GiveUp,
}

/// Pure backoff accounting, separated from the clock so the transitions
/// are testable without sleeping.
///
/// Invariants: the sum of all `Sleep` durations never exceeds the budget,
/// and each wait doubles but is clamped to whatever budget remains.
#[derive(Debug, Clone)]
pub struct Backoff {
    wait: Duration,
    remaining: Duration,
}

impl Backoff {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            wait: policy.initial_wait,
            remaining: policy.max_total_wait,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Advances the machine after a failed attempt: either the caller
    /// should sleep for the returned duration and try again, or the
    /// budget is exhausted.
    pub fn next_failure(&mut self) -> Step {
        if self.remaining.is_zero() {
            return Step::GiveUp;
        }
        let sleep = self.wait.min(self.remaining);
        self.remaining -= sleep;
        self.wait = self.wait.saturating_mul(2).min(self.remaining);
        Step::Sleep(sleep)
    }
}

/// Drives one retrying operation: attempt, and on any transient failure
/// sleep per the backoff machine and attempt again. Success returns
/// immediately; a non-transient error propagates without retry; budget
/// exhaustion fails with `Terminal` carrying the last error.
///
/// Every failed attempt is logged as a warning; only exhaustion is
/// surfaced to the caller.
pub async fn run_with_backoff<T>(
    policy: &RetryPolicy,
    label: &str,
    mut attempt: impl AsyncFnMut() -> Result<T>,
) -> Result<T> {
    let mut backoff = Backoff::new(policy);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(err),
        };

        match backoff.next_failure() {
            Step::Sleep(wait) => {
                warn!(
                    subject = label,
                    attempt = attempts,
                    retry_in_secs = wait.as_secs_f64(),
                    "attempt failed: {err}"
                );
                tokio::time::sleep(wait).await;
            }
            Step::GiveUp => {
                warn!(subject = label, attempt = attempts, "attempt failed, budget exhausted: {err}");
                return Err(EngineError::Terminal {
                    attempts,
                    source: Box::new(err),
                });
            }
        }
    }
}

//! Bounded repetition
//!
//! [`BoundedPolicy`] answers "may I go again, and after how long?" for any
//! loop with an attempt limit and/or a time limit. The consumer loop uses it
//! twice: as the batch-mode breaker (no delay, count and time limits) and for
//! retrying message deletion (quadratic delay, attempt limit).

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Number of times a failed delete is retried.
pub const MAX_DELETE_RETRY: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    /// `unit * n²` before the n-th repetition
    Quadratic(Duration),
}

impl Backoff {
    fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Quadratic(unit) => *unit * attempt.saturating_mul(attempt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxAttempts(u32),
    Deadline(Duration),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxAttempts(max) => write!(f, "reached max count {max}"),
            StopReason::Deadline(limit) => write!(f, "reached max time {limit:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Go again after the delay
    Continue(Duration),
    Stop(StopReason),
}

#[derive(Debug, Clone)]
pub struct BoundedPolicy {
    max_attempts: Option<u32>,
    max_elapsed: Option<Duration>,
    backoff: Backoff,
    attempts: u32,
    started: Instant,
}

impl BoundedPolicy {
    /// Zero limits are treated as unset.
    pub fn new(max_attempts: Option<u32>, max_elapsed: Option<Duration>, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.filter(|n| *n > 0),
            max_elapsed: max_elapsed.filter(|d| !d.is_zero()),
            backoff,
            attempts: 0,
            started: Instant::now(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None, None, Backoff::None)
    }

    /// Retry policy for deleting a handled message: 1s, 4s, 9s, ... 64s.
    pub fn delete_retry() -> Self {
        Self::new(
            Some(MAX_DELETE_RETRY),
            None,
            Backoff::Quadratic(Duration::from_secs(1)),
        )
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record one more attempt and decide whether it may proceed.
    ///
    /// With `max_attempts = N` the first N calls continue and call N+1 stops.
    /// With `max_elapsed = D` calls stop once D has passed since creation.
    pub fn next(&mut self) -> Step {
        self.attempts = self.attempts.saturating_add(1);
        if let Some(max) = self.max_attempts {
            if self.attempts > max {
                return Step::Stop(StopReason::MaxAttempts(max));
            }
        }
        if let Some(limit) = self.max_elapsed {
            if self.started.elapsed() >= limit {
                return Step::Stop(StopReason::Deadline(limit));
            }
        }
        Step::Continue(self.backoff.delay(self.attempts))
    }
}

//! Backoff controller for the heartbeat send loop
//!
//! Decides the delay before the next send attempt from the outcome of the
//! previous one: the steady interval after a success, exponential doubling
//! capped at 10x the interval after failures. Retries are never abandoned;
//! once `max_retries` consecutive failures are reached the controller only
//! reports the exhausted state so the caller can surface a persistent
//! failure, while delays hold at the cap.

use std::time::Duration;

/// Upper bound on the failure delay, as a multiple of the steady interval.
const CAP_MULTIPLIER: u32 = 10;

#[derive(Debug)]
pub struct Backoff {
    interval: Duration,
    max_retries: i64,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(interval: Duration, max_retries: i64) -> Self {
        Self {
            interval,
            max_retries,
            consecutive_failures: 0,
        }
    }

    /// Steady-state delay after a successful send. Resets the failure count
    /// immediately, regardless of how many failures preceded it.
    pub fn on_success(&mut self) -> Duration {
        self.consecutive_failures = 0;
        self.interval
    }

    /// Delay after a failed send: `interval * 2^n` capped at 10x interval,
    /// where `n` is the failure count before this one.
    pub fn on_failure(&mut self) -> Duration {
        let exp = self.consecutive_failures.min(31);
        let factor = (1u32 << exp).min(CAP_MULTIPLIER);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.interval * factor
    }

    /// True once `max_retries` consecutive failures have been recorded.
    /// A non-positive `max_retries` never exhausts: a misconfigured zero
    /// must not silence the agent, only skip the persistent-failure signal.
    pub fn is_exhausted(&self) -> bool {
        self.max_retries > 0 && i64::from(self.consecutive_failures) >= self.max_retries
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

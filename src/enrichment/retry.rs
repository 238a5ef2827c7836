//! Bounded retry with exponential backoff.
//!
//! One [`RetryState`] lives for one lookup. It counts attempts and hands out
//! the delay before the next one, so the worst case for a single lookup is
//! `max_attempts` requests and the sum of the capped delays in between.

use std::time::Duration;

use super::domain::LookupError;

/// Retry limits for one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Upper bound on the time spent sleeping between attempts.
    pub fn max_total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|attempt| self.delay_after(attempt))
            .sum()
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Attempt counter for one lookup.
#[derive(Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Register a failed attempt and decide whether to try again.
    pub fn on_failure(&mut self, error: &LookupError) -> RetryDecision {
        self.attempts += 1;
        if !error.is_transient() || self.attempts >= self.policy.max_attempts.max(1) {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.policy.delay_after(self.attempts))
    }
}

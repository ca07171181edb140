use std::time::Duration;

use rand::Rng;

use crate::error::ErrorClass;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(1);

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Bounded exponential backoff with additive jitter.
///
/// The delay before retrying after attempt `k` (0-based) is
/// `base_delay * 2^k + U[0, max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decide the next step after `attempt` failed with `class`, sampling jitter uniformly.
    #[must_use]
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> RetryDecision {
        let jitter = rand::thread_rng().gen_range(0.0..1.0);
        self.decide_with_jitter(attempt, class, jitter)
    }

    /// Same as [`RetryPolicy::decide`] with an explicit jitter fraction in `[0, 1)`.
    #[must_use]
    pub fn decide_with_jitter(
        &self,
        attempt: u32,
        class: ErrorClass,
        jitter: f64,
    ) -> RetryDecision {
        if !class.is_retryable() || attempt.saturating_add(1) >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt, jitter))
    }

    /// Backoff delay for a 0-based attempt index.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let backoff = self.base_delay.saturating_mul(factor);
        let jitter = self.max_jitter.mul_f64(jitter.clamp(0.0, 1.0));
        backoff.saturating_add(jitter)
    }
}

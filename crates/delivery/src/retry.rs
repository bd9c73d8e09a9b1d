//! Bounded exponential backoff for event delivery.
//!
//! The schedule is deterministic: no jitter, so the delay before each
//! attempt is a pure function of the attempt number.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default total number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay before the second attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(10);

/// Default ceiling on a single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Retry policy for transient delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts (1 = no retries).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt.
    #[serde(
        rename = "initial_delay_ms",
        with = "crate::config::duration_ms",
        default = "default_initial_delay"
    )]
    pub initial_delay: Duration,

    /// Factor applied to the delay after each attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// Ceiling on a single delay.
    #[serde(
        rename = "max_delay_ms",
        with = "crate::config::duration_ms",
        default = "default_max_delay"
    )]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: default_multiplier(),
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt cap and starting delay.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    /// Single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay to wait before `attempt` (1-based).
    ///
    /// Zero for the first attempt, then `initial_delay * multiplier^(n-2)`
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(2);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Full backoff schedule: the delay before every attempt.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map(|n| self.delay_before(n)).collect()
    }
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_initial_delay() -> Duration {
    DEFAULT_INITIAL_DELAY
}

const fn default_multiplier() -> u32 {
    2
}

const fn default_max_delay() -> Duration {
    DEFAULT_MAX_DELAY
}

//! Exponential backoff strategy.

use std::time::Duration;

/// Configuration for retry behavior with exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffStrategy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay cap for any retry attempt.
    pub max_delay: Duration,
    /// Maximum number of attempts allowed.
    pub max_attempts: u32,
    /// Percentage of jitter to add to delays (0-100).
    pub jitter_percent: u8,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
            jitter_percent: 10,
        }
    }
}

impl BackoffStrategy {
    /// Creates a new strategy with the specified parameters.
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        max_attempts: u32,
        jitter_percent: u8,
    ) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            max_attempts,
            jitter_percent: jitter_percent.min(100),
        }
    }

    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the jitter percentage, capped at 100.
    pub fn with_jitter_percent(mut self, jitter_percent: u8) -> Self {
        self.jitter_percent = jitter_percent.min(100);
        self
    }

    /// Calculates the delay after `attempt` attempts have been made.
    ///
    /// The delay is `base_delay * 2^attempt`, capped at `max_delay`, plus a
    /// deterministic non-negative jitter that never pushes it past the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(31); // Prevent overflow
        let multiplier = 1u64 << exponent;
        let base_millis = self.base_delay.as_millis() as u64;
        let max_millis = self.max_delay.as_millis() as u64;
        let capped_millis = base_millis.saturating_mul(multiplier).min(max_millis);

        let jitter_range = (capped_millis as f64 * self.jitter_percent as f64) / 100.0;
        let jitter = Self::deterministic_jitter(attempt, jitter_range);

        Duration::from_millis(capped_millis.saturating_add(jitter).min(max_millis))
    }

    /// Jitter derived from the attempt number so delays stay reproducible.
    fn deterministic_jitter(attempt: u32, jitter_range: f64) -> u64 {
        let factor = ((attempt % 5) as f64 + 1.0) / 5.0;
        (jitter_range * factor) as u64
    }
}

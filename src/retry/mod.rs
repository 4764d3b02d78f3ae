//! Retry controller with exponential backoff.
//!
//! A [`RetryController`] is owned by exactly one logical operation (a UI
//! component, a request, a stream subscription). It counts attempts against a
//! fixed budget, computes backoff delays, and refuses to run the operation
//! once the budget is spent until it is [`reset`](RetryController::reset).

mod backoff;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use backoff::BackoffStrategy;

use crate::error::{CodedFailure, ErrorRecord, Metadata, RawFailure};
use crate::handler::Handler;
use crate::registry::RegistryEntry;

/// Phase of a retry controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// More attempts are allowed.
    Ready,
    /// The budget is spent; terminal until reset.
    Exhausted,
}

/// Inspectable state of a retry controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: u32,
    /// Budget, fixed at construction.
    pub max_attempts: u32,
    /// The last delay handed out by [`RetryController::next_delay`].
    pub last_delay: Duration,
}

/// Why a guarded retry did not produce a value.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation was not invoked because the budget is spent.
    #[error("retry budget exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The operation ran and failed.
    #[error("attempt {attempt} failed: {error}")]
    Failed { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    /// Returns true if the operation was not invoked.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns the operation's failure, if it ran.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Attempt-counting state machine for one retryable operation.
#[derive(Debug, Clone)]
pub struct RetryController {
    strategy: BackoffStrategy,
    state: RetryState,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(BackoffStrategy::default())
    }
}

impl RetryController {
    /// Creates a controller whose budget is `strategy.max_attempts`.
    pub fn new(strategy: BackoffStrategy) -> Self {
        let max_attempts = strategy.max_attempts;
        Self {
            strategy,
            state: RetryState {
                attempt: 0,
                max_attempts,
                last_delay: Duration::ZERO,
            },
        }
    }

    /// Creates a controller with the default backoff and the given budget.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(BackoffStrategy::default().with_max_attempts(max_attempts))
    }

    /// Creates a controller whose budget follows a registry entry.
    ///
    /// Non-retryable entries get a budget of zero; otherwise the entry's
    /// `max_retries` override wins over the strategy's budget.
    pub fn for_entry(entry: &RegistryEntry, strategy: BackoffStrategy) -> Self {
        Self::with_policy(entry.retryable, entry.max_retries, strategy)
    }

    /// Same as [`RetryController::for_entry`], reading the policy from a record.
    pub fn for_record(record: &ErrorRecord, strategy: BackoffStrategy) -> Self {
        Self::with_policy(record.retryable, record.max_retries, strategy)
    }

    fn with_policy(retryable: bool, max_retries: Option<u32>, strategy: BackoffStrategy) -> Self {
        let max_attempts = if retryable {
            max_retries.unwrap_or(strategy.max_attempts)
        } else {
            0
        };
        Self::new(strategy.with_max_attempts(max_attempts))
    }

    /// Returns the current state.
    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Returns the backoff strategy.
    pub fn strategy(&self) -> &BackoffStrategy {
        &self.strategy
    }

    /// Returns the current phase.
    pub fn phase(&self) -> RetryPhase {
        if self.state.attempt < self.state.max_attempts {
            RetryPhase::Ready
        } else {
            RetryPhase::Exhausted
        }
    }

    /// Attempts made so far.
    pub fn attempt(&self) -> u32 {
        self.state.attempt
    }

    /// Attempts still allowed.
    pub fn remaining(&self) -> u32 {
        self.state.max_attempts.saturating_sub(self.state.attempt)
    }

    /// Returns true while the controller is ready for another attempt.
    pub fn can_retry(&self) -> bool {
        self.phase() == RetryPhase::Ready
    }

    /// Computes the delay to wait before the next attempt.
    ///
    /// Delays never decrease between resets.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .strategy
            .delay_for(self.state.attempt)
            .max(self.state.last_delay);
        self.state.last_delay = delay;
        delay
    }

    /// Runs `operation` once if the budget allows it.
    ///
    /// The attempt is counted before the operation is awaited, so an attempt
    /// that never completes still consumes budget. Success leaves the count
    /// untouched; call [`reset`](Self::reset) before reusing the controller.
    pub async fn retry<F, Fut, T, E>(&mut self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.can_retry() {
            return Err(RetryError::Exhausted {
                attempts: self.state.attempt,
            });
        }

        self.state.attempt += 1;
        let attempt = self.state.attempt;
        operation()
            .await
            .map_err(|error| RetryError::Failed { attempt, error })
    }

    /// Returns the controller to its initial ready state.
    pub fn reset(&mut self) {
        self.state.attempt = 0;
        self.state.last_delay = Duration::ZERO;
    }

    /// Runs `operation` until it succeeds or the budget is spent.
    ///
    /// Every failure is reported through `handler` with `code` as the explicit
    /// code. A record that is not retryable ends the loop immediately. Between
    /// attempts the loop sleeps for [`next_delay`](Self::next_delay). When the
    /// budget runs out the last record is returned
    /// [escalated](ErrorRecord::escalated) to a full-page state.
    pub async fn run<F, Fut, T, E>(
        &mut self,
        handler: &Handler,
        code: &str,
        mut operation: F,
    ) -> Result<T, ErrorRecord>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawFailure>,
    {
        loop {
            match self.retry(&mut operation).await {
                Ok(value) => return Ok(value),
                Err(RetryError::Exhausted { attempts }) => {
                    let failure = CodedFailure::new(
                        code,
                        format!("retry budget exhausted after {} attempts", attempts),
                    );
                    let record = handler.report(failure, Some(code), None);
                    return Err(record.escalated());
                }
                Err(RetryError::Failed { attempt, error }) => {
                    let context = Metadata::from([
                        ("attempt".to_string(), attempt.into()),
                        ("max_attempts".to_string(), self.state.max_attempts.into()),
                    ]);
                    let record = handler.report(error, Some(code), Some(context));

                    if !record.retryable {
                        return Err(record);
                    }
                    if !self.can_retry() {
                        tracing::warn!(
                            code = %record.code,
                            attempts = attempt,
                            "retry budget exhausted, escalating"
                        );
                        return Err(record.escalated());
                    }

                    let delay = self.next_delay();
                    tracing::debug!(
                        code = %record.code,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

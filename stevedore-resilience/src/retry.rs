//! Retry policy and executor
//!
//! The executor never logs. Callers report progress from inside their
//! retry predicate, which sees every failure before the executor decides
//! whether to wait and try again.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use stevedore_core::FailureClass;
use tokio_util::sync::CancellationToken;

use crate::backoff::{BackoffCalculator, BackoffStrategy};

/// Granularity of cancellation checks while a blocking retry waits
const BLOCKING_WAIT_SLICE: Duration = Duration::from_millis(50);

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts; `None` retries until success, a
    /// non-retryable error or cancellation
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Delay after the first failed attempt
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to retry delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_strategy: BackoffStrategy::Exponential { base: 2.0 },
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay with a bounded number of attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay: delay,
            max_delay: delay,
            backoff_strategy: BackoffStrategy::Fixed,
            jitter: false,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Calculate delay after a failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        BackoffCalculator::new(
            self.backoff_strategy.clone(),
            self.initial_delay,
            self.max_delay,
            self.jitter,
        )
        .calculate_delay(attempt)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Verdict of a retry predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait and try again
    Retry,
    /// Stop and surface the error with the given classification
    Fail(FailureClass),
}

/// Retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn with_default_policy() -> Self {
        Self::new(RetryPolicy::default())
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, `should_retry` says stop, attempts
    /// run out or `cancel` fires.
    ///
    /// `operation` receives the 1-indexed attempt number. Cancellation is
    /// observed before every attempt and during every backoff wait.
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        mut should_retry: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> RetryDecision,
    {
        let mut attempt = 1;
        let mut last_error = None;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                    last_error,
                });
            }

            let error = match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if let RetryDecision::Fail(class) = should_retry(&error) {
                return Err(RetryError::NonRetryable { error, class });
            }

            if self.policy.exhausted(attempt) {
                return Err(RetryError::MaxAttemptsExceeded {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.policy.delay_for_attempt(attempt);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled {
                        attempts: attempt,
                        last_error: Some(error),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }

            last_error = Some(error);
            attempt += 1;
        }
    }

    /// Blocking counterpart of [`execute`](Self::execute) for synchronous
    /// operations. Must not be called from an async context.
    pub fn execute_blocking<F, T, E, P>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        mut should_retry: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: FnMut(&E) -> RetryDecision,
    {
        let mut attempt = 1;
        let mut last_error = None;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                    last_error,
                });
            }

            let error = match operation(attempt) {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if let RetryDecision::Fail(class) = should_retry(&error) {
                return Err(RetryError::NonRetryable { error, class });
            }

            if self.policy.exhausted(attempt) {
                return Err(RetryError::MaxAttemptsExceeded {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let mut remaining = self.policy.delay_for_attempt(attempt);
            while !remaining.is_zero() {
                if cancel.is_cancelled() {
                    return Err(RetryError::Cancelled {
                        attempts: attempt,
                        last_error: Some(error),
                    });
                }
                let slice = remaining.min(BLOCKING_WAIT_SLICE);
                std::thread::sleep(slice);
                remaining -= slice;
            }

            last_error = Some(error);
            attempt += 1;
        }
    }
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The predicate refused to retry
    #[error("{error}")]
    NonRetryable { error: E, class: FailureClass },

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts ({attempts}) exceeded. Last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    /// Cancellation fired before or between attempts
    #[error("Retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, last_error: Option<E> },
}

impl<E> RetryError<E> {
    /// Get the underlying error if present
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::NonRetryable { error, .. } => Some(error),
            RetryError::MaxAttemptsExceeded { last_error, .. } => Some(last_error),
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Classification assigned by the predicate, if it made one
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            RetryError::NonRetryable { class, .. } => Some(*class),
            _ => None,
        }
    }
}

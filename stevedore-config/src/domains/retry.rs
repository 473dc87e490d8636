//! Retry behaviour for artifact downloads

use serde::{Deserialize, Serialize};
use std::time::Duration;
use stevedore_resilience::{BackoffStrategy, RetryPolicy};

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub initial_delay: Duration,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub max_delay: Duration,

    /// Growth factor applied after every failed attempt
    pub multiplier: f64,

    /// Unset retries until success, a non-retryable error or cancellation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default = "crate::domains::utils::default_false")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let backoff_strategy = if self.multiplier > 1.0 {
            BackoffStrategy::Exponential {
                base: self.multiplier,
            }
        } else {
            BackoffStrategy::Fixed
        };

        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_strategy,
            jitter: self.jitter,
        }
    }
}

impl Validatable for RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.initial_delay.as_secs(), "initial_delay", self.domain_name())?;

        if self.max_delay < self.initial_delay {
            return Err(self.validation_error(format!(
                "max_delay ({}s) cannot be shorter than initial_delay ({}s)",
                self.max_delay.as_secs(),
                self.initial_delay.as_secs()
            )));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(self.validation_error(format!(
                "multiplier must be at least 1.0, got {}",
                self.multiplier
            )));
        }

        if let Some(max_attempts) = self.max_attempts {
            validate_positive(max_attempts, "max_attempts", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "retry"
    }
}

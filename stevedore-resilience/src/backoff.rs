//! Backoff strategies for retry policies

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,

    /// Exponential increase: delay = initial_delay * base^(attempt-1)
    Exponential {
        /// Base for exponential calculation (e.g., 2.0 for doubling)
        base: f64,
    },
}

/// Backoff delay calculator
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    strategy: BackoffStrategy,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffCalculator {
    pub fn new(
        strategy: BackoffStrategy,
        initial_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> Self {
        Self {
            strategy,
            initial_delay,
            max_delay,
            jitter,
        }
    }

    /// Calculate delay after a failed attempt (1-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let capped_delay = self.calculate_base_delay(attempt).min(self.max_delay);

        if self.jitter {
            self.add_jitter(capped_delay)
        } else {
            capped_delay
        }
    }

    fn calculate_base_delay(&self, attempt: u32) -> Duration {
        match &self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,

            BackoffStrategy::Exponential { base } => {
                if attempt == 0 {
                    return Duration::ZERO;
                }
                // Large exponents overflow to infinity and are capped by the caller
                let multiplier = base.powi(attempt.min(i32::MAX as u32) as i32 - 1);
                let nanos = self.initial_delay.as_nanos() as f64 * multiplier;
                if !nanos.is_finite() || nanos >= u64::MAX as f64 {
                    Duration::MAX
                } else {
                    Duration::from_nanos(nanos as u64)
                }
            }
        }
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();

        // Add ±20% jitter
        let jitter_factor = rng.gen_range(0.8..1.2);
        Duration::from_nanos((delay.as_nanos() as f64 * jitter_factor) as u64)
    }
}

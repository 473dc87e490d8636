//! Resilience patterns for the agent
//!
//! Retry with caller-supplied predicates and capped backoff, used by
//! artifact retrieval and folder cleanup.

pub mod backoff;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryDecision, RetryError, RetryExecutor, RetryPolicy};

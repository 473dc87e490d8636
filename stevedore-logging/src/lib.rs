//! Logging for the Stevedore agent
//!
//! Operator diagnostics go through `tracing`; [`TracingSink`] routes a job's
//! output lines and issues into the same subscriber.

pub mod init;
pub mod sink;

pub use init::{init_logging_from_config, init_simple_tracing};
pub use sink::TracingSink;

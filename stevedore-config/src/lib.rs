//! Domain-driven configuration for the Stevedore agent
//!
//! Configuration is split by concern (agent identity and folders, retry
//! behaviour, logging, handler interpreters), loaded from YAML and then
//! overridden by `STEVEDORE_*` environment variables.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::{
    agent::AgentSettings,
    handlers::HandlersConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    retry::RetryConfig,
    AgentConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

pub use domains::utils::serde_duration;

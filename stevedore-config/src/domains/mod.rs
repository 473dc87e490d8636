//! Domain-specific configuration modules

pub mod agent;
pub mod handlers;
pub mod logging;
pub mod retry;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: agent::AgentSettings,

    /// Backoff for artifact downloads and working-folder preparation
    pub retry: retry::RetryConfig,

    pub logging: logging::LoggingConfig,

    pub handlers: handlers::HandlersConfig,
}

impl AgentConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.agent.validate()?;
        self.retry.validate()?;
        self.logging.validate()?;
        self.handlers.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        serde_yaml::to_string(&AgentConfig::default())
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

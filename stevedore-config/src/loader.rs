//! Configuration loading and environment variable handling

use crate::domains::AgentConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `STEVEDORE` prefix
    pub fn new() -> Self {
        Self {
            prefix: "STEVEDORE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<AgentConfig> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let mut config: AgentConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<AgentConfig> {
        let mut config = AgentConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load from a file when one is given, else from the environment
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<AgentConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut AgentConfig) -> ConfigResult<()> {
        self.apply_agent_overrides(&mut config.agent);
        self.apply_retry_overrides(&mut config.retry)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_handler_overrides(&mut config.handlers);
        Ok(())
    }

    fn apply_agent_overrides(&self, config: &mut crate::domains::agent::AgentSettings) {
        if let Ok(name) = self.get_env_var("AGENT_NAME") {
            config.name = name;
        }

        if let Ok(work) = self.get_env_var("WORK_DIRECTORY") {
            config.work_directory = PathBuf::from(work);
        }

        if let Ok(tasks) = self.get_env_var("TASKS_DIRECTORY") {
            config.tasks_directory = PathBuf::from(tasks);
        }
    }

    fn apply_retry_overrides(
        &self,
        config: &mut crate::domains::retry::RetryConfig,
    ) -> ConfigResult<()> {
        if let Ok(attempts) = self.get_env_var("RETRY_MAX_ATTEMPTS") {
            let attempts: u32 = attempts.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid RETRY_MAX_ATTEMPTS: {}", e))
            })?;
            config.max_attempts = Some(attempts);
        }

        if let Ok(delay) = self.get_env_var("RETRY_INITIAL_DELAY_SECONDS") {
            let seconds: u64 = delay.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid RETRY_INITIAL_DELAY_SECONDS: {}", e))
            })?;
            config.initial_delay = Duration::from_secs(seconds);
        }

        if let Ok(delay) = self.get_env_var("RETRY_MAX_DELAY_SECONDS") {
            let seconds: u64 = delay.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid RETRY_MAX_DELAY_SECONDS: {}", e))
            })?;
            config.max_delay = Duration::from_secs(seconds);
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn apply_handler_overrides(&self, config: &mut crate::domains::handlers::HandlersConfig) {
        if let Ok(node) = self.get_env_var("NODE_PATH") {
            config.node = PathBuf::from(node);
        }

        if let Ok(powershell) = self.get_env_var("POWERSHELL_PATH") {
            config.powershell = PathBuf::from(powershell);
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

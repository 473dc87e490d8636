use anyhow::Result;
use stevedore_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    match config.format {
        LogFormat::Text => init_simple_tracing(config.level.as_str()),
        LogFormat::Json => init_json_tracing(config.level.as_str()),
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize plain console tracing
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    // try_init: a second initialization is not an error
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

fn init_json_tracing(log_level: &str) -> Result<()> {
    if tracing_subscriber::fmt()
        .json()
        .with_current_span(false)
        .with_env_filter(env_filter(log_level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

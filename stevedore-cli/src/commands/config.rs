//! `stevedore config` subcommands

use anyhow::{Context, Result};
use std::path::Path;
use stevedore_config::{AgentConfig, ConfigLoader};
use tracing::{error, info};

pub fn handle_config_sample() -> Result<()> {
    print!("{}", AgentConfig::generate_sample());
    Ok(())
}

pub fn handle_config_validate(config_file: Option<&Path>) -> Result<()> {
    let config_file =
        config_file.ok_or_else(|| anyhow::anyhow!("Pass the file to validate with --config"))?;
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(_config) => {
            println!("Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("Configuration validation failed: {}", e);
            error!("Configuration validation failed: {}", e);
            Err(e).context(format!("Invalid configuration in {:?}", config_file))
        }
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stevedore_config::{AgentConfig, ConfigLoader};
use tracing::{debug, info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

fn load_config(config_path: Option<&PathBuf>) -> Result<AgentConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config { config_cmd }) = &cli.command {
        stevedore_logging::init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
        return match config_cmd {
            ConfigCommands::Sample => commands::config::handle_config_sample(),
            ConfigCommands::Validate => {
                commands::config::handle_config_validate(cli.config.as_deref())
            }
        };
    }

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("Invalid --log-level")?;
    }
    stevedore_logging::init_logging_from_config(&config.logging)?;
    debug!("Agent {} version {}", config.agent.name, config.agent.version);

    match cli.command {
        Some(Commands::RunJob { job }) => commands::run_job::handle_run_job(&config, &job).await,
        Some(Commands::Config { .. }) => Ok(()),
        None => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

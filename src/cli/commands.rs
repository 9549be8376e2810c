//! CLI definitions and command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{ConfigLoader, paths};

/// Fault aggregation and suppression engine for NPU clusters
#[derive(Parser, Debug)]
#[command(name = "faultcenter")]
#[command(about = "Aggregates NPU, node and switch faults into per-job fault ranks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options for the default `run` command
    #[command(flatten)]
    pub run: RunArgs,
}

/// Main commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the fault center daemon (default)
    Run(RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Show version information
    Version,
}

/// Daemon options
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Namespace of the fault configmaps (overrides config)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Write logs to this file (overrides config)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "namespace", "center.processPeriodMs")
        key: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "namespace", "suppression.l2Enabled")
        key: String,
        /// Configuration value
        value: String,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;

            if let Some(key) = key {
                let value = crate::config::get_config_value(&config, &key)?;
                println!("{}", value);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Set { key, value } => {
            // Only the file layer is persisted, env overrides stay out of it
            let root_path = paths::root_config_path();
            let mut config = if root_path.exists() {
                ConfigLoader::load_file(&root_path)?
            } else {
                crate::config::Config::default()
            };

            crate::config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;
            ConfigLoader::check(&config)
                .with_context(|| format!("Refusing to save {} = {}", key, value))?;

            ConfigLoader::save_root(&config).context("Failed to save configuration")?;
            println!("Configuration saved");
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            for key in crate::config::CONFIG_KEYS {
                println!("{} = {}", key, crate::config::get_config_value(&config, key)?);
            }
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Validate => {
            ConfigLoader::validate().context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}

//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules.

use std::path::Path;

use anyhow::{Context, Result};

use super::{paths, schema::Config};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Root config file
    /// 3. Built-in defaults
    pub fn load() -> Result<Config> {
        let root_path = paths::root_config_path();
        let config = if root_path.exists() {
            Self::load_file(&root_path)?
        } else {
            Config::default()
        };
        Ok(Self::apply_env_overrides(config, |key| std::env::var(key).ok()))
    }

    /// Load configuration from a file
    ///
    /// Keys missing from the file keep their defaults.
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the root config file and the merged result
    pub fn validate() -> Result<()> {
        let root_path = paths::root_config_path();
        if root_path.exists() {
            let config = Self::load_file(&root_path)?;
            Self::check(&config)
                .with_context(|| format!("Invalid config file: {}", root_path.display()))?;
        }

        let merged = Self::load().context("Failed to load merged configuration")?;
        Self::check(&merged)
    }

    /// Reject values the engine cannot run with
    pub fn check(config: &Config) -> Result<()> {
        if config.namespace.is_empty() {
            return Err(anyhow::anyhow!("namespace must not be empty"));
        }
        if config.center.process_period_ms == 0 {
            return Err(anyhow::anyhow!("center.processPeriodMs must be greater than 0"));
        }
        if config.center.notify_queue_depth == 0 {
            return Err(anyhow::anyhow!("center.notifyQueueDepth must be at least 1"));
        }
        if config.center.max_subscribers == 0 {
            return Err(anyhow::anyhow!("center.maxSubscribers must be at least 1"));
        }
        if config.center.max_support_node_num == 0 {
            return Err(anyhow::anyhow!("center.maxSupportNodeNum must be at least 1"));
        }
        tracing_subscriber::EnvFilter::try_new(&config.logger.level)
            .with_context(|| format!("logger.level '{}' is not a valid filter", config.logger.level))?;
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// `lookup` resolves a variable name; unparsable numeric values are ignored.
    pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup("FAULTCENTER_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Some(period) = lookup("FAULTCENTER_PROCESS_PERIOD_MS") {
            match period.parse() {
                Ok(val) => config.center.process_period_ms = val,
                Err(_) => tracing::warn!("Ignoring FAULTCENTER_PROCESS_PERIOD_MS={}", period),
            }
        }

        if let Some(timeout) = lookup("FAULTCENTER_SELF_RECOVER_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(val) => config.suppression.self_recover_timeout_secs = val,
                Err(_) => tracing::warn!("Ignoring FAULTCENTER_SELF_RECOVER_TIMEOUT_SECS={}", timeout),
            }
        }

        if let Some(level) = lookup("FAULTCENTER_LOG_LEVEL") {
            config.logger.level = level;
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

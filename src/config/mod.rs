//! Configuration system for faultcenter
//!
//! Layers built-in defaults, a YAML file and environment overrides into the
//! settings the daemon starts the engine with.

pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{CenterConfig, Config, LoggerConfig, SuppressionConfig};

/// Every key accepted by `get_config_value` and `set_config_value`
pub const CONFIG_KEYS: &[&str] = &[
    "namespace",
    "center.processPeriodMs",
    "center.notifyQueueDepth",
    "center.maxSubscribers",
    "center.maxSupportNodeNum",
    "center.minProcessIntervalMs",
    "suppression.selfRecoverTimeoutSecs",
    "suppression.customEnabled",
    "suppression.l2Enabled",
    "logger.level",
    "logger.file",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &schema::Config, key: &str) -> anyhow::Result<String> {
    match key {
        "namespace" => Ok(config.namespace.clone()),
        "center.processPeriodMs" => Ok(config.center.process_period_ms.to_string()),
        "center.notifyQueueDepth" => Ok(config.center.notify_queue_depth.to_string()),
        "center.maxSubscribers" => Ok(config.center.max_subscribers.to_string()),
        "center.maxSupportNodeNum" => Ok(config.center.max_support_node_num.to_string()),
        "center.minProcessIntervalMs" => Ok(config.center.min_process_interval_ms.to_string()),
        "suppression.selfRecoverTimeoutSecs" => {
            Ok(config.suppression.self_recover_timeout_secs.to_string())
        }
        "suppression.customEnabled" => Ok(config.suppression.custom_enabled.to_string()),
        "suppression.l2Enabled" => Ok(config.suppression.l2_enabled.to_string()),
        "logger.level" => Ok(config.logger.level.clone()),
        "logger.file" => Ok(config
            .logger
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut schema::Config, key: &str, value: &str) -> anyhow::Result<()> {
    use anyhow::Context;
    match key {
        "namespace" => {
            config.namespace = value.to_string();
        }
        "center.processPeriodMs" => {
            config.center.process_period_ms = value
                .parse()
                .context("center.processPeriodMs must be a number")?;
        }
        "center.notifyQueueDepth" => {
            config.center.notify_queue_depth = value
                .parse()
                .context("center.notifyQueueDepth must be a number")?;
        }
        "center.maxSubscribers" => {
            config.center.max_subscribers = value
                .parse()
                .context("center.maxSubscribers must be a number")?;
        }
        "center.maxSupportNodeNum" => {
            config.center.max_support_node_num = value
                .parse()
                .context("center.maxSupportNodeNum must be a number")?;
        }
        "center.minProcessIntervalMs" => {
            config.center.min_process_interval_ms = value
                .parse()
                .context("center.minProcessIntervalMs must be a number")?;
        }
        "suppression.selfRecoverTimeoutSecs" => {
            config.suppression.self_recover_timeout_secs = value
                .parse()
                .context("suppression.selfRecoverTimeoutSecs must be a number")?;
        }
        "suppression.customEnabled" => {
            config.suppression.custom_enabled = value
                .parse()
                .context("suppression.customEnabled must be 'true' or 'false'")?;
        }
        "suppression.l2Enabled" => {
            config.suppression.l2_enabled = value
                .parse()
                .context("suppression.l2Enabled must be 'true' or 'false'")?;
        }
        "logger.level" => {
            config.logger.level = value.to_string();
        }
        "logger.file" => {
            if value.is_empty() {
                config.logger.file = None;
            } else {
                config.logger.file = Some(value.into());
            }
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}

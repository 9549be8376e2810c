//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::center::EngineSettings;
use crate::constants::{
    DEFAULT_NOTIFY_QUEUE_DEPTH, DEFAULT_PROCESS_PERIOD_MS, DEFAULT_SELF_RECOVER_TIMEOUT_SECS,
    MAX_FAULT_CENTER_SUBSCRIBER, MAX_SUPPORT_NODE_NUM,
};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Namespace holding the per-node fault configmaps
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Process center tuning
    #[serde(default)]
    pub center: CenterConfig,

    /// Fault suppression settings
    #[serde(default)]
    pub suppression: SuppressionConfig,

    /// Logger configuration
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Process center configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CenterConfig {
    /// Periodic processing tick
    #[serde(default = "default_process_period_ms")]
    pub process_period_ms: u64,

    /// Pending triggers before notifiers wait
    #[serde(default = "default_notify_queue_depth")]
    pub notify_queue_depth: usize,

    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,

    /// Nodes each canonical store accepts
    #[serde(default = "default_max_support_node_num")]
    pub max_support_node_num: usize,

    /// Minimum spacing of two passes of one center, 0 disables the limit
    #[serde(default)]
    pub min_process_interval_ms: u64,
}

/// Suppression configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuppressionConfig {
    /// Window in which a restart request may still heal on its own
    #[serde(default = "default_self_recover_timeout_secs")]
    pub self_recover_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub custom_enabled: bool,

    #[serde(default = "default_true")]
    pub l2_enabled: bool,
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to this file instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_namespace() -> String {
    "kube-system".to_string()
}

fn default_true() -> bool {
    true
}

fn default_process_period_ms() -> u64 {
    DEFAULT_PROCESS_PERIOD_MS
}

fn default_notify_queue_depth() -> usize {
    DEFAULT_NOTIFY_QUEUE_DEPTH
}

fn default_max_subscribers() -> usize {
    MAX_FAULT_CENTER_SUBSCRIBER
}

fn default_max_support_node_num() -> usize {
    MAX_SUPPORT_NODE_NUM
}

fn default_self_recover_timeout_secs() -> u64 {
    DEFAULT_SELF_RECOVER_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            center: CenterConfig::default(),
            suppression: SuppressionConfig::default(),
            logger: LoggerConfig::default(),
        }
    }
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            process_period_ms: default_process_period_ms(),
            notify_queue_depth: default_notify_queue_depth(),
            max_subscribers: default_max_subscribers(),
            max_support_node_num: default_max_support_node_num(),
            min_process_interval_ms: 0,
        }
    }
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            self_recover_timeout_secs: default_self_recover_timeout_secs(),
            custom_enabled: default_true(),
            l2_enabled: default_true(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Engine settings derived from this configuration
    pub fn to_engine_settings(&self) -> EngineSettings {
        EngineSettings {
            process_period: Duration::from_millis(self.center.process_period_ms),
            notify_queue_depth: self.center.notify_queue_depth,
            max_subscribers: self.center.max_subscribers,
            max_support_node_num: self.center.max_support_node_num,
            min_process_interval: Duration::from_millis(self.center.min_process_interval_ms),
            self_recover_timeout: Duration::from_secs(self.suppression.self_recover_timeout_secs),
            custom_filter_enabled: self.suppression.custom_enabled,
            l2_filter_enabled: self.suppression.l2_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.namespace, "kube-system");
        assert_eq!(config.center.process_period_ms, 1000);
        assert_eq!(config.center.notify_queue_depth, 1);
        assert_eq!(config.suppression.self_recover_timeout_secs, 60);
        assert!(config.suppression.l2_enabled);
    }

    #[test]
    fn test_config_serialization() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("processPeriodMs"));
        assert!(yaml.contains("selfRecoverTimeoutSecs"));
        assert!(!yaml.contains("file"));
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
namespace: mindx-dl
center:
  processPeriodMs: 500
suppression:
  customEnabled: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.namespace, "mindx-dl");
        assert_eq!(config.center.process_period_ms, 500);
        assert_eq!(config.center.max_subscribers, 10);
        assert!(!config.suppression.custom_enabled);
        assert!(config.suppression.l2_enabled);
    }

    #[test]
    fn test_engine_settings_conversion() {
        let mut config = Config::default();
        config.center.min_process_interval_ms = 250;
        let settings = config.to_engine_settings();
        assert_eq!(settings.process_period, Duration::from_secs(1));
        assert_eq!(settings.min_process_interval, Duration::from_millis(250));
        assert_eq!(settings.self_recover_timeout, Duration::from_secs(60));
    }
}

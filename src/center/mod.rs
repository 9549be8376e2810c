//! Fault category centers and the process orchestrator
//!
//! Each category center owns its ingestion callbacks and the processed view
//! of its canonical map. `FaultProcessCenter` drives all three from one
//! worker so processing passes never overlap.

mod base;
mod process_center;

pub use base::*;
pub use process_center::*;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::constants::{
    DEFAULT_NOTIFY_QUEUE_DEPTH, DEFAULT_PROCESS_PERIOD_MS, DEFAULT_SELF_RECOVER_TIMEOUT_SECS,
    MAX_FAULT_CENTER_SUBSCRIBER, MAX_SUPPORT_NODE_NUM,
};
use crate::models::{DeviceInfo, NodeInfo, SwitchInfo};

/// Fault category tag used by triggers and subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    Device,
    Node,
    Switch,
    All,
}

impl FaultCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCategory::Device => "device",
            FaultCategory::Node => "node",
            FaultCategory::Switch => "switch",
            FaultCategory::All => "all",
        }
    }

    /// Whether a center of category `other` serves this tag
    pub fn covers(&self, other: FaultCategory) -> bool {
        *self == FaultCategory::All || *self == other
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category-tagged record maps flowing through a processor chain
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryContent {
    Device(HashMap<String, DeviceInfo>),
    Node(HashMap<String, NodeInfo>),
    Switch(HashMap<String, SwitchInfo>),
}

impl CategoryContent {
    pub fn category(&self) -> FaultCategory {
        match self {
            CategoryContent::Device(_) => FaultCategory::Device,
            CategoryContent::Node(_) => FaultCategory::Node,
            CategoryContent::Switch(_) => FaultCategory::Switch,
        }
    }
}

/// One stage of a center's processing chain
///
/// Processors own their side caches and must hand back content of the same
/// category they received.
pub trait ContentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, content: CategoryContent) -> CategoryContent;
}

/// Runtime knobs of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub process_period: Duration,
    pub notify_queue_depth: usize,
    pub max_subscribers: usize,
    pub max_support_node_num: usize,
    pub min_process_interval: Duration,
    pub self_recover_timeout: Duration,
    pub custom_filter_enabled: bool,
    pub l2_filter_enabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            process_period: Duration::from_millis(DEFAULT_PROCESS_PERIOD_MS),
            notify_queue_depth: DEFAULT_NOTIFY_QUEUE_DEPTH,
            max_subscribers: MAX_FAULT_CENTER_SUBSCRIBER,
            max_support_node_num: MAX_SUPPORT_NODE_NUM,
            min_process_interval: Duration::ZERO,
            self_recover_timeout: Duration::from_secs(DEFAULT_SELF_RECOVER_TIMEOUT_SECS),
            custom_filter_enabled: true,
            l2_filter_enabled: true,
        }
    }
}

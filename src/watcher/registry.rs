//! Fault configmap registry
//!
//! Maps configmap name prefixes to fault categories and their payload keys.
//! To ingest a new category, add an entry here and a decoder in `codec.rs`.

use crate::center::FaultCategory;
use crate::constants::{
    DEVICE_INFO_CFG_KEY, DEVICE_INFO_PREFIX, NODE_INFO_KEY, NODE_INFO_PREFIX, SWITCH_INFO_CFG_KEY,
    SWITCH_INFO_PREFIX,
};

/// Registry entry for one fault configmap family
#[derive(Debug)]
pub struct CategoryEntry {
    pub category: FaultCategory,
    pub prefix: &'static str,
    pub data_key: &'static str,
}

/// Registry of all ingested configmap families
pub const CATEGORY_REGISTRY: &[CategoryEntry] = &[
    CategoryEntry {
        category: FaultCategory::Device,
        prefix: DEVICE_INFO_PREFIX,
        data_key: DEVICE_INFO_CFG_KEY,
    },
    CategoryEntry {
        category: FaultCategory::Node,
        prefix: NODE_INFO_PREFIX,
        data_key: NODE_INFO_KEY,
    },
    CategoryEntry {
        category: FaultCategory::Switch,
        prefix: SWITCH_INFO_PREFIX,
        data_key: SWITCH_INFO_CFG_KEY,
    },
];

/// Registry entry for a configmap name, if it is a fault configmap
pub fn classify_configmap(name: &str) -> Option<&'static CategoryEntry> {
    CATEGORY_REGISTRY
        .iter()
        .find(|entry| name.len() > entry.prefix.len() && name.starts_with(entry.prefix))
}

pub fn is_fault_configmap(name: &str) -> bool {
    classify_configmap(name).is_some()
}

//! Canonical per-node fault records
//!
//! One record per node per category. Records are replaced wholesale on every
//! informer event; the business comparisons here decide whether a
//! replacement actually changed anything worth processing.

use std::collections::BTreeMap;

use super::fault::{FaultLevel, HealthState};
use crate::constants::{DEVICE_INFO_PREFIX, NODE_INFO_PREFIX, SWITCH_INFO_PREFIX};

/// First-seen bookkeeping for one fault code
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct FaultTimeAndLevel {
    #[serde(default)]
    pub fault_time: i64,
    /// Time the control plane first received the fault, in epoch millis
    #[serde(default)]
    pub fault_received_time: i64,
    #[serde(default)]
    pub fault_level: FaultLevel,
}

impl FaultTimeAndLevel {
    /// Start of the self-recovery window
    ///
    /// Agents that predate the received timestamp only fill `fault_time`.
    pub fn first_seen_ms(&self) -> i64 {
        if self.fault_received_time > 0 {
            self.fault_received_time
        } else {
            self.fault_time
        }
    }
}

/// One fault reported against one NPU
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct DeviceFault {
    #[serde(default)]
    pub fault_type: String,
    #[serde(default)]
    pub npu_name: String,
    #[serde(default)]
    pub large_model_fault_level: String,
    #[serde(default)]
    pub fault_level: FaultLevel,
    #[serde(default)]
    pub fault_handling: String,
    #[serde(default)]
    pub fault_code: String,
    #[serde(default)]
    pub fault_time_and_level_map: BTreeMap<String, FaultTimeAndLevel>,
}

impl DeviceFault {
    /// Time and level entry for this fault's own code
    pub fn time_and_level(&self) -> Option<&FaultTimeAndLevel> {
        self.fault_time_and_level_map.get(&self.fault_code)
    }
}

/// Device fault record of one node (`mindx-dl-deviceinfo-<node>`)
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceInfo {
    pub cm_name: String,
    /// Device family, e.g. `Ascend910`
    pub device_type: String,
    #[serde(rename = "SuperPodID")]
    pub super_pod_id: i32,
    pub server_index: i32,
    pub update_time: i64,
    /// Device name (`<type>-<id>`) to the faults it currently reports
    pub fault_device_list: BTreeMap<String, Vec<DeviceFault>>,
    pub available_devices: Vec<String>,
    pub card_unhealthy: Vec<String>,
    pub network_unhealthy: Vec<String>,
    pub recovering: Vec<String>,
}

impl DeviceInfo {
    /// Empty record with the same identity, used as the base of a suppression copy
    pub fn empty_like(&self) -> Self {
        Self {
            cm_name: self.cm_name.clone(),
            device_type: self.device_type.clone(),
            super_pod_id: self.super_pod_id,
            server_index: self.server_index,
            update_time: self.update_time,
            ..Default::default()
        }
    }

    /// Compare everything except the update timestamp
    pub fn business_eq(&self, other: &Self) -> bool {
        self.device_type == other.device_type
            && self.cm_name == other.cm_name
            && self.super_pod_id == other.super_pod_id
            && self.server_index == other.server_index
            && self.available_devices == other.available_devices
            && self.recovering == other.recovering
            && self.card_unhealthy == other.card_unhealthy
            && self.network_unhealthy == other.network_unhealthy
            && self.fault_device_list == other.fault_device_list
    }

    /// Node name derived from the configmap name
    pub fn node_name(&self) -> &str {
        node_name_from_cm(&self.cm_name, DEVICE_INFO_PREFIX)
    }

    /// Total number of faults across all devices
    pub fn fault_count(&self) -> usize {
        self.fault_device_list.values().map(Vec::len).sum()
    }

    /// Remove one occurrence of a fault and keep the device lists consistent
    ///
    /// A device left without faults disappears from the fault map and from
    /// the unhealthy lists.
    pub fn remove_fault(&mut self, fault: &DeviceFault) {
        let Some(faults) = self.fault_device_list.get_mut(&fault.npu_name) else {
            return;
        };
        if let Some(pos) = faults.iter().position(|f| f == fault) {
            faults.remove(pos);
        }
        if faults.is_empty() {
            self.fault_device_list.remove(&fault.npu_name);
            self.card_unhealthy.retain(|d| d != &fault.npu_name);
            self.network_unhealthy.retain(|d| d != &fault.npu_name);
        }
    }

    /// Add one fault, creating the device entry when missing
    pub fn add_fault(&mut self, fault: DeviceFault) {
        self.fault_device_list
            .entry(fault.npu_name.clone())
            .or_default()
            .push(fault);
    }
}

/// One node-level faulty component
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaultDev {
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub device_id: i64,
    #[serde(default)]
    pub fault_code: Vec<String>,
    #[serde(default)]
    pub fault_level: FaultLevel,
}

/// Node fault record of one node (`mindx-dl-nodeinfo-<node>`)
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeInfo {
    pub cm_name: String,
    pub node_status: HealthState,
    pub fault_dev_list: Vec<FaultDev>,
    pub update_time: i64,
}

impl NodeInfo {
    pub fn business_eq(&self, other: &Self) -> bool {
        self.node_status == other.node_status
            && self.fault_dev_list.len() == other.fault_dev_list.len()
    }

    pub fn node_name(&self) -> &str {
        node_name_from_cm(&self.cm_name, NODE_INFO_PREFIX)
    }
}

/// One fault raised by a switch chip port
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimpleSwitchFaultInfo {
    #[serde(default)]
    pub assembled_fault_code: String,
    #[serde(default)]
    pub switch_chip_id: u32,
    #[serde(default)]
    pub switch_port_id: u32,
    #[serde(default)]
    pub peer_port_device: u32,
    #[serde(default)]
    pub peer_port_id: u32,
    #[serde(default)]
    pub severity: u32,
    #[serde(default)]
    pub assertion: u32,
    #[serde(default)]
    pub alarm_raised_time: i64,
}

impl SimpleSwitchFaultInfo {
    /// Key of this fault in the switch time/level map: `code_chip_port`
    pub fn time_level_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.assembled_fault_code, self.switch_chip_id, self.switch_port_id
        )
    }
}

/// Switch fault record of one node (`mindx-dl-switchinfo-<node>`)
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwitchInfo {
    #[serde(default)]
    pub cm_name: String,
    #[serde(default)]
    pub fault_code: Vec<String>,
    #[serde(default)]
    pub fault_info: Vec<SimpleSwitchFaultInfo>,
    #[serde(default)]
    pub fault_level: FaultLevel,
    #[serde(default)]
    pub update_time: i64,
    #[serde(default)]
    pub node_status: HealthState,
    #[serde(default)]
    pub fault_time_and_level_map: BTreeMap<String, FaultTimeAndLevel>,
}

impl SwitchInfo {
    pub fn business_eq(&self, other: &Self) -> bool {
        self.fault_level == other.fault_level
            && self.node_status == other.node_status
            && self.fault_code.len() == other.fault_code.len()
    }

    pub fn node_name(&self) -> &str {
        node_name_from_cm(&self.cm_name, SWITCH_INFO_PREFIX)
    }
}

/// Strip a category prefix from a configmap name
pub fn node_name_from_cm<'a>(cm_name: &'a str, prefix: &str) -> &'a str {
    cm_name.strip_prefix(prefix).unwrap_or(cm_name)
}

/// Build the configmap name of a node for a category prefix
pub fn cm_name_for_node(prefix: &str, node_name: &str) -> String {
    format!("{}{}", prefix, node_name)
}

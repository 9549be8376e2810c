//! Configmap payload decoding
//!
//! Turns the data section of a fault configmap into the record the matching
//! center ingests. Each category stores one JSON document under a fixed key.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;

use super::registry::classify_configmap;
use crate::center::FaultCategory;
use crate::constants::{
    DEVICE_INFO_CFG_KEY, NODE_INFO_KEY, RESOURCE_NAME_PREFIX, SWITCH_INFO_CFG_KEY,
};
use crate::error::{FaultError, FaultResult};
use crate::models::{DeviceFault, DeviceInfo, FaultDev, HealthState, NodeInfo, SwitchInfo};

const FAULT_LIST_SUFFIX: &str = "-Fault";
const CARD_UNHEALTHY_SUFFIX: &str = "-Unhealthy";
const NETWORK_UNHEALTHY_SUFFIX: &str = "-NetworkUnhealthy";
const RECOVERING_SUFFIX: &str = "-Recovering";
const FALLBACK_DEVICE_TYPE: &str = "Ascend910";

/// A decoded fault configmap
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    Device(DeviceInfo),
    Node(NodeInfo),
    Switch(SwitchInfo),
}

impl DecodedRecord {
    pub fn category(&self) -> FaultCategory {
        match self {
            DecodedRecord::Device(_) => FaultCategory::Device,
            DecodedRecord::Node(_) => FaultCategory::Node,
            DecodedRecord::Switch(_) => FaultCategory::Switch,
        }
    }

    pub fn cm_name(&self) -> &str {
        match self {
            DecodedRecord::Device(info) => &info.cm_name,
            DecodedRecord::Node(info) => &info.cm_name,
            DecodedRecord::Switch(info) => &info.cm_name,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeviceInfoCfg {
    #[serde(default)]
    device_info: DeviceListPayload,
    #[serde(default, rename = "SuperPodID")]
    super_pod_id: i32,
    #[serde(default)]
    server_index: i32,
}

#[derive(Default, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeviceListPayload {
    #[serde(default)]
    device_list: BTreeMap<String, String>,
    #[serde(default)]
    update_time: i64,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeInfoCfg {
    #[serde(default)]
    node_info: NodeInfoPayload,
}

#[derive(Default, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeInfoPayload {
    #[serde(default)]
    fault_dev_list: Vec<FaultDev>,
    #[serde(default)]
    node_status: HealthState,
    #[serde(default)]
    update_time: i64,
}

/// Decode any fault configmap, picking the category from its name
pub fn decode_configmap(cm: &ConfigMap) -> FaultResult<DecodedRecord> {
    let name = cm.name_any();
    let entry = classify_configmap(&name).ok_or_else(|| FaultError::UnknownCategory(name.clone()))?;
    let empty = BTreeMap::new();
    let data = cm.data.as_ref().unwrap_or(&empty);
    match entry.category {
        FaultCategory::Device => decode_device_info(&name, data).map(DecodedRecord::Device),
        FaultCategory::Node => decode_node_info(&name, data).map(DecodedRecord::Node),
        _ => decode_switch_info(&name, data).map(DecodedRecord::Switch),
    }
}

/// Record carrying only the configmap name, enough to delete it from a store
pub fn tombstone(cm_name: &str) -> FaultResult<DecodedRecord> {
    let entry =
        classify_configmap(cm_name).ok_or_else(|| FaultError::UnknownCategory(cm_name.to_string()))?;
    let cm_name = cm_name.to_string();
    Ok(match entry.category {
        FaultCategory::Device => DecodedRecord::Device(DeviceInfo {
            cm_name,
            ..Default::default()
        }),
        FaultCategory::Node => DecodedRecord::Node(NodeInfo {
            cm_name,
            ..Default::default()
        }),
        _ => DecodedRecord::Switch(SwitchInfo {
            cm_name,
            ..Default::default()
        }),
    })
}

fn payload<'a>(
    name: &str,
    data: &'a BTreeMap<String, String>,
    key: &'static str,
) -> FaultResult<&'a str> {
    data.get(key)
        .map(String::as_str)
        .ok_or_else(|| FaultError::MissingDataKey {
            name: name.to_string(),
            key,
        })
}

fn decode_error(name: &str) -> impl FnOnce(serde_json::Error) -> FaultError + '_ {
    move |source| FaultError::Decode {
        name: name.to_string(),
        source,
    }
}

/// Decode the `DeviceInfoCfg` payload
///
/// The device list is a flat string map keyed `huawei.com/<type>[suffix]`.
/// The fault list under the `-Fault` key is itself a JSON array.
pub fn decode_device_info(name: &str, data: &BTreeMap<String, String>) -> FaultResult<DeviceInfo> {
    let cfg: DeviceInfoCfg =
        serde_json::from_str(payload(name, data, DEVICE_INFO_CFG_KEY)?).map_err(decode_error(name))?;
    let list = &cfg.device_info.device_list;
    let device_type = device_type_of(name, list);
    let key = |suffix: &str| format!("{}{}{}", RESOURCE_NAME_PREFIX, device_type, suffix);

    let mut info = DeviceInfo {
        cm_name: name.to_string(),
        device_type: device_type.clone(),
        super_pod_id: cfg.super_pod_id,
        server_index: cfg.server_index,
        update_time: cfg.device_info.update_time,
        available_devices: split_list(list.get(&key(""))),
        card_unhealthy: split_list(list.get(&key(CARD_UNHEALTHY_SUFFIX))),
        network_unhealthy: split_list(list.get(&key(NETWORK_UNHEALTHY_SUFFIX))),
        recovering: split_list(list.get(&key(RECOVERING_SUFFIX))),
        ..Default::default()
    };

    match list.get(&key(FAULT_LIST_SUFFIX)) {
        Some(raw) if !raw.trim().is_empty() => {
            let faults: Vec<DeviceFault> = serde_json::from_str(raw).map_err(decode_error(name))?;
            for fault in faults {
                for split in split_device_fault(fault) {
                    info.add_fault(split);
                }
            }
        }
        _ => tracing::debug!("Configmap {} carries no device fault list", name),
    }
    Ok(info)
}

/// Decode the `NodeInfo` payload
pub fn decode_node_info(name: &str, data: &BTreeMap<String, String>) -> FaultResult<NodeInfo> {
    let cfg: NodeInfoCfg =
        serde_json::from_str(payload(name, data, NODE_INFO_KEY)?).map_err(decode_error(name))?;
    Ok(NodeInfo {
        cm_name: name.to_string(),
        node_status: cfg.node_info.node_status,
        fault_dev_list: cfg.node_info.fault_dev_list,
        update_time: cfg.node_info.update_time,
    })
}

/// Decode the `SwitchInfoCfg` payload
pub fn decode_switch_info(name: &str, data: &BTreeMap<String, String>) -> FaultResult<SwitchInfo> {
    let mut info: SwitchInfo = serde_json::from_str(payload(name, data, SWITCH_INFO_CFG_KEY)?)
        .map_err(decode_error(name))?;
    info.cm_name = name.to_string();
    Ok(info)
}

/// Device family named by the device list keys
fn device_type_of(name: &str, list: &BTreeMap<String, String>) -> String {
    let types = list.keys().filter_map(|k| k.strip_prefix(RESOURCE_NAME_PREFIX));
    let mut plain = None;
    for suffixed in types {
        if let Some(device_type) = suffixed.strip_suffix(FAULT_LIST_SUFFIX) {
            return device_type.to_string();
        }
        if plain.is_none() && !suffixed.contains('-') {
            plain = Some(suffixed.to_string());
        }
    }
    plain.unwrap_or_else(|| {
        tracing::warn!(
            "Cannot decide device type of {}, assuming {}",
            name,
            FALLBACK_DEVICE_TYPE
        );
        FALLBACK_DEVICE_TYPE.to_string()
    })
}

fn split_list(raw: Option<&String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Split a fault whose code field merges several codes
///
/// Agents may report `"A, B"` in one entry; every code becomes its own fault
/// with the same device, level and time bookkeeping.
pub fn split_device_fault(fault: DeviceFault) -> Vec<DeviceFault> {
    let merged: String = fault.fault_code.chars().filter(|c| !c.is_whitespace()).collect();
    merged
        .split(',')
        .map(|code| DeviceFault {
            fault_code: code.to_string(),
            large_model_fault_level: fault.fault_level.as_str().to_string(),
            fault_handling: fault.fault_level.as_str().to_string(),
            ..fault.clone()
        })
        .collect()
}

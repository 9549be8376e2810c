//! Suppression filter processor
//!
//! Splits each node's faults into the ones still reported and the ones
//! withheld for a self-recovering job. Withheld faults go to the cache.

use std::collections::HashMap;
use std::sync::Arc;

use super::cache::SuppressionCache;
use super::policy::{DeviceUsage, SuppressionPolicy};
use super::SuppressionKind;
use crate::center::{CategoryContent, ContentProcessor};
use crate::constants::{FAULT_TYPE_NPU, FAULT_TYPE_SWITCH};
use crate::external::{FaultPublisher, JobTopology};
use crate::models::{
    DeviceFault, DeviceInfo, FaultDevice, FaultLevel, HealthState, SimpleSwitchFaultInfo,
    SwitchInfo,
};

/// Custom or L2 fault filter
pub struct SuppressionFilter {
    kind: SuppressionKind,
    topology: Arc<dyn JobTopology>,
    publisher: Arc<dyn FaultPublisher>,
    cache: Arc<SuppressionCache>,
    timeout_ms: i64,
}

impl SuppressionFilter {
    pub fn new(
        kind: SuppressionKind,
        topology: Arc<dyn JobTopology>,
        publisher: Arc<dyn FaultPublisher>,
        cache: Arc<SuppressionCache>,
        timeout_ms: i64,
    ) -> Self {
        Self {
            kind,
            topology,
            publisher,
            cache,
            timeout_ms,
        }
    }

    pub fn cache(&self) -> &Arc<SuppressionCache> {
        &self.cache
    }

    /// Filter content as of `now_ms`
    pub fn process_at(&self, content: CategoryContent, now_ms: i64) -> CategoryContent {
        match content {
            CategoryContent::Device(records) => {
                CategoryContent::Device(self.process_device_faults(records, now_ms))
            }
            CategoryContent::Switch(records) => {
                CategoryContent::Switch(self.process_switch_faults(records, now_ms))
            }
            other => {
                tracing::debug!(
                    "{} filter does not handle {} content",
                    self.kind,
                    other.category()
                );
                other
            }
        }
    }

    fn policy(&self) -> SuppressionPolicy<'_> {
        SuppressionPolicy::new(self.publisher.as_ref(), self.timeout_ms)
    }

    fn process_device_faults(
        &self,
        mut records: HashMap<String, DeviceInfo>,
        now_ms: i64,
    ) -> HashMap<String, DeviceInfo> {
        let jobs = self.topology.suppression_jobs(self.kind);
        let mut deleted_by_node = HashMap::new();
        let mut deleted_by_job: HashMap<String, Vec<FaultDevice>> = HashMap::new();
        if jobs.is_empty() {
            tracing::debug!("No {} jobs, skipping device fault filter", self.kind);
            self.cache
                .set_deleted_device_faults(deleted_by_node, deleted_by_job);
            return records;
        }

        let policy = self.policy();
        for info in records.values_mut() {
            let node_name = info.node_name().to_string();
            let (Some(job_infos), Some(used_by_job)) = (
                jobs.job_info_by_node.get(&node_name),
                jobs.used_devices_by_node.get(&node_name),
            ) else {
                tracing::debug!(
                    "Node {} has no {} job or used devices, skipping",
                    node_name,
                    self.kind
                );
                continue;
            };

            let mut suppressed: Vec<DeviceFault> = Vec::new();
            for (device_name, faults) in &info.fault_device_list {
                for fault in faults {
                    let Some(entry) = fault.time_and_level() else {
                        tracing::warn!(
                            "Fault {} on {} has no time and level info, reporting it",
                            fault.fault_code,
                            device_name
                        );
                        continue;
                    };
                    let mut withheld = false;
                    for (job_id, job) in job_infos {
                        let usage = DeviceUsage {
                            device_name,
                            used_devices: used_by_job.get(job_id),
                        };
                        if !policy.should_report_fault(
                            entry,
                            job,
                            Some(usage),
                            &fault.fault_code,
                            now_ms,
                        ) {
                            withheld = true;
                            deleted_by_job
                                .entry(job_id.clone())
                                .or_default()
                                .push(device_fault_device(&node_name, device_name, fault));
                        }
                    }
                    if withheld {
                        suppressed.push(fault.clone());
                    }
                }
            }

            let mut deleted = info.empty_like();
            for fault in suppressed {
                info.remove_fault(&fault);
                deleted.add_fault(fault);
            }
            tracing::debug!(
                "Node {}: {} device faults kept, {} withheld by {} filter",
                node_name,
                info.fault_count(),
                deleted.fault_count(),
                self.kind
            );
            deleted_by_node.insert(node_name, deleted);
        }

        self.cache
            .set_deleted_device_faults(deleted_by_node, deleted_by_job);
        records
    }

    fn process_switch_faults(
        &self,
        mut records: HashMap<String, SwitchInfo>,
        now_ms: i64,
    ) -> HashMap<String, SwitchInfo> {
        let jobs = self.topology.suppression_jobs(self.kind);
        let mut deleted_by_cm = HashMap::new();
        let mut deleted_by_job: HashMap<String, Vec<FaultDevice>> = HashMap::new();
        if jobs.is_empty() {
            tracing::debug!("No {} jobs, skipping switch fault filter", self.kind);
            self.cache
                .set_deleted_switch_faults(deleted_by_cm, deleted_by_job);
            return records;
        }

        let policy = self.policy();
        for (cm_name, info) in records.iter_mut() {
            let node_name = info.node_name().to_string();
            let Some(job_infos) = jobs.job_info_by_node.get(&node_name) else {
                tracing::debug!("Node {} has no {} job, skipping", node_name, self.kind);
                continue;
            };

            let mut deleted_copy = info.clone();
            let mut kept = Vec::with_capacity(info.fault_info.len());
            let mut deleted = Vec::new();
            for fault in std::mem::take(&mut info.fault_info) {
                let key = fault.time_level_key();
                let Some(entry) = info.fault_time_and_level_map.get(&key) else {
                    tracing::warn!("Switch {} has no time and level for {}, reporting", cm_name, key);
                    kept.push(fault);
                    continue;
                };
                let mut withheld = false;
                for (job_id, job) in job_infos {
                    if !policy.should_report_fault(
                        entry,
                        job,
                        None,
                        &fault.assembled_fault_code,
                        now_ms,
                    ) {
                        withheld = true;
                        deleted_by_job
                            .entry(job_id.clone())
                            .or_default()
                            .push(switch_fault_device(&node_name, &fault, &entry.fault_level));
                    }
                }
                if withheld {
                    info.fault_time_and_level_map.remove(&key);
                    deleted.push(fault);
                } else {
                    kept.push(fault);
                }
            }

            if !deleted.is_empty() && info.fault_level == FaultLevel::RestartRequest {
                info.fault_level = FaultLevel::Unset;
                info.node_status = HealthState::Healthy;
                if !kept.is_empty() {
                    info.fault_level = FaultLevel::NotHandleFault;
                }
                tracing::debug!(
                    "Switch {} recomputed: level '{}', status {}",
                    cm_name,
                    info.fault_level,
                    info.node_status
                );
            }
            info.fault_info = kept;
            deleted_copy.fault_info = deleted;
            deleted_by_cm.insert(cm_name.clone(), deleted_copy);
        }

        self.cache
            .set_deleted_switch_faults(deleted_by_cm, deleted_by_job);
        records
    }
}

impl ContentProcessor for SuppressionFilter {
    fn name(&self) -> &'static str {
        match self.kind {
            SuppressionKind::Custom => "custom-fault-filter",
            SuppressionKind::L2 => "l2-fault-filter",
        }
    }

    fn process(&self, content: CategoryContent) -> CategoryContent {
        self.process_at(content, chrono::Utc::now().timestamp_millis())
    }
}

fn device_id_of(device_name: &str) -> &str {
    device_name
        .rsplit_once('-')
        .map(|(_, id)| id)
        .unwrap_or(device_name)
}

fn device_fault_device(node_name: &str, device_name: &str, fault: &DeviceFault) -> FaultDevice {
    FaultDevice {
        server_name: node_name.to_string(),
        device_id: device_id_of(device_name).to_string(),
        fault_code: fault.fault_code.clone(),
        fault_level: fault.fault_level.clone(),
        device_type: FAULT_TYPE_NPU.to_string(),
    }
}

fn switch_fault_device(
    node_name: &str,
    fault: &SimpleSwitchFaultInfo,
    level: &FaultLevel,
) -> FaultDevice {
    FaultDevice {
        server_name: node_name.to_string(),
        device_id: format!("{}_{}", fault.switch_chip_id, fault.switch_port_id),
        fault_code: fault.assembled_fault_code.clone(),
        fault_level: level.clone(),
        device_type: FAULT_TYPE_SWITCH.to_string(),
    }
}

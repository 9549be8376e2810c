//! Suppressed fault cache
//!
//! Written once per filter pass and never patched in between.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::{DeviceInfo, FaultDevice, SwitchInfo};

fn swap<T>(slot: &RwLock<Arc<T>>, value: T) {
    let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
    *guard = Arc::new(value);
}

fn read<T: Clone>(slot: &RwLock<Arc<T>>) -> T {
    slot.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .clone()
}

/// Faults withheld by one filter
#[derive(Default)]
pub struct SuppressionCache {
    /// node name -> device faults removed from that node's record
    deleted_device_faults: RwLock<Arc<HashMap<String, DeviceInfo>>>,
    /// configmap name -> switch faults removed from that record
    deleted_switch_faults: RwLock<Arc<HashMap<String, SwitchInfo>>>,
    job_device_faults: RwLock<Arc<HashMap<String, Vec<FaultDevice>>>>,
    job_switch_faults: RwLock<Arc<HashMap<String, Vec<FaultDevice>>>>,
}

impl SuppressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_deleted_device_faults(
        &self,
        deleted: HashMap<String, DeviceInfo>,
        by_job: HashMap<String, Vec<FaultDevice>>,
    ) {
        swap(&self.deleted_device_faults, deleted);
        swap(&self.job_device_faults, by_job);
    }

    pub fn set_deleted_switch_faults(
        &self,
        deleted: HashMap<String, SwitchInfo>,
        by_job: HashMap<String, Vec<FaultDevice>>,
    ) {
        swap(&self.deleted_switch_faults, deleted);
        swap(&self.job_switch_faults, by_job);
    }

    pub fn deleted_device_faults(&self) -> HashMap<String, DeviceInfo> {
        read(&self.deleted_device_faults)
    }

    pub fn deleted_switch_faults(&self) -> HashMap<String, SwitchInfo> {
        read(&self.deleted_switch_faults)
    }

    /// Suppressed device and switch faults grouped by job
    pub fn deleted_fault_devices_by_job(&self) -> HashMap<String, Vec<FaultDevice>> {
        let mut merged = read(&self.job_device_faults);
        for (job_id, faults) in read(&self.job_switch_faults) {
            merged.entry(job_id).or_default().extend(faults);
        }
        merged
    }
}

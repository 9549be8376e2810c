//! Canonical fault storage
//!
//! `ConfigMapManager` keeps one record per node per category. `FaultRecord`
//! ties each record type to its store, its business comparison and the
//! health update it pushes to the job manager.

mod manager;
mod state;

pub use manager::*;
pub use state::*;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::center::{CategoryContent, FaultCategory, FaultCenter, FaultProcessCenter};
use crate::external::JobHealthSink;
use crate::models::{DeviceInfo, NodeInfo, SwitchInfo};

/// A per-node fault record of one category
pub trait FaultRecord: Clone + fmt::Debug + Send + Sync + 'static {
    const CATEGORY: FaultCategory;

    /// Configmap name, the store key
    fn cm_name(&self) -> &str;

    /// Equality on fault-relevant fields only
    fn business_eq(&self, other: &Self) -> bool;

    fn store(manager: &ConfigMapManager) -> &Arc<RecordStore<Self>>;

    fn center(process_center: &FaultProcessCenter) -> &FaultCenter<Self>;

    /// Tell the job manager about this record's health
    fn push_health(&self, sink: &dyn JobHealthSink);

    fn into_content(records: HashMap<String, Self>) -> CategoryContent;

    /// Unwrap processor output, handing back content of another category
    fn from_content(content: CategoryContent) -> Result<HashMap<String, Self>, CategoryContent>;
}

impl FaultRecord for DeviceInfo {
    const CATEGORY: FaultCategory = FaultCategory::Device;

    fn cm_name(&self) -> &str {
        &self.cm_name
    }

    fn business_eq(&self, other: &Self) -> bool {
        DeviceInfo::business_eq(self, other)
    }

    fn store(manager: &ConfigMapManager) -> &Arc<RecordStore<Self>> {
        manager.device_store()
    }

    fn center(process_center: &FaultProcessCenter) -> &FaultCenter<Self> {
        process_center.device_center()
    }

    fn push_health(&self, sink: &dyn JobHealthSink) {
        sink.update_job_device_status(self);
    }

    fn into_content(records: HashMap<String, Self>) -> CategoryContent {
        CategoryContent::Device(records)
    }

    fn from_content(content: CategoryContent) -> Result<HashMap<String, Self>, CategoryContent> {
        match content {
            CategoryContent::Device(records) => Ok(records),
            other => Err(other),
        }
    }
}

impl FaultRecord for NodeInfo {
    const CATEGORY: FaultCategory = FaultCategory::Node;

    fn cm_name(&self) -> &str {
        &self.cm_name
    }

    fn business_eq(&self, other: &Self) -> bool {
        NodeInfo::business_eq(self, other)
    }

    fn store(manager: &ConfigMapManager) -> &Arc<RecordStore<Self>> {
        manager.node_store()
    }

    fn center(process_center: &FaultProcessCenter) -> &FaultCenter<Self> {
        process_center.node_center()
    }

    fn push_health(&self, sink: &dyn JobHealthSink) {
        sink.update_job_node_status(self.node_name(), self.node_status.clone());
    }

    fn into_content(records: HashMap<String, Self>) -> CategoryContent {
        CategoryContent::Node(records)
    }

    fn from_content(content: CategoryContent) -> Result<HashMap<String, Self>, CategoryContent> {
        match content {
            CategoryContent::Node(records) => Ok(records),
            other => Err(other),
        }
    }
}

impl FaultRecord for SwitchInfo {
    const CATEGORY: FaultCategory = FaultCategory::Switch;

    fn cm_name(&self) -> &str {
        &self.cm_name
    }

    fn business_eq(&self, other: &Self) -> bool {
        SwitchInfo::business_eq(self, other)
    }

    fn store(manager: &ConfigMapManager) -> &Arc<RecordStore<Self>> {
        manager.switch_store()
    }

    fn center(process_center: &FaultProcessCenter) -> &FaultCenter<Self> {
        process_center.switch_center()
    }

    fn push_health(&self, sink: &dyn JobHealthSink) {
        sink.update_job_node_status(self.node_name(), self.node_status.clone());
    }

    fn into_content(records: HashMap<String, Self>) -> CategoryContent {
        CategoryContent::Switch(records)
    }

    fn from_content(content: CategoryContent) -> Result<HashMap<String, Self>, CategoryContent> {
        match content {
            CategoryContent::Switch(records) => Ok(records),
            other => Err(other),
        }
    }
}

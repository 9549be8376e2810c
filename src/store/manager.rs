//! Canonical fault state for all categories

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{FaultRecord, RecordStore};
use crate::center::FaultCategory;
use crate::external::JobHealthSink;
use crate::models::{DeviceInfo, NodeInfo, SwitchInfo};

/// Latest device, node and switch record per configmap
pub struct ConfigMapManager {
    device: Arc<RecordStore<DeviceInfo>>,
    node: Arc<RecordStore<NodeInfo>>,
    switch: Arc<RecordStore<SwitchInfo>>,
    health: Arc<dyn JobHealthSink>,
    new_message_total: AtomicU64,
}

impl ConfigMapManager {
    pub fn new(max_nodes: usize, health: Arc<dyn JobHealthSink>) -> Self {
        Self {
            device: Arc::new(RecordStore::new(FaultCategory::Device, max_nodes)),
            node: Arc::new(RecordStore::new(FaultCategory::Node, max_nodes)),
            switch: Arc::new(RecordStore::new(FaultCategory::Switch, max_nodes)),
            health,
            new_message_total: AtomicU64::new(0),
        }
    }

    pub fn device_store(&self) -> &Arc<RecordStore<DeviceInfo>> {
        &self.device
    }

    pub fn node_store(&self) -> &Arc<RecordStore<NodeInfo>> {
        &self.node
    }

    pub fn switch_store(&self) -> &Arc<RecordStore<SwitchInfo>> {
        &self.switch
    }

    /// Number of ingested updates that changed business data
    pub fn new_message_total(&self) -> u64 {
        self.new_message_total.load(Ordering::Relaxed)
    }

    /// Store a record and report whether its business data changed
    ///
    /// The comparison base is the stored record, or the informer's old object
    /// when nothing is stored yet. The entry is replaced either way so the
    /// latest timestamps are kept.
    pub fn save_record<T: FaultRecord>(&self, informer_old: Option<&T>, record: T) -> bool {
        let key = record.cm_name().to_string();
        let pushed = record.clone();
        let previous = match T::store(self).upsert(key, record) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::error!("{}", e);
                return false;
            }
        };

        let changed = match previous.as_ref().or(informer_old) {
            Some(old) => !old.business_eq(&pushed),
            None => true,
        };
        if changed {
            tracing::debug!("{} record {} changed", T::CATEGORY, pushed.cm_name());
            pushed.push_health(self.health.as_ref());
            self.new_message_total.fetch_add(1, Ordering::Relaxed);
        }
        changed
    }

    /// Drop a record, returning whether one was stored
    pub fn delete_record<T: FaultRecord>(&self, record: &T) -> bool {
        let found = T::store(self).remove(record.cm_name()).is_some();
        if found {
            tracing::debug!("{} record {} deleted", T::CATEGORY, record.cm_name());
            self.new_message_total.fetch_add(1, Ordering::Relaxed);
        }
        found
    }
}

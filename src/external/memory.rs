//! In-process collaborator implementations
//!
//! Thread-safe stores that the watchers and embedding code fill in. All of
//! them recover from lock poisoning instead of panicking.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use super::{
    FaultPublisher, JobHealthSink, JobTopology, NodeReadiness, SuppressionJobs, UceDevice,
    UceTracker,
};
use crate::filter::SuppressionKind;
use crate::models::{DeviceInfo, HealthState, ServerHccl, SimplePodInfo};

/// Topology of one running job
#[derive(Debug, Clone, Default)]
pub struct JobTopologyEntry {
    pub servers: BTreeMap<String, ServerHccl>,
    pub pods: Vec<SimplePodInfo>,
    pub device_num_of_pod: i32,
    pub pod_strategies: HashMap<String, String>,
}

#[derive(Default)]
struct TopologyInner {
    jobs: HashMap<String, JobTopologyEntry>,
    custom: SuppressionJobs,
    l2: SuppressionJobs,
}

/// Job topology held in memory
#[derive(Default)]
pub struct InMemoryJobTopology {
    inner: RwLock<TopologyInner>,
}

impl InMemoryJobTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a job
    pub fn upsert_job(&self, job_id: impl Into<String>, entry: JobTopologyEntry) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.jobs.insert(job_id.into(), entry);
    }

    pub fn remove_job(&self, job_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.jobs.remove(job_id);
    }

    /// Replace the suppression candidates of one kind
    pub fn set_suppression_jobs(&self, kind: SuppressionKind, jobs: SuppressionJobs) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match kind {
            SuppressionKind::Custom => inner.custom = jobs,
            SuppressionKind::L2 => inner.l2 = jobs,
        }
    }
}

impl JobTopology for InMemoryJobTopology {
    fn job_server_info_map(&self) -> HashMap<String, BTreeMap<String, ServerHccl>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .jobs
            .iter()
            .map(|(id, entry)| (id.clone(), entry.servers.clone()))
            .collect()
    }

    fn simple_pods_by_job(&self, job_id: &str) -> Vec<SimplePodInfo> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .jobs
            .get(job_id)
            .map(|entry| entry.pods.clone())
            .unwrap_or_default()
    }

    fn pod_device_num_by_job(&self, job_id: &str) -> i32 {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .jobs
            .get(job_id)
            .map(|entry| entry.device_num_of_pod)
            .unwrap_or(0)
    }

    fn pod_strategies_by_job(&self, job_id: &str) -> HashMap<String, String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .jobs
            .get(job_id)
            .map(|entry| entry.pod_strategies.clone())
            .unwrap_or_default()
    }

    fn suppression_jobs(&self, kind: SuppressionKind) -> SuppressionJobs {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match kind {
            SuppressionKind::Custom => inner.custom.clone(),
            SuppressionKind::L2 => inner.l2.clone(),
        }
    }
}

/// Node readiness cache fed by the node watcher
#[derive(Default)]
pub struct NodeReadinessCache {
    ready: RwLock<HashMap<String, bool>>,
}

impl NodeReadinessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, node_name: impl Into<String>, ready: bool) {
        let mut nodes = self.ready.write().unwrap_or_else(PoisonError::into_inner);
        nodes.insert(node_name.into(), ready);
    }

    pub fn remove(&self, node_name: &str) {
        let mut nodes = self.ready.write().unwrap_or_else(PoisonError::into_inner);
        nodes.remove(node_name);
    }

    pub fn len(&self) -> usize {
        self.ready
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeReadiness for NodeReadinessCache {
    fn is_node_ready(&self, node_name: &str) -> bool {
        let nodes = self.ready.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(node_name).copied().unwrap_or(false)
    }
}

/// Subscription registry held in memory, keyed by (topic, subscriber kind)
#[derive(Default)]
pub struct InMemorySubscriptionRegistry {
    subscriptions: RwLock<HashSet<(String, String)>>,
}

impl InMemorySubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: impl Into<String>, kind: impl Into<String>) {
        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subs.insert((topic.into(), kind.into()));
    }

    pub fn unsubscribe(&self, topic: &str, kind: &str) {
        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subs.remove(&(topic.to_string(), kind.to_string()));
    }
}

impl FaultPublisher for InMemorySubscriptionRegistry {
    fn is_subscribed(&self, topic: &str, subscriber_kind: &str) -> bool {
        let subs = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        subs.contains(&(topic.to_string(), subscriber_kind.to_string()))
    }
}

/// UCE tracker held in memory
///
/// A device may step-retry while its business-plane recovery is recent and
/// not yet completed.
pub struct InMemoryUceTracker {
    devices: RwLock<HashMap<(String, String, String), UceDevice>>,
    recover_window_ms: i64,
}

impl InMemoryUceTracker {
    pub fn new(recover_window_ms: i64) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            recover_window_ms,
        }
    }

    pub fn record(&self, job_id: &str, node_name: &str, device: UceDevice) {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        devices.insert(
            (
                job_id.to_string(),
                node_name.to_string(),
                device.device_name.clone(),
            ),
            device,
        );
    }

    pub fn clear_job(&self, job_id: &str) {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        devices.retain(|(job, _, _), _| job != job_id);
    }
}

impl UceTracker for InMemoryUceTracker {
    fn get_uce_device_from_job(
        &self,
        job_id: &str,
        node_name: &str,
        device_name: &str,
    ) -> Option<UceDevice> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        devices
            .get(&(
                job_id.to_string(),
                node_name.to_string(),
                device_name.to_string(),
            ))
            .cloned()
    }

    fn can_do_step_retry(&self, device: &UceDevice) -> bool {
        device.complete_time == 0 && self.valid_business_recover_time(device.recover_time)
    }

    fn valid_business_recover_time(&self, recover_time: i64) -> bool {
        if recover_time <= 0 {
            return false;
        }
        chrono::Utc::now().timestamp_millis() - recover_time <= self.recover_window_ms
    }
}

/// Tracker for deployments without a business-plane UCE source
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUceTracker;

impl UceTracker for NoUceTracker {
    fn get_uce_device_from_job(&self, _: &str, _: &str, _: &str) -> Option<UceDevice> {
        None
    }

    fn can_do_step_retry(&self, _: &UceDevice) -> bool {
        false
    }

    fn valid_business_recover_time(&self, _: i64) -> bool {
        false
    }
}

/// Health sink that keeps the latest status pushed per node
#[derive(Default)]
pub struct NodeHealthLedger {
    node_status: RwLock<HashMap<String, HealthState>>,
    unhealthy_devices: RwLock<HashMap<String, Vec<String>>>,
}

impl NodeHealthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_status(&self, node_name: &str) -> Option<HealthState> {
        let status = self
            .node_status
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        status.get(node_name).cloned()
    }

    /// Devices last reported card-unhealthy on a node
    pub fn unhealthy_devices(&self, node_name: &str) -> Vec<String> {
        let devices = self
            .unhealthy_devices
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        devices.get(node_name).cloned().unwrap_or_default()
    }
}

impl JobHealthSink for NodeHealthLedger {
    fn update_job_device_status(&self, info: &DeviceInfo) {
        tracing::debug!(
            "Device health update for node {}: {} unhealthy cards",
            info.node_name(),
            info.card_unhealthy.len()
        );
        let mut devices = self
            .unhealthy_devices
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        devices.insert(info.node_name().to_string(), info.card_unhealthy.clone());
    }

    fn update_job_node_status(&self, node_name: &str, status: HealthState) {
        tracing::debug!("Node health update for {}: {}", node_name, status);
        let mut nodes = self
            .node_status
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        nodes.insert(node_name.to_string(), status);
    }
}

//! Collaborator seams
//!
//! The engine only consumes these services. Production wiring lives outside
//! this crate; `memory` provides in-process implementations used by the
//! daemon bootstrap and by tests.

mod memory;

pub use memory::*;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::filter::SuppressionKind;
use crate::models::{DeviceInfo, HealthState, JobInfo, ServerHccl, SimplePodInfo};

/// Suppression candidates on each node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuppressionJobs {
    /// node name -> job id -> job identity
    pub job_info_by_node: HashMap<String, HashMap<String, JobInfo>>,
    /// node name -> job id -> device names the job uses on that node
    pub used_devices_by_node: HashMap<String, HashMap<String, HashSet<String>>>,
}

impl SuppressionJobs {
    pub fn is_empty(&self) -> bool {
        self.job_info_by_node.is_empty()
    }
}

/// Job to server/pod topology
#[cfg_attr(test, mockall::automock)]
pub trait JobTopology: Send + Sync {
    /// job id -> node name -> devices the job holds on that node
    fn job_server_info_map(&self) -> HashMap<String, BTreeMap<String, ServerHccl>>;

    fn simple_pods_by_job(&self, job_id: &str) -> Vec<SimplePodInfo>;

    /// Number of ranks sharing one pod
    fn pod_device_num_by_job(&self, job_id: &str) -> i32;

    /// pod name -> fault strategy decided for that pod
    fn pod_strategies_by_job(&self, job_id: &str) -> HashMap<String, String>;

    /// Jobs eligible for one kind of fault suppression
    fn suppression_jobs(&self, kind: SuppressionKind) -> SuppressionJobs;
}

/// Node readiness as seen by the cluster
#[cfg_attr(test, mockall::automock)]
pub trait NodeReadiness: Send + Sync {
    /// Unknown nodes are not ready
    fn is_node_ready(&self, node_name: &str) -> bool;
}

/// UCE state recorded by the business plane for one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UceDevice {
    pub device_name: String,
    pub fault_time: i64,
    pub recover_time: i64,
    pub complete_time: i64,
}

/// Device recovery bookkeeping for uncorrectable memory errors
#[cfg_attr(test, mockall::automock)]
pub trait UceTracker: Send + Sync {
    fn get_uce_device_from_job(
        &self,
        job_id: &str,
        node_name: &str,
        device_name: &str,
    ) -> Option<UceDevice>;

    fn can_do_step_retry(&self, device: &UceDevice) -> bool;

    fn valid_business_recover_time(&self, recover_time: i64) -> bool;
}

/// Publish/subscribe registry of job recovery channels
#[cfg_attr(test, mockall::automock)]
pub trait FaultPublisher: Send + Sync {
    fn is_subscribed(&self, topic: &str, subscriber_kind: &str) -> bool;
}

/// Receiver of per-node health changes for the job manager
#[cfg_attr(test, mockall::automock)]
pub trait JobHealthSink: Send + Sync {
    fn update_job_device_status(&self, info: &DeviceInfo);

    fn update_job_node_status(&self, node_name: &str, status: HealthState);
}

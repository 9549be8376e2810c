//! Job topology and job-level fault output types

use super::fault::{FaultLevel, HealthState};

/// One device a job occupies on a server
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeviceHccl {
    pub device_id: String,
    #[serde(default)]
    pub device_ip: String,
    /// Global card rank of the device within the job
    pub rank_id: String,
}

/// Devices a job occupies on one server
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ServerHccl {
    pub server_name: String,
    pub device_list: Vec<DeviceHccl>,
}

/// Minimal pod view used for rank resolution
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SimplePodInfo {
    pub pod_uid: String,
    pub pod_rank: i32,
}

/// Identity of a job candidate for fault suppression
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct JobInfo {
    /// Job key (namespace/name or uid)
    pub key: String,
    pub name: String,
    /// Topic the job's recovery controller subscribes on; empty when single instance
    #[serde(default)]
    pub multi_instance_job_id: String,
}

impl JobInfo {
    /// Topic used for the subscription check
    pub fn subscription_topic(&self) -> &str {
        if self.multi_instance_job_id.is_empty() {
            &self.key
        } else {
            &self.multi_instance_job_id
        }
    }
}

/// One fault mapped onto a job rank
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaultRank {
    pub rank_id: String,
    pub pod_uid: String,
    pub pod_rank: String,
    pub fault_code: String,
    pub fault_level: FaultLevel,
    pub do_step_retry: bool,
}

/// Aggregate fault view of one job
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobFaultInfo {
    pub job_id: String,
    pub fault_list: Vec<FaultRank>,
    pub healthy_state: HealthState,
}

/// A fault withheld from one job by suppression
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaultDevice {
    pub server_name: String,
    pub device_id: String,
    pub fault_code: String,
    pub fault_level: FaultLevel,
    /// `NPU` or `Switch`
    pub device_type: String,
}

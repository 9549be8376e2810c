//! Card rank to pod resolution

use std::collections::HashMap;

use crate::error::{FaultError, FaultResult};
use crate::external::JobTopology;
use crate::models::SimplePodInfo;

/// Pods of one job indexed by pod rank
#[derive(Debug, Clone)]
pub struct JobPodInfoMap {
    job_id: String,
    pod_of_rank: HashMap<i32, SimplePodInfo>,
    device_num_of_pod: i32,
}

impl JobPodInfoMap {
    pub fn new(job_id: impl Into<String>, pods: Vec<SimplePodInfo>, device_num_of_pod: i32) -> Self {
        Self {
            job_id: job_id.into(),
            pod_of_rank: pods.into_iter().map(|pod| (pod.pod_rank, pod)).collect(),
            device_num_of_pod,
        }
    }

    pub fn from_topology(topology: &dyn JobTopology, job_id: &str) -> Self {
        Self::new(
            job_id,
            topology.simple_pods_by_job(job_id),
            topology.pod_device_num_by_job(job_id),
        )
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Resolve a card rank to `(pod uid, pod rank)`
    ///
    /// The pod rank is `card_rank / device_num_of_pod`.
    pub fn pod_uid_and_rank_by_card_rank(&self, card_rank: &str) -> FaultResult<(String, String)> {
        if self.device_num_of_pod <= 0 {
            return Err(FaultError::InvalidPodInfo(self.device_num_of_pod));
        }
        let rank: i32 = card_rank
            .parse()
            .map_err(|source| FaultError::InvalidCardRank {
                rank: card_rank.to_string(),
                source,
            })?;
        let pod_rank = rank / self.device_num_of_pod;
        match self.pod_of_rank.get(&pod_rank) {
            Some(pod) => Ok((pod.pod_uid.clone(), pod_rank.to_string())),
            None => Err(FaultError::PodRankNotFound(card_rank.to_string())),
        }
    }
}

//! Job fault rank processor
//!
//! Maps the processed device, node and switch state onto every running
//! job's ranks. The result is rebuilt from scratch on every pass.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use super::health::get_health_state;
use super::pod_map::JobPodInfoMap;
use crate::constants::{NODE_INFO_PREFIX, SWITCH_INFO_PREFIX, UCE_FAULT_CODE};
use crate::external::{JobTopology, NodeReadiness, UceTracker};
use crate::models::{
    DeviceHccl, DeviceInfo, FaultLevel, FaultRank, HealthState, JobFaultInfo, NodeInfo,
    ServerHccl, SwitchInfo, cm_name_for_node,
};

/// Per-job fault ranks and health
pub struct JobFaultRankProcessor {
    topology: Arc<dyn JobTopology>,
    readiness: Arc<dyn NodeReadiness>,
    uce: Arc<dyn UceTracker>,
    job_fault_info_map: RwLock<Arc<HashMap<String, JobFaultInfo>>>,
}

impl JobFaultRankProcessor {
    pub fn new(
        topology: Arc<dyn JobTopology>,
        readiness: Arc<dyn NodeReadiness>,
        uce: Arc<dyn UceTracker>,
    ) -> Self {
        Self {
            topology,
            readiness,
            uce,
            job_fault_info_map: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Deep copy of the latest job fault info
    pub fn get_job_fault_rank_infos(&self) -> HashMap<String, JobFaultInfo> {
        let infos = self
            .job_fault_info_map
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        infos.as_ref().clone()
    }

    /// Job fault info without ranks of `fault_level`
    pub fn get_job_fault_rank_infos_filter_level(
        &self,
        fault_level: &FaultLevel,
    ) -> HashMap<String, JobFaultInfo> {
        let mut infos = self.get_job_fault_rank_infos();
        for info in infos.values_mut() {
            info.fault_list.retain(|rank| &rank.fault_level != fault_level);
        }
        infos
    }

    fn set_job_fault_rank_infos(&self, infos: HashMap<String, JobFaultInfo>) {
        let mut guard = self
            .job_fault_info_map
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(infos);
    }

    /// Rebuild fault info for every known job
    ///
    /// All three maps are keyed by configmap name.
    pub fn process(
        &self,
        devices: &HashMap<String, DeviceInfo>,
        nodes: &HashMap<String, NodeInfo>,
        switches: &HashMap<String, SwitchInfo>,
    ) {
        let device_by_node: HashMap<&str, &DeviceInfo> = devices
            .values()
            .map(|info| (info.node_name(), info))
            .collect();

        let mut infos = HashMap::new();
        for (job_id, servers) in self.topology.job_server_info_map() {
            let (fault_list, node_status_list) =
                self.find_node_device_and_switch_fault(&job_id, &servers, &device_by_node, nodes, switches);
            let strategies = self.topology.pod_strategies_by_job(&job_id);
            let healthy_state = get_health_state(&fault_list, &node_status_list, &strategies);
            tracing::debug!(
                "Job {}: {} fault ranks, node status {:?}, health {}",
                job_id,
                fault_list.len(),
                node_status_list,
                healthy_state
            );
            infos.insert(
                job_id.clone(),
                JobFaultInfo {
                    job_id,
                    fault_list,
                    healthy_state,
                },
            );
        }
        self.set_job_fault_rank_infos(infos);
    }

    fn find_node_device_and_switch_fault(
        &self,
        job_id: &str,
        servers: &BTreeMap<String, ServerHccl>,
        device_by_node: &HashMap<&str, &DeviceInfo>,
        nodes: &HashMap<String, NodeInfo>,
        switches: &HashMap<String, SwitchInfo>,
    ) -> (Vec<FaultRank>, Vec<HealthState>) {
        let mut fault_list = Vec::new();
        let mut status_list = Vec::new();
        let pod_info = OnceCell::new();

        for (node_name, server) in servers {
            if let Some(switch) = switches.get(&cm_name_for_node(SWITCH_INFO_PREFIX, node_name)) {
                status_list.push(switch.node_status.clone());
                if switch.node_status.is_unhealthy() {
                    tracing::debug!("Node {} switch is unhealthy", node_name);
                    fault_list.extend(separate_all_devices(server, self.pods(&pod_info, job_id)));
                    continue;
                }
            }
            if let Some(node) = nodes.get(&cm_name_for_node(NODE_INFO_PREFIX, node_name)) {
                status_list.push(node.node_status.clone());
                if node.node_status.is_unhealthy() {
                    tracing::debug!("Node {} is unhealthy", node_name);
                    fault_list.extend(separate_all_devices(server, self.pods(&pod_info, job_id)));
                    continue;
                }
            }
            if !self.readiness.is_node_ready(node_name) {
                tracing::debug!("Node {} is not ready", node_name);
                fault_list.extend(separate_all_devices(server, self.pods(&pod_info, job_id)));
                continue;
            }
            if let Some(device_info) = device_by_node.get(node_name.as_str()) {
                fault_list.extend(self.find_fault_rank_for_job(
                    job_id,
                    node_name,
                    server,
                    device_info,
                    &pod_info,
                ));
            }
        }
        (fault_list, status_list)
    }

    /// Pod lookup for a job, built on first use
    fn pods<'a>(&self, cell: &'a OnceCell<JobPodInfoMap>, job_id: &str) -> &'a JobPodInfoMap {
        cell.get_or_init(|| JobPodInfoMap::from_topology(self.topology.as_ref(), job_id))
    }

    fn find_fault_rank_for_job(
        &self,
        job_id: &str,
        node_name: &str,
        server: &ServerHccl,
        device_info: &DeviceInfo,
        pod_info: &OnceCell<JobPodInfoMap>,
    ) -> Vec<FaultRank> {
        let mut ranks = Vec::new();
        for device in &server.device_list {
            let device_name = format!("{}-{}", device_info.device_type, device.device_id);
            let faults = device_info
                .fault_device_list
                .get(&device_name)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let mut uce_in_management_plane = false;
            for fault in faults {
                let (pod_uid, pod_rank) = resolve_pod(self.pods(pod_info, job_id), device);
                let mut rank = FaultRank {
                    rank_id: device.rank_id.clone(),
                    pod_uid,
                    pod_rank,
                    fault_code: fault.fault_code.clone(),
                    fault_level: fault.fault_level.clone(),
                    do_step_retry: false,
                };
                if fault.fault_code.contains(UCE_FAULT_CODE) {
                    uce_in_management_plane = true;
                    rank.do_step_retry = self.can_do_step_retry(job_id, node_name, &device_name);
                }
                ranks.push(rank);
            }
            if uce_in_management_plane {
                continue;
            }
            if self.uce_in_business_plane(job_id, node_name, &device_name) {
                let (pod_uid, pod_rank) = resolve_pod(self.pods(pod_info, job_id), device);
                ranks.push(FaultRank {
                    rank_id: device.rank_id.clone(),
                    pod_uid,
                    pod_rank,
                    fault_code: UCE_FAULT_CODE.to_string(),
                    fault_level: FaultLevel::RestartBusiness,
                    do_step_retry: self.can_do_step_retry(job_id, node_name, &device_name),
                });
            }
        }
        ranks
    }

    fn can_do_step_retry(&self, job_id: &str, node_name: &str, device_name: &str) -> bool {
        match self.uce.get_uce_device_from_job(job_id, node_name, device_name) {
            Some(device) => self.uce.can_do_step_retry(&device),
            None => {
                tracing::debug!(
                    "Job {} has no UCE fault on node {} device {}",
                    job_id,
                    node_name,
                    device_name
                );
                false
            }
        }
    }

    fn uce_in_business_plane(&self, job_id: &str, node_name: &str, device_name: &str) -> bool {
        self.uce
            .get_uce_device_from_job(job_id, node_name, device_name)
            .is_some_and(|device| self.uce.valid_business_recover_time(device.recover_time))
    }
}

/// Resolve pod identity, degrading to blanks so the rank is never dropped
fn resolve_pod(pods: &JobPodInfoMap, device: &DeviceHccl) -> (String, String) {
    match pods.pod_uid_and_rank_by_card_rank(&device.rank_id) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!(
                "Job {} device {} (rank {}): {}",
                pods.job_id(),
                device.device_ip,
                device.rank_id,
                e
            );
            (String::new(), String::new())
        }
    }
}

fn separate_all_devices(server: &ServerHccl, pods: &JobPodInfoMap) -> Vec<FaultRank> {
    server
        .device_list
        .iter()
        .map(|device| {
            let (pod_uid, pod_rank) = resolve_pod(pods, device);
            FaultRank {
                rank_id: device.rank_id.clone(),
                pod_uid,
                pod_rank,
                fault_code: String::new(),
                fault_level: FaultLevel::SeparateNPU,
                do_step_retry: false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{MockJobTopology, MockNodeReadiness, MockUceTracker, UceDevice};
    use crate::models::{DeviceFault, SimplePodInfo};

    fn server(node: &str, devices: &[(&str, &str)]) -> ServerHccl {
        ServerHccl {
            server_name: node.to_string(),
            device_list: devices
                .iter()
                .map(|(id, rank)| DeviceHccl {
                    device_id: id.to_string(),
                    device_ip: format!("10.0.0.{}", id),
                    rank_id: rank.to_string(),
                })
                .collect(),
        }
    }

    fn topology(servers: BTreeMap<String, ServerHccl>) -> MockJobTopology {
        let mut topology = MockJobTopology::new();
        topology
            .expect_job_server_info_map()
            .return_const(HashMap::from([("job-1".to_string(), servers)]));
        topology.expect_simple_pods_by_job().returning(|_| {
            vec![
                SimplePodInfo {
                    pod_uid: "uid-0".to_string(),
                    pod_rank: 0,
                },
                SimplePodInfo {
                    pod_uid: "uid-1".to_string(),
                    pod_rank: 1,
                },
            ]
        });
        topology.expect_pod_device_num_by_job().return_const(2);
        topology
            .expect_pod_strategies_by_job()
            .returning(|_| HashMap::new());
        topology
    }

    fn ready(value: bool) -> MockNodeReadiness {
        let mut readiness = MockNodeReadiness::new();
        readiness.expect_is_node_ready().return_const(value);
        readiness
    }

    fn no_uce() -> MockUceTracker {
        let mut uce = MockUceTracker::new();
        uce.expect_get_uce_device_from_job().returning(|_, _, _| None);
        uce
    }

    fn device_record(faults: &[(&str, &str, FaultLevel)]) -> HashMap<String, DeviceInfo> {
        let mut info = DeviceInfo {
            cm_name: "mindx-dl-deviceinfo-node1".to_string(),
            device_type: "Ascend910".to_string(),
            ..Default::default()
        };
        for (npu, code, level) in faults {
            info.add_fault(DeviceFault {
                npu_name: npu.to_string(),
                fault_code: code.to_string(),
                fault_level: level.clone(),
                ..Default::default()
            });
        }
        HashMap::from([(info.cm_name.clone(), info)])
    }

    #[test]
    fn test_device_faults_mapped_to_ranks() {
        let servers = BTreeMap::from([("node1".to_string(), server("node1", &[("0", "2"), ("1", "3")]))]);
        let processor = JobFaultRankProcessor::new(
            Arc::new(topology(servers)),
            Arc::new(ready(true)),
            Arc::new(no_uce()),
        );
        let devices = device_record(&[("Ascend910-1", "8C1F8609", FaultLevel::RestartNPU)]);
        processor.process(&devices, &HashMap::new(), &HashMap::new());

        let infos = processor.get_job_fault_rank_infos();
        let job = &infos["job-1"];
        assert_eq!(job.fault_list.len(), 1);
        let rank = &job.fault_list[0];
        assert_eq!(rank.rank_id, "3");
        assert_eq!(rank.pod_rank, "1");
        assert_eq!(rank.pod_uid, "uid-1");
        assert_eq!(rank.fault_level, FaultLevel::RestartNPU);
        assert_eq!(job.healthy_state, HealthState::Unhealthy);
    }

    #[test]
    fn test_uce_fault_asks_for_step_retry() {
        let servers = BTreeMap::from([("node1".to_string(), server("node1", &[("0", "0")]))]);
        let mut uce = MockUceTracker::new();
        uce.expect_get_uce_device_from_job()
            .returning(|_, _, device| {
                Some(UceDevice {
                    device_name: device.to_string(),
                    ..Default::default()
                })
            });
        uce.expect_can_do_step_retry().return_const(true);
        uce.expect_valid_business_recover_time().times(0);
        let processor = JobFaultRankProcessor::new(
            Arc::new(topology(servers)),
            Arc::new(ready(true)),
            Arc::new(uce),
        );
        let devices = device_record(&[("Ascend910-0", "80E01801", FaultLevel::RestartBusiness)]);
        processor.process(&devices, &HashMap::new(), &HashMap::new());

        let infos = processor.get_job_fault_rank_infos();
        assert!(infos["job-1"].fault_list[0].do_step_retry);
    }

    #[test]
    fn test_business_plane_uce_synthesizes_rank() {
        let servers = BTreeMap::from([("node1".to_string(), server("node1", &[("0", "0")]))]);
        let mut uce = MockUceTracker::new();
        uce.expect_get_uce_device_from_job()
            .returning(|_, _, device| {
                Some(UceDevice {
                    device_name: device.to_string(),
                    recover_time: 5,
                    ..Default::default()
                })
            });
        uce.expect_valid_business_recover_time()
            .withf(|t| *t == 5)
            .return_const(true);
        uce.expect_can_do_step_retry().return_const(false);
        let processor = JobFaultRankProcessor::new(
            Arc::new(topology(servers)),
            Arc::new(ready(true)),
            Arc::new(uce),
        );
        processor.process(&device_record(&[]), &HashMap::new(), &HashMap::new());

        let infos = processor.get_job_fault_rank_infos();
        let rank = &infos["job-1"].fault_list[0];
        assert_eq!(rank.fault_code, UCE_FAULT_CODE);
        assert_eq!(rank.fault_level, FaultLevel::RestartBusiness);
        assert!(!rank.do_step_retry);
    }

    #[test]
    fn test_unhealthy_switch_separates_node() {
        let servers = BTreeMap::from([("node1".to_string(), server("node1", &[("0", "0"), ("1", "1")]))]);
        let processor = JobFaultRankProcessor::new(
            Arc::new(topology(servers)),
            Arc::new(ready(true)),
            Arc::new(no_uce()),
        );
        let switch = SwitchInfo {
            cm_name: "mindx-dl-switchinfo-node1".to_string(),
            node_status: HealthState::Unhealthy,
            ..Default::default()
        };
        let switches = HashMap::from([(switch.cm_name.clone(), switch)]);
        let devices = device_record(&[("Ascend910-0", "A", FaultLevel::NotHandleFault)]);
        processor.process(&devices, &HashMap::new(), &switches);

        let infos = processor.get_job_fault_rank_infos();
        let job = &infos["job-1"];
        assert_eq!(job.fault_list.len(), 2);
        assert!(job.fault_list.iter().all(|r| r.fault_level == FaultLevel::SeparateNPU));
        assert!(job.fault_list.iter().all(|r| r.fault_code.is_empty()));
    }

    #[test]
    fn test_unresolvable_pod_keeps_rank_with_blank_ids() {
        let servers = BTreeMap::from([("node1".to_string(), server("node1", &[("0", "99")]))]);
        let processor = JobFaultRankProcessor::new(
            Arc::new(topology(servers)),
            Arc::new(ready(false)),
            Arc::new(no_uce()),
        );
        processor.process(&HashMap::new(), &HashMap::new(), &HashMap::new());

        let infos = processor.get_job_fault_rank_infos();
        let rank = &infos["job-1"].fault_list[0];
        assert_eq!(rank.rank_id, "99");
        assert!(rank.pod_uid.is_empty());
        assert!(rank.pod_rank.is_empty());
    }

    #[test]
    fn test_filter_level_removes_matching_ranks() {
        let servers = BTreeMap::from([("node1".to_string(), server("node1", &[("0", "0"), ("1", "1")]))]);
        let processor = JobFaultRankProcessor::new(
            Arc::new(topology(servers)),
            Arc::new(ready(true)),
            Arc::new(no_uce()),
        );
        let devices = device_record(&[
            ("Ascend910-0", "A", FaultLevel::NotHandleFault),
            ("Ascend910-1", "B", FaultLevel::SeparateNPU),
        ]);
        processor.process(&devices, &HashMap::new(), &HashMap::new());

        let filtered = processor.get_job_fault_rank_infos_filter_level(&FaultLevel::NotHandleFault);
        assert_eq!(filtered["job-1"].fault_list.len(), 1);
        assert_eq!(filtered["job-1"].fault_list[0].fault_code, "B");
        assert_eq!(processor.get_job_fault_rank_infos()["job-1"].fault_list.len(), 2);
    }
}

//! Job fault rank tests
//!
//! Drives whole processing passes through the process center with the
//! in-memory topology, readiness and UCE collaborators.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use faultcenter::center::{Collaborators, EngineSettings, FaultCategory, FaultProcessCenter};
use faultcenter::constants::UCE_FAULT_CODE;
use faultcenter::external::{
    InMemoryJobTopology, InMemorySubscriptionRegistry, InMemoryUceTracker, JobTopologyEntry,
    NodeHealthLedger, NodeReadinessCache, UceDevice,
};
use faultcenter::models::{
    DeviceFault, DeviceHccl, DeviceInfo, FaultLevel, HealthState, NodeInfo, ServerHccl,
    SimplePodInfo,
};

struct Harness {
    center: Arc<FaultProcessCenter>,
    _worker: faultcenter::ProcessWorker,
    topology: Arc<InMemoryJobTopology>,
    readiness: Arc<NodeReadinessCache>,
    uce: Arc<InMemoryUceTracker>,
}

fn harness() -> Harness {
    let topology = Arc::new(InMemoryJobTopology::new());
    let readiness = Arc::new(NodeReadinessCache::new());
    let uce = Arc::new(InMemoryUceTracker::new(60_000));
    let settings = EngineSettings {
        notify_queue_depth: 16,
        ..Default::default()
    };
    let (center, worker) = FaultProcessCenter::new(
        &settings,
        Collaborators {
            topology: topology.clone(),
            readiness: readiness.clone(),
            uce: uce.clone(),
            publisher: Arc::new(InMemorySubscriptionRegistry::new()),
            health: Arc::new(NodeHealthLedger::new()),
        },
    );
    Harness {
        center,
        _worker: worker,
        topology,
        readiness,
        uce,
    }
}

/// Server holding devices `first..first+count` with card ranks offset by `rank_base`
fn server(node: &str, first: u32, count: u32, rank_base: u32) -> ServerHccl {
    ServerHccl {
        server_name: node.to_string(),
        device_list: (first..first + count)
            .map(|id| DeviceHccl {
                device_id: id.to_string(),
                device_ip: format!("192.168.1.{}", id),
                rank_id: (rank_base + id - first).to_string(),
            })
            .collect(),
    }
}

fn pods(n: i32) -> Vec<SimplePodInfo> {
    (0..n)
        .map(|rank| SimplePodInfo {
            pod_uid: format!("pod-uid-{}", rank),
            pod_rank: rank,
        })
        .collect()
}

fn job(servers: Vec<ServerHccl>, pod_count: i32, per_pod: i32) -> JobTopologyEntry {
    JobTopologyEntry {
        servers: servers
            .into_iter()
            .map(|s| (s.server_name.clone(), s))
            .collect::<BTreeMap<_, _>>(),
        pods: pods(pod_count),
        device_num_of_pod: per_pod,
        pod_strategies: HashMap::new(),
    }
}

fn device_record(node: &str, faults: &[(&str, &str, FaultLevel)]) -> DeviceInfo {
    let mut info = DeviceInfo {
        cm_name: format!("mindx-dl-deviceinfo-{}", node),
        device_type: "Ascend910".to_string(),
        ..Default::default()
    };
    for (npu, code, level) in faults {
        info.card_unhealthy.push(npu.to_string());
        info.add_fault(DeviceFault {
            npu_name: npu.to_string(),
            fault_code: code.to_string(),
            fault_level: level.clone(),
            ..Default::default()
        });
    }
    info
}

#[tokio::test]
async fn test_card_rank_resolves_to_pod_rank() {
    let h = harness();
    // Node 3 of a 4-node job: card ranks 16..24 live in pod 2
    h.topology
        .upsert_job("job-a", job(vec![server("node-3", 0, 8, 16)], 4, 8));
    h.readiness.set_ready("node-3", true);
    h.center
        .inform_add(
            None,
            device_record("node-3", &[("Ascend910-7", "8C1F8609", FaultLevel::RestartNPU)]),
        )
        .await
        .unwrap();
    h.center.process_category(FaultCategory::All);

    let infos = h.center.get_job_fault_rank_infos();
    let info = &infos["job-a"];
    assert_eq!(info.fault_list.len(), 1);
    let rank = &info.fault_list[0];
    assert_eq!(rank.rank_id, "23");
    assert_eq!(rank.pod_rank, "2");
    assert_eq!(rank.pod_uid, "pod-uid-2");
    assert_eq!(rank.fault_code, "8C1F8609");
    assert!(!rank.do_step_retry);
    assert_eq!(info.healthy_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_not_ready_node_separates_every_rank() {
    let h = harness();
    h.topology
        .upsert_job("job-3", job(vec![server("node-x", 0, 4, 0)], 1, 4));
    // Never marked ready, so the readiness cache reports it not ready

    h.center.process_category(FaultCategory::All);

    let infos = h.center.get_job_fault_rank_infos();
    let info = &infos["job-3"];
    assert_eq!(info.fault_list.len(), 4);
    for rank in &info.fault_list {
        assert_eq!(rank.fault_level, FaultLevel::SeparateNPU);
        assert!(rank.fault_code.is_empty());
        assert_eq!(rank.pod_uid, "pod-uid-0");
    }
    let mut ids: Vec<_> = info.fault_list.iter().map(|r| r.rank_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["0", "1", "2", "3"]);
    assert_eq!(info.healthy_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_unhealthy_node_record_separates_ready_node() {
    let h = harness();
    h.topology
        .upsert_job("job-b", job(vec![server("node-1", 0, 2, 0)], 1, 2));
    h.readiness.set_ready("node-1", true);
    h.center
        .inform_add(
            None,
            NodeInfo {
                cm_name: "mindx-dl-nodeinfo-node-1".to_string(),
                node_status: HealthState::Unhealthy,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.center.process_category(FaultCategory::All);

    let all = h.center.get_job_fault_rank_infos();
    let info = &all["job-b"];
    assert_eq!(info.fault_list.len(), 2);
    assert!(
        info.fault_list
            .iter()
            .all(|r| r.fault_level == FaultLevel::SeparateNPU)
    );
    assert_eq!(info.healthy_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_unfamiliar_node_status_separates_node() {
    let h = harness();
    h.topology
        .upsert_job("job-o", job(vec![server("node-1", 0, 2, 0)], 1, 2));
    h.readiness.set_ready("node-1", true);
    h.center
        .inform_add(
            None,
            NodeInfo {
                cm_name: "mindx-dl-nodeinfo-node-1".to_string(),
                node_status: HealthState::Other("PreSeparate".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.center.process_category(FaultCategory::All);

    let all = h.center.get_job_fault_rank_infos();
    let info = &all["job-o"];
    assert_eq!(info.fault_list.len(), 2);
    assert_eq!(info.healthy_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_sub_health_sources_degrade_job() {
    let h = harness();
    h.topology
        .upsert_job("job-s", job(vec![server("node-1", 0, 2, 0)], 1, 2));
    h.readiness.set_ready("node-1", true);
    h.center
        .inform_add(
            None,
            device_record("node-1", &[("Ascend910-1", "81078603", FaultLevel::SubHealthFault)]),
        )
        .await
        .unwrap();
    h.center.process_category(FaultCategory::All);
    assert_eq!(
        h.center.get_job_fault_rank_infos()["job-s"].healthy_state,
        HealthState::SubHealthy
    );

    // A sub-healthy node status alone is enough too
    h.center
        .inform_del(&device_record("node-1", &[]))
        .await
        .unwrap();
    h.center
        .inform_add(
            None,
            NodeInfo {
                cm_name: "mindx-dl-nodeinfo-node-1".to_string(),
                node_status: HealthState::SubHealthy,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.center.process_category(FaultCategory::All);
    let all = h.center.get_job_fault_rank_infos();
    let info = &all["job-s"];
    assert!(info.fault_list.is_empty());
    assert_eq!(info.healthy_state, HealthState::SubHealthy);
}

#[tokio::test]
async fn test_separate_pod_strategy_makes_job_unhealthy() {
    let h = harness();
    let mut entry = job(vec![server("node-1", 0, 1, 0)], 1, 1);
    entry
        .pod_strategies
        .insert("job-p-worker-0".to_string(), "Separate".to_string());
    h.topology.upsert_job("job-p", entry);
    h.readiness.set_ready("node-1", true);

    h.center.process_category(FaultCategory::All);
    let all = h.center.get_job_fault_rank_infos();
    let info = &all["job-p"];
    assert!(info.fault_list.is_empty());
    assert_eq!(info.healthy_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_filter_level_query_drops_matching_ranks() {
    let h = harness();
    h.topology
        .upsert_job("job-f", job(vec![server("node-1", 0, 2, 0)], 1, 2));
    h.readiness.set_ready("node-1", true);
    h.center
        .inform_add(
            None,
            device_record(
                "node-1",
                &[
                    ("Ascend910-0", "A0", FaultLevel::NotHandleFault),
                    ("Ascend910-1", "B1", FaultLevel::RestartNPU),
                ],
            ),
        )
        .await
        .unwrap();
    h.center.process_category(FaultCategory::All);

    let filtered = h
        .center
        .get_job_fault_rank_infos_filter_level(&FaultLevel::NotHandleFault);
    let ranks = &filtered["job-f"].fault_list;
    assert_eq!(ranks.len(), 1);
    assert_eq!(ranks[0].fault_code, "B1");
    assert_eq!(h.center.get_job_fault_rank_infos()["job-f"].fault_list.len(), 2);
}

#[tokio::test]
async fn test_business_plane_uce_adds_step_retry_rank() {
    let h = harness();
    h.topology
        .upsert_job("job-u", job(vec![server("node-1", 0, 2, 0)], 1, 2));
    h.readiness.set_ready("node-1", true);
    let now = chrono::Utc::now().timestamp_millis();
    h.uce.record(
        "job-u",
        "node-1",
        UceDevice {
            device_name: "Ascend910-1".to_string(),
            fault_time: now - 3_000,
            recover_time: now - 1_000,
            complete_time: 0,
        },
    );
    // The node has a device record but nothing reported on the device
    h.center
        .inform_add(None, device_record("node-1", &[]))
        .await
        .unwrap();
    h.center.process_category(FaultCategory::All);

    let all = h.center.get_job_fault_rank_infos();
    let info = &all["job-u"];
    assert_eq!(info.fault_list.len(), 1);
    let rank = &info.fault_list[0];
    assert_eq!(rank.rank_id, "1");
    assert_eq!(rank.fault_code, UCE_FAULT_CODE);
    assert_eq!(rank.fault_level, FaultLevel::RestartBusiness);
    assert!(rank.do_step_retry);
}

#[tokio::test]
async fn test_job_info_rebuilt_from_current_topology() {
    let h = harness();
    h.topology
        .upsert_job("job-old", job(vec![server("node-1", 0, 1, 0)], 1, 1));
    h.readiness.set_ready("node-1", true);
    h.center.process_category(FaultCategory::All);
    let infos = h.center.get_job_fault_rank_infos();
    assert_eq!(infos["job-old"].healthy_state, HealthState::Healthy);

    h.topology.remove_job("job-old");
    h.center.process_category(FaultCategory::Node);
    assert!(h.center.get_job_fault_rank_infos().is_empty());
}

//! Ingestion tests
//!
//! Canonical store behaviour seen through the process center: change
//! detection, capacity guards, deletes and subscriber fanout.

use std::sync::Arc;

use faultcenter::center::{Collaborators, EngineSettings, FaultCategory, FaultProcessCenter};
use faultcenter::external::{
    InMemoryJobTopology, InMemorySubscriptionRegistry, NoUceTracker, NodeHealthLedger,
    NodeReadinessCache,
};
use faultcenter::models::{DeviceFault, DeviceInfo, FaultLevel, HealthState, NodeInfo, SwitchInfo};
use faultcenter::FaultError;
use tokio::sync::mpsc;

fn engine(
    settings: EngineSettings,
) -> (Arc<FaultProcessCenter>, faultcenter::ProcessWorker, Arc<NodeHealthLedger>) {
    let health = Arc::new(NodeHealthLedger::new());
    // Room for every trigger a test queues; the worker is never run here
    let settings = EngineSettings {
        notify_queue_depth: 16,
        ..settings
    };
    let (center, worker) = FaultProcessCenter::new(
        &settings,
        Collaborators {
            topology: Arc::new(InMemoryJobTopology::new()),
            readiness: Arc::new(NodeReadinessCache::new()),
            uce: Arc::new(NoUceTracker),
            publisher: Arc::new(InMemorySubscriptionRegistry::new()),
            health: health.clone(),
        },
    );
    (center, worker, health)
}

fn node(name: &str, status: HealthState, update_time: i64) -> NodeInfo {
    NodeInfo {
        cm_name: format!("mindx-dl-nodeinfo-{}", name),
        node_status: status,
        fault_dev_list: Vec::new(),
        update_time,
    }
}

fn device(name: &str, faults: &[(&str, &str)]) -> DeviceInfo {
    let mut info = DeviceInfo {
        cm_name: format!("mindx-dl-deviceinfo-{}", name),
        device_type: "Ascend910".to_string(),
        ..Default::default()
    };
    for (npu, code) in faults {
        info.card_unhealthy.push(npu.to_string());
        info.add_fault(DeviceFault {
            npu_name: npu.to_string(),
            fault_code: code.to_string(),
            fault_level: FaultLevel::RestartNPU,
            ..Default::default()
        });
    }
    info
}

#[tokio::test]
async fn test_repeated_record_is_not_a_change() {
    let (center, _worker, _) = engine(EngineSettings::default());
    let first = device("node1", &[("Ascend910-0", "8C1F8609")]);
    assert!(center.inform_add(None, first.clone()).await.unwrap());

    let mut again = first.clone();
    again.update_time = 99;
    assert!(!center.inform_add(None, again).await.unwrap());
    assert_eq!(center.manager().new_message_total(), 1);

    let changed = device("node1", &[("Ascend910-0", "8C1F8609"), ("Ascend910-1", "8C1F8609")]);
    assert!(center.inform_add(None, changed).await.unwrap());
    assert_eq!(center.manager().new_message_total(), 2);
}

#[tokio::test]
async fn test_node_change_detection_uses_status_and_list_size() {
    let (center, _worker, health) = engine(EngineSettings::default());
    assert!(center.inform_add(None, node("n1", HealthState::Healthy, 1)).await.unwrap());
    assert!(!center.inform_add(None, node("n1", HealthState::Healthy, 2)).await.unwrap());
    assert!(center.inform_add(None, node("n1", HealthState::SubHealthy, 3)).await.unwrap());
    assert_eq!(health.node_status("n1"), Some(HealthState::SubHealthy));
}

#[tokio::test]
async fn test_informer_old_record_used_as_baseline() {
    let (center, _worker, _) = engine(EngineSettings::default());
    let old = node("n2", HealthState::Unhealthy, 1);
    // Nothing stored yet, so the informer's previous object decides
    assert!(!center
        .inform_add(Some(&old), node("n2", HealthState::Unhealthy, 2))
        .await
        .unwrap());
    assert_eq!(center.node_center().canonical().len(), 1);
}

#[tokio::test]
async fn test_delete_then_process_removes_record() {
    let (center, _worker, _) = engine(EngineSettings::default());
    let record = node("n1", HealthState::Unhealthy, 1);
    center.inform_add(None, record.clone()).await.unwrap();
    center.process_category(FaultCategory::Node);
    assert_eq!(center.query_node_info_to_report().len(), 1);

    assert!(center.inform_del(&record).await.unwrap());
    assert!(!center.inform_del(&record).await.unwrap());
    center.process_category(FaultCategory::Node);
    assert!(center.query_node_info_to_report().is_empty());
}

#[tokio::test]
async fn test_store_refuses_nodes_past_capacity() {
    let settings = EngineSettings {
        max_support_node_num: 2,
        ..Default::default()
    };
    let (center, _worker, _) = engine(settings);
    let switch = |n: &str| SwitchInfo {
        cm_name: format!("mindx-dl-switchinfo-{}", n),
        fault_level: FaultLevel::NotHandleFault,
        ..Default::default()
    };
    // Ingest synchronously so the one-slot notify queue never blocks
    assert!(center.switch_center().informer_add_callback(None, switch("a")));
    assert!(center.switch_center().informer_add_callback(None, switch("b")));
    assert!(!center.switch_center().informer_add_callback(None, switch("c")));
    assert_eq!(center.switch_center().canonical().len(), 2);

    // Existing keys still update
    let mut update = switch("a");
    update.node_status = HealthState::Unhealthy;
    assert!(center.switch_center().informer_add_callback(None, update));
}

#[tokio::test]
async fn test_subscriber_limit_and_dropped_signals() {
    let settings = EngineSettings {
        max_subscribers: 1,
        ..Default::default()
    };
    let (center, _worker, _) = engine(settings);
    let (tx, mut rx) = mpsc::channel(1);
    center.register_subscriber(tx, FaultCategory::Device).unwrap();

    let (extra, _extra_rx) = mpsc::channel(1);
    let err = center
        .register_subscriber(extra, FaultCategory::Device)
        .unwrap_err();
    assert!(matches!(
        err,
        FaultError::SubscriberLimit {
            category: FaultCategory::Device,
            limit: 1
        }
    ));

    center.process_category(FaultCategory::Device);
    center.process_category(FaultCategory::Device);
    assert_eq!(center.dropped_notifications(), 1);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_closed_subscriber_is_pruned() {
    let (center, _worker, _) = engine(EngineSettings::default());
    let (tx, rx) = mpsc::channel(1);
    center.register_subscriber(tx, FaultCategory::Node).unwrap();
    drop(rx);
    center.process_category(FaultCategory::Node);
    assert_eq!(center.node_center().subscriber_count(), 0);
    assert_eq!(center.dropped_notifications(), 0);
}

#[tokio::test]
async fn test_queries_return_independent_copies() {
    let (center, _worker, _) = engine(EngineSettings::default());
    center
        .inform_add(None, device("node1", &[("Ascend910-0", "A")]))
        .await
        .unwrap();
    center.process_category(FaultCategory::Device);

    let mut copy = center.query_device_info_to_report();
    copy.clear();
    assert_eq!(center.query_device_info_to_report().len(), 1);
}

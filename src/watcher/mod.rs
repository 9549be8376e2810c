//! Watcher module
//!
//! Bridges kube-rs watch streams into the fault engine. `ConfigMapWatcher`
//! feeds fault configmaps to the category centers and `NodeWatcher` keeps
//! the node readiness cache current.

mod codec;
mod registry;

pub use codec::*;
pub use registry::*;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Node};
use kube::runtime::watcher;
use kube::{Api, Client, ResourceExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::center::FaultProcessCenter;
use crate::error::FaultResult;
use crate::external::NodeReadinessCache;

const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Ingest an added or updated configmap
///
/// Returns whether the owning center saw a business change. Configmaps that
/// are not fault configmaps are ignored.
pub async fn apply_configmap(center: &FaultProcessCenter, cm: &ConfigMap) -> FaultResult<bool> {
    if !is_fault_configmap(&cm.name_any()) {
        return Ok(false);
    }
    match decode_configmap(cm)? {
        DecodedRecord::Device(info) => center.inform_add(None, info).await,
        DecodedRecord::Node(info) => center.inform_add(None, info).await,
        DecodedRecord::Switch(info) => center.inform_add(None, info).await,
    }
}

/// Drop the record of a deleted configmap
pub async fn delete_configmap(center: &FaultProcessCenter, cm: &ConfigMap) -> FaultResult<bool> {
    let name = cm.name_any();
    if !is_fault_configmap(&name) {
        return Ok(false);
    }
    match tombstone(&name)? {
        DecodedRecord::Device(info) => center.inform_del(&info).await,
        DecodedRecord::Node(info) => center.inform_del(&info).await,
        DecodedRecord::Switch(info) => center.inform_del(&info).await,
    }
}

/// Whether a node reports `Ready=True`
pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .is_some_and(|ready| ready.status == "True")
}

/// Retry delay after a watch error, logging the first and every tenth one
fn backoff_after_error(kind: &str, error_count: u32, err: &watcher::Error) -> Duration {
    if error_count == 1 || error_count % 10 == 0 {
        tracing::warn!("{} watcher error ({}): {}", kind, error_count, err);
    }
    if error_count == MAX_CONSECUTIVE_ERRORS {
        tracing::error!(
            "{} watcher failed {} times in a row, backing off",
            kind,
            error_count
        );
    }
    Duration::from_secs(u64::from(error_count.min(MAX_CONSECUTIVE_ERRORS)))
}

/// Watches fault configmaps in one namespace
pub struct ConfigMapWatcher {
    client: Client,
    namespace: String,
    center: Arc<FaultProcessCenter>,
}

impl ConfigMapWatcher {
    pub fn new(client: Client, namespace: impl Into<String>, center: Arc<FaultProcessCenter>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            center,
        }
    }

    /// Spawn the watch loop; it runs until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let mut w = Box::pin(watcher(api, watcher::Config::default()));
        let mut error_count = 0u32;
        tracing::info!("Watching fault configmaps in namespace {}", self.namespace);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = w.next() => event,
            };
            let Some(event) = event else {
                break;
            };
            let outcome = match event {
                // Existing configmaps replay as InitApply when the watch starts
                Ok(watcher::Event::InitApply(cm)) | Ok(watcher::Event::Apply(cm)) => {
                    error_count = 0;
                    apply_configmap(&self.center, &cm).await.map(|_| ())
                }
                Ok(watcher::Event::Delete(cm)) => {
                    error_count = 0;
                    delete_configmap(&self.center, &cm).await.map(|_| ())
                }
                Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => {
                    error_count = 0;
                    Ok(())
                }
                Err(e) => {
                    error_count += 1;
                    let delay = backoff_after_error("ConfigMap", error_count, &e);
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                tracing::error!("Skipping configmap event: {}", e);
            }
        }
        tracing::info!("Configmap watcher stopped");
    }
}

/// Watches cluster nodes and records their readiness
pub struct NodeWatcher {
    client: Client,
    readiness: Arc<NodeReadinessCache>,
}

impl NodeWatcher {
    pub fn new(client: Client, readiness: Arc<NodeReadinessCache>) -> Self {
        Self { client, readiness }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let api: Api<Node> = Api::all(self.client.clone());
        let mut w = Box::pin(watcher(api, watcher::Config::default()));
        let mut error_count = 0u32;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = w.next() => event,
            };
            let Some(event) = event else {
                break;
            };
            match event {
                Ok(watcher::Event::InitApply(node)) | Ok(watcher::Event::Apply(node)) => {
                    error_count = 0;
                    let ready = node_is_ready(&node);
                    tracing::debug!("Node {} ready: {}", node.name_any(), ready);
                    self.readiness.set_ready(node.name_any(), ready);
                }
                Ok(watcher::Event::Delete(node)) => {
                    error_count = 0;
                    self.readiness.remove(&node.name_any());
                }
                Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => {
                    error_count = 0;
                }
                Err(e) => {
                    error_count += 1;
                    let delay = backoff_after_error("Node", error_count, &e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
        tracing::info!("Node watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};

    fn node(conditions: Option<Vec<(&str, &str)>>) -> Node {
        Node {
            status: Some(NodeStatus {
                conditions: conditions.map(|cs| {
                    cs.into_iter()
                        .map(|(t, s)| NodeCondition {
                            type_: t.to_string(),
                            status: s.to_string(),
                            ..Default::default()
                        })
                        .collect()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_node_ready_condition() {
        assert!(node_is_ready(&node(Some(vec![
            ("MemoryPressure", "False"),
            ("Ready", "True")
        ]))));
        assert!(!node_is_ready(&node(Some(vec![("Ready", "Unknown")]))));
        assert!(!node_is_ready(&node(None)));
        assert!(!node_is_ready(&Node::default()));
    }
}

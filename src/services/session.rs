//! Headless fault session for library consumers
//!
//! `FaultSession` wraps a Kubernetes client, the fault process center, its
//! worker and the configmap/node watchers behind one start/shutdown API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::center::{Collaborators, FaultProcessCenter};
use crate::config::schema::Config;
use crate::external::{
    FaultPublisher, InMemoryJobTopology, InMemorySubscriptionRegistry, InMemoryUceTracker,
    JobHealthSink, JobTopology, NodeHealthLedger, NodeReadiness, NodeReadinessCache, UceTracker,
};
use crate::watcher::{ConfigMapWatcher, NodeWatcher};

/// Collaborators a session needs from its embedder
///
/// Node readiness is not among them: the session keeps its own cache fed by
/// the node watcher.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub topology: Arc<dyn JobTopology>,
    pub uce: Arc<dyn UceTracker>,
    pub publisher: Arc<dyn FaultPublisher>,
    pub health: Arc<dyn JobHealthSink>,
}

impl SessionCollaborators {
    /// In-process collaborators for running the engine on its own
    pub fn standalone(config: &Config) -> Self {
        let window_ms = (config.suppression.self_recover_timeout_secs as i64).saturating_mul(1000);
        Self {
            topology: Arc::new(InMemoryJobTopology::new()),
            uce: Arc::new(InMemoryUceTracker::new(window_ms)),
            publisher: Arc::new(InMemorySubscriptionRegistry::new()),
            health: Arc::new(NodeHealthLedger::new()),
        }
    }
}

/// A running fault engine connected to one cluster
///
/// # Example
///
/// ```rust,no_run
/// use faultcenter::config::schema::Config;
/// use faultcenter::services::{FaultSession, SessionCollaborators};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// let session =
///     FaultSession::connect(&config, SessionCollaborators::standalone(&config)).await?;
///
/// for (job, info) in session.center().get_job_fault_rank_infos() {
///     println!("{}: {} ({} faults)", job, info.healthy_state, info.fault_list.len());
/// }
///
/// session.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct FaultSession {
    client: kube::Client,
    namespace: String,
    center: Arc<FaultProcessCenter>,
    readiness: Arc<NodeReadinessCache>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl FaultSession {
    /// Connect using the default kubeconfig and start processing
    pub async fn connect(config: &Config, deps: SessionCollaborators) -> Result<Self> {
        let client = crate::kube::create_client()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::start(client, config, deps))
    }

    /// Spawn the worker and watchers on the current runtime
    pub fn start(client: kube::Client, config: &Config, deps: SessionCollaborators) -> Self {
        let readiness = Arc::new(NodeReadinessCache::new());
        let (center, worker) = FaultProcessCenter::new(
            &config.to_engine_settings(),
            Collaborators {
                topology: deps.topology,
                readiness: Arc::clone(&readiness) as Arc<dyn NodeReadiness>,
                uce: deps.uce,
                publisher: deps.publisher,
                health: deps.health,
            },
        );

        let cancel = CancellationToken::new();
        let handles = vec![
            tokio::spawn(worker.run(cancel.child_token())),
            NodeWatcher::new(client.clone(), Arc::clone(&readiness)).spawn(cancel.child_token()),
            ConfigMapWatcher::new(client.clone(), config.namespace.clone(), Arc::clone(&center))
                .spawn(cancel.child_token()),
        ];

        Self {
            client,
            namespace: config.namespace.clone(),
            center,
            readiness,
            cancel,
            handles,
        }
    }

    /// Returns a reference to the underlying Kubernetes client.
    pub fn client(&self) -> &kube::Client {
        &self.client
    }

    /// Namespace the configmap watcher observes
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn center(&self) -> &Arc<FaultProcessCenter> {
        &self.center
    }

    pub fn readiness(&self) -> &Arc<NodeReadinessCache> {
        &self.readiness
    }

    /// Token that stops the session when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the worker and watchers and wait for them to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!("Session task ended abnormally: {}", e);
            }
        }
        tracing::info!("Fault session stopped");
    }
}

//! Fault process orchestrator
//!
//! A single worker drains the notify queue and a fixed ticker, so processing
//! passes are serialized. Readers query the centers concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{ContentProcessor, EngineSettings, FaultCategory, FaultCenter};
use crate::error::{FaultError, FaultResult};
use crate::external::{FaultPublisher, JobHealthSink, JobTopology, NodeReadiness, UceTracker};
use crate::filter::{SuppressionCache, SuppressionFilter, SuppressionKind};
use crate::models::{DeviceInfo, FaultLevel, JobFaultInfo, NodeInfo, SwitchInfo};
use crate::rank::JobFaultRankProcessor;
use crate::store::{ConfigMapManager, FaultRecord};

/// External services the engine consumes
#[derive(Clone)]
pub struct Collaborators {
    pub topology: Arc<dyn JobTopology>,
    pub readiness: Arc<dyn NodeReadiness>,
    pub uce: Arc<dyn UceTracker>,
    pub publisher: Arc<dyn FaultPublisher>,
    pub health: Arc<dyn JobHealthSink>,
}

/// Owner of the three category centers and the job rank processor
pub struct FaultProcessCenter {
    manager: Arc<ConfigMapManager>,
    device_center: FaultCenter<DeviceInfo>,
    node_center: FaultCenter<NodeInfo>,
    switch_center: FaultCenter<SwitchInfo>,
    rank_processor: JobFaultRankProcessor,
    custom_cache: Arc<SuppressionCache>,
    l2_cache: Arc<SuppressionCache>,
    notify_tx: mpsc::Sender<FaultCategory>,
    process_period: Duration,
}

/// Worker half returned by [`FaultProcessCenter::new`]
pub struct ProcessWorker {
    center: Arc<FaultProcessCenter>,
    notify_rx: mpsc::Receiver<FaultCategory>,
    process_period: Duration,
}

impl FaultProcessCenter {
    /// Build the engine; the worker must be spawned for processing to happen
    pub fn new(settings: &EngineSettings, deps: Collaborators) -> (Arc<Self>, ProcessWorker) {
        let manager = Arc::new(ConfigMapManager::new(
            settings.max_support_node_num,
            Arc::clone(&deps.health),
        ));
        let timeout_ms = settings.self_recover_timeout.as_millis() as i64;
        let custom_cache = Arc::new(SuppressionCache::new());
        let l2_cache = Arc::new(SuppressionCache::new());

        let mut chain: Vec<Arc<dyn ContentProcessor>> = Vec::new();
        if settings.custom_filter_enabled {
            chain.push(Arc::new(SuppressionFilter::new(
                SuppressionKind::Custom,
                Arc::clone(&deps.topology),
                Arc::clone(&deps.publisher),
                Arc::clone(&custom_cache),
                timeout_ms,
            )));
        }
        if settings.l2_filter_enabled {
            chain.push(Arc::new(SuppressionFilter::new(
                SuppressionKind::L2,
                Arc::clone(&deps.topology),
                Arc::clone(&deps.publisher),
                Arc::clone(&l2_cache),
                timeout_ms,
            )));
        }

        let (notify_tx, notify_rx) = mpsc::channel(settings.notify_queue_depth.max(1));
        let center = Arc::new(Self {
            device_center: FaultCenter::new(
                Arc::clone(&manager),
                chain.clone(),
                settings.max_subscribers,
                settings.min_process_interval,
            ),
            node_center: FaultCenter::new(
                Arc::clone(&manager),
                Vec::new(),
                settings.max_subscribers,
                settings.min_process_interval,
            ),
            switch_center: FaultCenter::new(
                Arc::clone(&manager),
                chain,
                settings.max_subscribers,
                settings.min_process_interval,
            ),
            manager,
            rank_processor: JobFaultRankProcessor::new(deps.topology, deps.readiness, deps.uce),
            custom_cache,
            l2_cache,
            notify_tx,
            process_period: settings.process_period,
        });

        let worker = ProcessWorker {
            center: Arc::clone(&center),
            notify_rx,
            process_period: settings.process_period,
        };
        (center, worker)
    }

    pub fn manager(&self) -> &Arc<ConfigMapManager> {
        &self.manager
    }

    pub fn device_center(&self) -> &FaultCenter<DeviceInfo> {
        &self.device_center
    }

    pub fn node_center(&self) -> &FaultCenter<NodeInfo> {
        &self.node_center
    }

    pub fn switch_center(&self) -> &FaultCenter<SwitchInfo> {
        &self.switch_center
    }

    pub fn custom_fault_cache(&self) -> &Arc<SuppressionCache> {
        &self.custom_cache
    }

    pub fn l2_fault_cache(&self) -> &Arc<SuppressionCache> {
        &self.l2_cache
    }

    /// Queue a processing pass for `category`
    ///
    /// Waits while the queue is full, so a busy worker slows callers down.
    pub async fn notify_fault_center_process(&self, category: FaultCategory) -> FaultResult<()> {
        self.notify_tx
            .send(category)
            .await
            .map_err(|_| FaultError::NotifyClosed)
    }

    /// Register a change signal for the centers matching `category`
    pub fn register_subscriber(
        &self,
        tx: mpsc::Sender<()>,
        category: FaultCategory,
    ) -> FaultResult<()> {
        if category.covers(FaultCategory::Device) {
            self.device_center.register(tx.clone())?;
        }
        if category.covers(FaultCategory::Node) {
            self.node_center.register(tx.clone())?;
        }
        if category.covers(FaultCategory::Switch) {
            self.switch_center.register(tx)?;
        }
        Ok(())
    }

    /// Ingest an added or updated record and queue a pass when it changed
    pub async fn inform_add<T: FaultRecord>(&self, old: Option<&T>, new: T) -> FaultResult<bool> {
        let changed = T::center(self).informer_add_callback(old, new);
        if changed {
            self.notify_fault_center_process(T::CATEGORY).await?;
        }
        Ok(changed)
    }

    /// Ingest a deleted record and queue a pass when one was stored
    pub async fn inform_del<T: FaultRecord>(&self, deleted: &T) -> FaultResult<bool> {
        let found = T::center(self).informer_del_callback(deleted);
        if found {
            self.notify_fault_center_process(T::CATEGORY).await?;
        }
        Ok(found)
    }

    /// Run the centers for `category`, then rebuild job fault ranks
    ///
    /// Only the worker calls this, which keeps passes from overlapping.
    pub fn process_category(&self, category: FaultCategory) {
        let started = Instant::now();
        if category.covers(FaultCategory::Device) {
            self.device_center.process();
        }
        if category.covers(FaultCategory::Node) {
            self.node_center.process();
        }
        if category.covers(FaultCategory::Switch) {
            self.switch_center.process();
        }
        self.rank_processor.process(
            &self.device_center.processed_snapshot(),
            &self.node_center.processed_snapshot(),
            &self.switch_center.processed_snapshot(),
        );

        let elapsed = started.elapsed();
        if elapsed > self.process_period {
            tracing::warn!(
                "Fault process pass for {} took {:?}, longer than the {:?} period",
                category,
                elapsed,
                self.process_period
            );
        } else {
            tracing::trace!("Fault process pass for {} took {:?}", category, elapsed);
        }
    }

    pub fn query_device_info_to_report(&self) -> HashMap<String, DeviceInfo> {
        self.device_center.query_info_to_report()
    }

    pub fn query_node_info_to_report(&self) -> HashMap<String, NodeInfo> {
        self.node_center.query_info_to_report()
    }

    pub fn query_switch_info_to_report(&self) -> HashMap<String, SwitchInfo> {
        self.switch_center.query_info_to_report()
    }

    pub fn get_job_fault_rank_infos(&self) -> HashMap<String, JobFaultInfo> {
        self.rank_processor.get_job_fault_rank_infos()
    }

    pub fn get_job_fault_rank_infos_filter_level(
        &self,
        fault_level: &FaultLevel,
    ) -> HashMap<String, JobFaultInfo> {
        self.rank_processor
            .get_job_fault_rank_infos_filter_level(fault_level)
    }

    /// Notifications dropped across all centers
    pub fn dropped_notifications(&self) -> u64 {
        self.device_center.dropped_notifications()
            + self.node_center.dropped_notifications()
            + self.switch_center.dropped_notifications()
    }
}

impl ProcessWorker {
    /// Drive the ticker and the notify queue until cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.process_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "Fault process center started, period {:?}",
            self.process_period
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Fault process center stopped");
                    break;
                }
                Some(category) = self.notify_rx.recv() => {
                    tracing::debug!("Processing {} faults on notify", category);
                    self.center.process_category(category);
                }
                _ = ticker.tick() => {
                    self.center.process_category(FaultCategory::All);
                }
            }
        }
    }
}

//! Category center
//!
//! Ingestion callbacks write the canonical store; `process` runs the
//! processor chain over a copy and publishes the result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use super::{ContentProcessor, FaultCategory};
use crate::error::{FaultError, FaultResult};
use crate::store::{ConfigMapManager, FaultRecord};

/// Best-effort change notification fanout
///
/// Pushes never block. A full channel drops the signal and bumps the counter,
/// a closed one is removed.
pub struct SubscriberSet {
    category: FaultCategory,
    limit: usize,
    senders: Mutex<Vec<mpsc::Sender<()>>>,
    dropped: AtomicU64,
}

impl SubscriberSet {
    pub fn new(category: FaultCategory, limit: usize) -> Self {
        Self {
            category,
            limit,
            senders: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn register(&self, tx: mpsc::Sender<()>) -> FaultResult<()> {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|s| !s.is_closed());
        if senders.len() >= self.limit {
            return Err(FaultError::SubscriberLimit {
                category: self.category,
                limit: self.limit,
            });
        }
        senders.push(tx);
        Ok(())
    }

    pub fn notify(&self) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| match tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Closed(())) => {
                tracing::debug!("Pruning closed {} subscriber", self.category);
                false
            }
        });
    }

    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Center for one fault category
pub struct FaultCenter<T: FaultRecord> {
    manager: Arc<ConfigMapManager>,
    processors: Vec<Arc<dyn ContentProcessor>>,
    processed: RwLock<Arc<HashMap<String, T>>>,
    subscribers: SubscriberSet,
    min_interval: Duration,
    last_process: Mutex<Option<Instant>>,
}

impl<T: FaultRecord> FaultCenter<T> {
    pub fn new(
        manager: Arc<ConfigMapManager>,
        processors: Vec<Arc<dyn ContentProcessor>>,
        max_subscribers: usize,
        min_interval: Duration,
    ) -> Self {
        Self {
            manager,
            processors,
            processed: RwLock::new(Arc::new(HashMap::new())),
            subscribers: SubscriberSet::new(T::CATEGORY, max_subscribers),
            min_interval,
            last_process: Mutex::new(None),
        }
    }

    pub fn category(&self) -> FaultCategory {
        T::CATEGORY
    }

    /// Ingest an added or updated record
    ///
    /// Returns whether business data changed.
    pub fn informer_add_callback(&self, old: Option<&T>, new: T) -> bool {
        self.manager.save_record(old, new)
    }

    /// Ingest a deleted record
    ///
    /// Returns whether a record was stored for it.
    pub fn informer_del_callback(&self, deleted: &T) -> bool {
        self.manager.delete_record(deleted)
    }

    /// Run the processor chain over the canonical map and notify subscribers
    ///
    /// Returns false when skipped by the minimum interval.
    pub fn process(&self) -> bool {
        if !self.claim_process_slot() {
            tracing::debug!("Skipping {} process, called too often", T::CATEGORY);
            return false;
        }

        let canonical = T::store(&self.manager).all();
        let mut content = T::into_content(canonical.clone());
        for processor in &self.processors {
            content = processor.process(content);
        }
        let processed = match T::from_content(content) {
            Ok(records) => records,
            Err(other) => {
                tracing::error!(
                    "{} chain returned {} content, keeping unprocessed records",
                    T::CATEGORY,
                    other.category()
                );
                canonical
            }
        };

        let mut guard = self.processed.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(processed);
        drop(guard);

        self.subscribers.notify();
        true
    }

    fn claim_process_slot(&self) -> bool {
        let mut last = self
            .last_process
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(prev) = *last {
            if !self.min_interval.is_zero() && now.duration_since(prev) < self.min_interval {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    /// Shared view of the last processed map
    pub fn processed_snapshot(&self) -> Arc<HashMap<String, T>> {
        Arc::clone(&self.processed.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Deep copy of the last processed map
    pub fn query_info_to_report(&self) -> HashMap<String, T> {
        self.processed_snapshot().as_ref().clone()
    }

    /// Deep copy of the canonical map, before any processing
    pub fn canonical(&self) -> HashMap<String, T> {
        T::store(&self.manager).all()
    }

    pub fn register(&self, tx: mpsc::Sender<()>) -> FaultResult<()> {
        self.subscribers.register(tx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Notifications dropped because a subscriber had not drained
    pub fn dropped_notifications(&self) -> u64 {
        self.subscribers.dropped()
    }
}

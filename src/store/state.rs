//! Record state management
//!
//! Holds the latest record per configmap for one fault category.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::center::FaultCategory;
use crate::error::{FaultError, FaultResult};

/// Thread-safe record store
///
/// The map lives behind an `Arc` so readers can take a snapshot with a
/// pointer clone and writers never hold the lock across a full iteration.
/// Writes copy-on-write when a snapshot is still alive.
pub struct RecordStore<T> {
    category: FaultCategory,
    capacity: usize,
    inner: RwLock<Arc<HashMap<String, T>>>,
}

impl<T: Clone> RecordStore<T> {
    pub fn new(category: FaultCategory, capacity: usize) -> Self {
        Self {
            category,
            capacity,
            inner: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Add or replace a record, returning the one it replaced
    ///
    /// New keys are refused once the store holds `capacity` records.
    pub fn upsert(&self, key: String, record: T) -> FaultResult<Option<T>> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !state.contains_key(&key) && state.len() >= self.capacity {
            return Err(FaultError::StoreFull {
                category: self.category,
                limit: self.capacity,
                name: key,
            });
        }
        Ok(Arc::make_mut(&mut state).insert(key, record))
    }

    /// Remove a record
    pub fn remove(&self, key: &str) -> Option<T> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !state.contains_key(key) {
            return None;
        }
        Arc::make_mut(&mut state).remove(key)
    }

    /// Get a specific record
    pub fn get(&self, key: &str) -> Option<T> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.get(key).cloned()
    }

    /// Shared view of the current map
    pub fn snapshot(&self) -> Arc<HashMap<String, T>> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Deep copy of all records
    pub fn all(&self) -> HashMap<String, T> {
        self.snapshot().as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn category(&self) -> FaultCategory {
        self.category
    }
}

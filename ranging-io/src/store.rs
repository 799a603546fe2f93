//! Shared distance store
//!
//! Latest snapshot per module, written by the poll thread and read by any
//! number of consumer threads. The lock is held only to swap or clone the
//! `Arc`, never across bus I/O or listener callbacks.

use crate::core::types::{AnchorId, AnchorReading, DistanceSnapshot};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Lock-guarded current snapshot
pub struct DistanceStore {
    state: Mutex<StoreState>,
}

struct StoreState {
    polling_started: bool,
    snapshot: Arc<DistanceSnapshot>,
}

impl DistanceStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                polling_started: false,
                snapshot: Arc::new(DistanceSnapshot::empty()),
            }),
        }
    }

    /// Record that polling has been started at least once
    pub fn mark_polling_started(&self) {
        self.state.lock().polling_started = true;
    }

    pub fn polling_started(&self) -> bool {
        self.state.lock().polling_started
    }

    /// Atomically install a new snapshot, returning the previous one
    pub fn replace(&self, snapshot: Arc<DistanceSnapshot>) -> Arc<DistanceSnapshot> {
        std::mem::replace(&mut self.state.lock().snapshot, snapshot)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<DistanceSnapshot> {
        Arc::clone(&self.state.lock().snapshot)
    }

    /// Latest reading for `id`
    pub fn get_reading(&self, id: AnchorId) -> Result<AnchorReading> {
        let snapshot = {
            let state = self.state.lock();
            if !state.polling_started {
                return Err(Error::NotPolling);
            }
            Arc::clone(&state.snapshot)
        };
        snapshot.get(id).copied().ok_or(Error::UnknownTag(id))
    }

    /// Latest distance for `id` in millimetres
    pub fn get_distance(&self, id: AnchorId) -> Result<u32> {
        self.get_reading(id).map(|r| r.distance_mm)
    }

    /// IDs of the current snapshot in poll order
    pub fn get_tag_ids(&self) -> Vec<AnchorId> {
        self.snapshot().ids()
    }
}

impl Default for DistanceStore {
    fn default() -> Self {
        Self::new()
    }
}

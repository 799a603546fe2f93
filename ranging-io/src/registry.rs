//! Tag registry: diffs successive snapshots into arrivals, departures and updates

use crate::core::types::{AnchorReading, DistanceSnapshot};
use std::sync::Arc;

/// Classification of one poll against the previous one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// In the new poll only (new readings, new poll order)
    pub arrived: Vec<AnchorReading>,
    /// In the previous poll only (last known readings, previous poll order)
    pub departed: Vec<AnchorReading>,
    /// In both polls (new readings, new poll order)
    pub updated: Vec<AnchorReading>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.arrived.is_empty() && self.departed.is_empty() && self.updated.is_empty()
    }
}

/// Previous-snapshot holder owned by the poll thread
pub(crate) struct TagRegistry {
    previous: Arc<DistanceSnapshot>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            previous: Arc::new(DistanceSnapshot::empty()),
        }
    }

    /// Diff `next` against the retained snapshot and retain `next`
    pub fn apply(&mut self, next: Arc<DistanceSnapshot>) -> TagDiff {
        let mut diff = TagDiff::default();

        for reading in next.iter() {
            if self.previous.contains(reading.id) {
                diff.updated.push(*reading);
            } else {
                diff.arrived.push(*reading);
            }
        }
        diff.departed = self
            .previous
            .iter()
            .filter(|r| !next.contains(r.id))
            .copied()
            .collect();

        self.previous = next;
        diff
    }
}

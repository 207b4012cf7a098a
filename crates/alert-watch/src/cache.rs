//! Process-wide cache of the last known region states.

use std::sync::Arc;

use alert_feed::{RegionId, RegionState, Snapshot};
use tokio::sync::RwLock;

use crate::diff::AlertEdge;

/// Outcome of recording one fresh region observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The region had no cached value; it is now seeded.
    Seeded,
    /// The alert flag did not change.
    Unchanged,
    /// The alert flag flipped.
    Edge(AlertEdge),
}

/// Last known snapshot of all regions.
///
/// Created once at process start and shared by handle: every clone refers to
/// the same snapshot. All watches read and write it, so a region reported by
/// one subscriber's watch is not reported again by another's.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    snapshot: Arc<RwLock<Snapshot>>,
}

impl StateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest known snapshot (empty before the first fetch).
    pub async fn current(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Swap in a whole new snapshot, returning the one it replaced.
    pub async fn replace(&self, snapshot: Snapshot) -> Snapshot {
        let mut guard = self.snapshot.write().await;
        std::mem::replace(&mut *guard, snapshot)
    }

    /// Point lookup within the current snapshot.
    pub async fn lookup(&self, region_id: RegionId) -> Option<RegionState> {
        self.snapshot.read().await.get(region_id).cloned()
    }

    /// Replace the entry for one region, leaving the rest unchanged.
    ///
    /// A region not yet cached is added.
    pub async fn upsert(&self, state: RegionState) -> Option<RegionState> {
        self.snapshot.write().await.upsert(state)
    }

    /// Compare a fresh observation against the cache and store it.
    ///
    /// The compare and the write happen under one lock, so two watches
    /// observing the same flip cannot both see it as an edge.
    pub async fn observe(&self, state: RegionState) -> Observation {
        let mut guard = self.snapshot.write().await;
        let current_alert = state.alert;
        match guard.upsert(state.clone()) {
            None => Observation::Seeded,
            Some(previous) if previous.alert == current_alert => Observation::Unchanged,
            Some(previous) => Observation::Edge(AlertEdge {
                region: state,
                previous_alert: previous.alert,
                current_alert,
            }),
        }
    }

    /// Number of cached regions.
    pub async fn len(&self) -> usize {
        self.snapshot.read().await.len()
    }

    /// Whether nothing has been cached yet.
    pub async fn is_empty(&self) -> bool {
        self.snapshot.read().await.is_empty()
    }
}

//! Alert edge detection between two snapshots.

use alert_feed::{RegionState, Snapshot};

/// A region whose alert flag flipped between two observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEdge {
    /// The region as of the newer observation.
    pub region: RegionState,
    pub previous_alert: bool,
    pub current_alert: bool,
}

impl AlertEdge {
    /// Whether this edge raises an alert (false -> true).
    pub fn is_raised(&self) -> bool {
        self.current_alert
    }
}

/// Compute the alert edges between `old` and `new`.
///
/// Only regions present in both snapshots can produce an edge; a region seen
/// for the first time is never an edge. Edges come out in ascending region id.
pub fn compute_edges(old: &Snapshot, new: &Snapshot) -> Vec<AlertEdge> {
    old.iter()
        .filter_map(|before| {
            let after = new.get(before.id)?;
            (before.alert != after.alert).then(|| AlertEdge {
                region: after.clone(),
                previous_alert: before.alert,
                current_alert: after.alert,
            })
        })
        .collect()
}

//! Region state types returned by the alert provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Stable region identifier assigned by the provider.
pub type RegionId = u32;

/// Alert state of a single region at one observation.
///
/// Values are replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionState {
    /// Region identifier.
    pub id: RegionId,
    /// Localized region name.
    pub name: String,
    /// English region name.
    #[serde(default)]
    pub name_en: String,
    /// Whether an air-raid alert is active.
    pub alert: bool,
    /// Provider timestamp of the last change.
    #[serde(default)]
    pub changed: String,
}

/// All regions as of one fetch, ordered by id.
///
/// Ids are unique: building a snapshot from a list with duplicates keeps the
/// last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    regions: BTreeMap<RegionId, RegionState>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from provider states.
    pub fn from_states(states: impl IntoIterator<Item = RegionState>) -> Self {
        let regions = states.into_iter().map(|s| (s.id, s)).collect();
        Self { regions }
    }

    /// Look up a region by id.
    pub fn get(&self, region_id: RegionId) -> Option<&RegionState> {
        self.regions.get(&region_id)
    }

    /// Replace (or add) one region, leaving the rest unchanged.
    ///
    /// Returns the previous value for that id, if any.
    pub fn upsert(&mut self, state: RegionState) -> Option<RegionState> {
        self.regions.insert(state.id, state)
    }

    /// Iterate regions in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionState> {
        self.regions.values()
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the snapshot holds no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl FromIterator<RegionState> for Snapshot {
    fn from_iter<I: IntoIterator<Item = RegionState>>(iter: I) -> Self {
        Self::from_states(iter)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.regions.values())
    }
}

/// Response body of `GET /states`.
#[derive(Debug, Clone, Deserialize)]
pub struct AllStatesResponse {
    pub states: Vec<RegionState>,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Response body of `GET /states/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OneStateResponse {
    pub state: RegionState,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Payload of a live `update` event.
///
/// The provider sends `{"state": {...}}`; some deployments send the bare state.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UpdatePayload {
    /// Wrapped form.
    Wrapped { state: RegionState },
    /// Bare region state.
    Bare(RegionState),
}

impl UpdatePayload {
    /// Extract the region state.
    pub fn into_state(self) -> RegionState {
        match self {
            UpdatePayload::Wrapped { state } => state,
            UpdatePayload::Bare(state) => state,
        }
    }
}

//! In-memory restricted areas, the live exclusion-zone set for routing.

use dashmap::DashMap;

use harbor_core::{ExclusionZone, RestrictedAreaSource};

#[derive(Default)]
pub struct RestrictedAreaStore {
    zones: DashMap<String, ExclusionZone>,
}

impl RestrictedAreaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, zone: ExclusionZone) {
        self.zones.insert(zone.id.clone(), zone);
    }

    pub fn remove(&self, id: &str) -> Option<ExclusionZone> {
        self.zones.remove(id).map(|(_, zone)| zone)
    }

    /// All zones ordered by id.
    pub fn list(&self) -> Vec<ExclusionZone> {
        let mut zones: Vec<ExclusionZone> =
            self.zones.iter().map(|zone| zone.value().clone()).collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl RestrictedAreaSource for RestrictedAreaStore {
    fn exclusion_zones(&self) -> Vec<ExclusionZone> {
        self.list()
    }
}

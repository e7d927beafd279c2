//! Boundaries to the services the planner consumes but does not own:
//! road routing, marina data, weather costs, and restricted areas.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mask::{GeoBounds, GridCell};
use crate::models::{ExclusionZone, GeoPoint, Marina, WeatherAssessment};

// ========== ROAD ROUTING ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadRouteRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    /// Routing profile, e.g. `driving`
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadRoute {
    pub distance_m: f64,
    pub duration_s: f64,
    pub geometry: Vec<GeoPoint>,
}

#[derive(Debug, Error)]
pub enum RoadRoutingError {
    #[error("road routing timed out")]
    Timeout,
    #[error("road routing transport failed: {0}")]
    Transport(String),
    #[error("road routing service returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("road routing response was malformed: {0}")]
    Malformed(String),
    #[error("no road route between the requested points")]
    NoRoute,
}

impl RoadRoutingError {
    /// Timeouts, transport failures, and server-side statuses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RoadRoutingError::Timeout | RoadRoutingError::Transport(_) => true,
            RoadRoutingError::Upstream { status, .. } => *status >= 500 || *status == 429,
            RoadRoutingError::Malformed(_) | RoadRoutingError::NoRoute => false,
        }
    }
}

#[async_trait]
pub trait RoadRouter: Send + Sync {
    async fn route(&self, request: &RoadRouteRequest) -> Result<RoadRoute, RoadRoutingError>;
}

#[async_trait]
impl<T: RoadRouter + ?Sized> RoadRouter for Arc<T> {
    async fn route(&self, request: &RoadRouteRequest) -> Result<RoadRoute, RoadRoutingError> {
        (**self).route(request).await
    }
}

// ========== MARINAS ==========

pub trait MarinaDirectory: Send + Sync {
    /// Closest marina within `max_radius_m` of `point`.
    fn nearest_to(&self, point: &GeoPoint, max_radius_m: f64) -> Option<Marina>;
    fn by_id(&self, id: &str) -> Option<Marina>;
}

/// Marina list held in memory; fine for the few hundred records a region has.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarinas {
    marinas: Vec<Marina>,
    by_id: HashMap<String, usize>,
}

impl InMemoryMarinas {
    pub fn new(marinas: Vec<Marina>) -> Self {
        let by_id = marinas
            .iter()
            .enumerate()
            .map(|(index, marina)| (marina.id.clone(), index))
            .collect();
        Self { marinas, by_id }
    }

    pub fn all(&self) -> &[Marina] {
        &self.marinas
    }

    pub fn len(&self) -> usize {
        self.marinas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marinas.is_empty()
    }
}

impl MarinaDirectory for InMemoryMarinas {
    fn nearest_to(&self, point: &GeoPoint, max_radius_m: f64) -> Option<Marina> {
        self.marinas
            .iter()
            .map(|marina| (marina.location.distance_to(point), marina))
            .filter(|(distance, _)| *distance <= max_radius_m)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, marina)| marina.clone())
    }

    fn by_id(&self, id: &str) -> Option<Marina> {
        self.by_id
            .get(id)
            .and_then(|index| self.marinas.get(*index))
            .cloned()
    }
}

impl<T: MarinaDirectory + ?Sized> MarinaDirectory for Arc<T> {
    fn nearest_to(&self, point: &GeoPoint, max_radius_m: f64) -> Option<Marina> {
        (**self).nearest_to(point, max_radius_m)
    }

    fn by_id(&self, id: &str) -> Option<Marina> {
        (**self).by_id(id)
    }
}

// ========== WEATHER ==========

/// Weather cost lookup per mask cell. `None` means no data, which is neutral.
pub trait WeatherCostProvider: Send + Sync {
    fn assessment_for(&self, cell: GridCell, bounds: &GeoBounds) -> Option<WeatherAssessment>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoWeather;

impl WeatherCostProvider for NoWeather {
    fn assessment_for(&self, _cell: GridCell, _bounds: &GeoBounds) -> Option<WeatherAssessment> {
        None
    }
}

impl<T: WeatherCostProvider + ?Sized> WeatherCostProvider for Arc<T> {
    fn assessment_for(&self, cell: GridCell, bounds: &GeoBounds) -> Option<WeatherAssessment> {
        (**self).assessment_for(cell, bounds)
    }
}

// ========== RESTRICTED AREAS ==========

pub trait RestrictedAreaSource: Send + Sync {
    fn exclusion_zones(&self) -> Vec<ExclusionZone>;
}

impl RestrictedAreaSource for Vec<ExclusionZone> {
    fn exclusion_zones(&self) -> Vec<ExclusionZone> {
        self.clone()
    }
}

impl<T: RestrictedAreaSource + ?Sized> RestrictedAreaSource for Arc<T> {
    fn exclusion_zones(&self) -> Vec<ExclusionZone> {
        (**self).exclusion_zones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccessKind;

    fn marina(id: &str, lat: f64, lon: f64) -> Marina {
        Marina {
            id: id.to_string(),
            name: format!("Marina {id}"),
            location: GeoPoint::new(lat, lon),
            access: AccessKind::PublicRamp,
        }
    }

    #[test]
    fn nearest_marina_respects_radius() {
        let directory = InMemoryMarinas::new(vec![
            marina("near", 26.01, 50.0),
            marina("far", 26.5, 50.0),
        ]);
        let origin = GeoPoint::new(26.0, 50.0);

        assert_eq!(directory.nearest_to(&origin, 50_000.0).unwrap().id, "near");
        assert!(directory.nearest_to(&origin, 500.0).is_none());
        assert_eq!(directory.by_id("far").unwrap().location.lat, 26.5);
        assert!(directory.by_id("missing").is_none());
    }

    #[test]
    fn retryable_errors_are_transient_only() {
        assert!(RoadRoutingError::Timeout.is_retryable());
        assert!(RoadRoutingError::Upstream {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!RoadRoutingError::Upstream {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!RoadRoutingError::Malformed("bad json".into()).is_retryable());
        assert!(!RoadRoutingError::NoRoute.is_retryable());
    }
}

//! Core data models for route planning and navigation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::spatial::haversine_distance;

/// A geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Latitude within ±90 and longitude within ±180.
    pub fn is_valid_coordinate(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Sum of great-circle distances between consecutive points.
pub fn path_length_m(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .sum()
}

// ========== ROUTE MODELS ==========

/// Transport mode of a route segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Road travel (car/trailer)
    Land,
    /// Water travel (boat)
    Marine,
}

impl SegmentKind {
    pub fn transport_label(self) -> &'static str {
        match self {
            SegmentKind::Land => "car",
            SegmentKind::Marine => "boat",
        }
    }
}

/// Direction of a transport-mode change at a marina.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffDirection {
    /// Road to water
    Launch,
    /// Water to road
    Dock,
}

/// Marina identity attached to a segment boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub marina_id: String,
    pub marina_name: String,
    pub location: GeoPoint,
    pub direction: HandoffDirection,
}

/// One leg of a route, produced by the pathfinder or the road collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub kind: SegmentKind,
    pub geometry: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub transport_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_handoff: Option<Handoff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_handoff: Option<Handoff>,
}

impl RouteSegment {
    pub fn new(kind: SegmentKind, geometry: Vec<GeoPoint>, distance_m: f64, duration_s: f64) -> Self {
        Self {
            kind,
            geometry,
            distance_m,
            duration_s,
            transport_label: kind.transport_label().to_string(),
            entry_handoff: None,
            exit_handoff: None,
        }
    }

    pub fn with_entry_handoff(mut self, handoff: Handoff) -> Self {
        self.entry_handoff = Some(handoff);
        self
    }

    pub fn with_exit_handoff(mut self, handoff: Handoff) -> Self {
        self.exit_handoff = Some(handoff);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    Start,
    End,
    Intermediate,
    /// Leaving the road network onto the water
    HandoffEntry,
    /// Leaving the water onto the road network
    HandoffExit,
}

impl WaypointKind {
    pub fn is_handoff(self) -> bool {
        matches!(self, WaypointKind::HandoffEntry | WaypointKind::HandoffExit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub location: GeoPoint,
    pub kind: WaypointKind,
    pub distance_from_start_m: f64,
    pub instruction: String,
    pub eta_from_start_s: f64,
    /// Transport mode in effect when leaving this waypoint
    pub segment_kind: SegmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marina_id: Option<String>,
}

/// Water/land classification of a point sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteValidation {
    pub is_valid: bool,
    pub total_points: usize,
    pub water_points: usize,
    pub land_points: usize,
    pub land_point_indices: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub land_distance_m: f64,
    pub land_duration_s: f64,
    pub marine_distance_m: f64,
    pub marine_duration_s: f64,
    /// Marine geometry points inside a currently known restricted area
    pub restricted_violations: usize,
}

/// Shape of a route, decided from endpoint navigability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTopology {
    LandOnly,
    MarineOnly,
    LandToSea,
    SeaToLand,
}

/// A fully assembled, validated route. Replaced wholesale on recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRoute {
    pub id: String,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub topology: RouteTopology,
    pub segments: Vec<RouteSegment>,
    pub waypoints: Vec<Waypoint>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub validation: RouteValidation,
    pub metrics: RouteMetrics,
    pub created_at: DateTime<Utc>,
}

impl NavigationRoute {
    pub fn segment(&self, index: usize) -> Option<&RouteSegment> {
        self.segments.get(index)
    }

    pub fn handoff_count(&self) -> usize {
        self.waypoints
            .iter()
            .filter(|waypoint| waypoint.kind.is_handoff())
            .count()
    }
}

// ========== COLLABORATOR MODELS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Public launch ramp
    PublicRamp,
    /// Marina with berths, may require membership
    PrivateMarina,
    /// Commercial or fishing harbor
    Harbor,
}

/// A marina or launch point where road and water travel meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marina {
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    pub access: AccessKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherSafetyLevel {
    Safe,
    Caution,
    Dangerous,
    /// Not navigable at all
    Blocked,
}

/// Weather-derived cost input for a coarse cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherAssessment {
    pub level: WeatherSafetyLevel,
    pub cost_multiplier: f64,
}

impl WeatherAssessment {
    pub fn neutral() -> Self {
        Self {
            level: WeatherSafetyLevel::Safe,
            cost_multiplier: 1.0,
        }
    }

    /// Multiplier applied to movement cost. Never below 1.0 so the A*
    /// heuristic stays admissible; non-finite values are neutral.
    pub fn effective_multiplier(&self) -> f64 {
        if self.cost_multiplier.is_finite() {
            self.cost_multiplier.max(1.0)
        } else {
            1.0
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.level == WeatherSafetyLevel::Blocked
    }
}

/// A polygon no marine path may enter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionZone {
    pub id: String,
    pub name: String,
    /// Vertex ring; closing vertex optional
    pub ring: Vec<GeoPoint>,
}

impl ExclusionZone {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ring: Vec<GeoPoint>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ring,
        }
    }

    /// Check if a point is inside this zone's polygon.
    /// Uses ray casting (odd number of edge crossings = inside).
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point_in_ring(&self.ring, point)
    }

    /// Validate zone configuration.
    /// Returns list of validation errors (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let distinct = if self.ring.len() >= 2 && self.ring.first() == self.ring.last() {
            self.ring.len() - 1
        } else {
            self.ring.len()
        };
        if distinct < 3 {
            errors.push("Polygon must have at least 3 vertices".to_string());
        }
        if self.ring.iter().any(|vertex| !vertex.is_finite()) {
            errors.push("Polygon vertices must be finite coordinates".to_string());
        }
        errors
    }
}

pub(crate) fn point_in_ring(ring: &[GeoPoint], point: &GeoPoint) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let yi = ring[i].lat;
        let xi = ring[i].lon;
        let yj = ring[j].lat;
        let xj = ring[j].lon;

        if ((yi > point.lat) != (yj > point.lat))
            && (point.lon < (xj - xi) * (point.lat - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// A live position sample from GPS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub location: GeoPoint,
    #[serde(default)]
    pub bearing_deg: Option<f64>,
    #[serde(default)]
    pub speed_mps: Option<f64>,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    pub fn new(location: GeoPoint, timestamp: DateTime<Utc>) -> Self {
        Self {
            location,
            bearing_deg: None,
            speed_mps: None,
            accuracy_m: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }
}

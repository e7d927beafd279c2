//! Route coordinator: decides the route topology from endpoint navigability,
//! gathers road and marine legs around a marina hand-off, and assembles them
//! into one `NavigationRoute`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::collaborators::{
    MarinaDirectory, NoWeather, RestrictedAreaSource, RoadRouteRequest, RoadRouter,
    WeatherCostProvider,
};
use crate::error::RouteError;
use crate::mask::SharedMask;
use crate::models::{
    path_length_m, ExclusionZone, GeoPoint, Handoff, HandoffDirection, Marina, NavigationRoute, RouteMetrics,
    RouteSegment, RouteTopology, SegmentKind, Waypoint, WaypointKind,
};
use crate::pathfinder::{find_path, PathfinderConfig};
use crate::spatial::{bearing, compass_label};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How far from the land endpoint a hand-off marina may be, meters
    pub marina_search_radius_m: f64,
    /// Profile passed to the road router
    pub road_profile: String,
    pub pathfinder: PathfinderConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            marina_search_radius_m: 50_000.0,
            road_profile: "driving".to_string(),
            pathfinder: PathfinderConfig::default(),
        }
    }
}

/// Anything that can produce a route between two points.
#[async_trait]
pub trait RoutePlanner: Send + Sync {
    async fn plan(&self, origin: GeoPoint, destination: GeoPoint) -> Result<NavigationRoute, RouteError>;
}

pub struct RouteCoordinator<R> {
    mask: SharedMask,
    road: R,
    marinas: Arc<dyn MarinaDirectory>,
    weather: Arc<dyn WeatherCostProvider>,
    restricted: Arc<dyn RestrictedAreaSource>,
    config: CoordinatorConfig,
}

impl<R: RoadRouter> RouteCoordinator<R> {
    pub fn new(
        mask: SharedMask,
        road: R,
        marinas: Arc<dyn MarinaDirectory>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            mask,
            road,
            marinas,
            weather: Arc::new(NoWeather),
            restricted: Arc::new(Vec::<ExclusionZone>::new()),
            config,
        }
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherCostProvider>) -> Self {
        self.weather = weather;
        self
    }

    pub fn with_restricted_areas(mut self, restricted: Arc<dyn RestrictedAreaSource>) -> Self {
        self.restricted = restricted;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn mask(&self) -> &SharedMask {
        &self.mask
    }

    pub fn classify(&self, origin: &GeoPoint, destination: &GeoPoint) -> RouteTopology {
        let mask = self.mask.read();
        classify_endpoints(
            mask.is_point_navigable(origin),
            mask.is_point_navigable(destination),
        )
    }

    /// Route between any two points, picking the topology automatically.
    pub async fn calculate_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<NavigationRoute, RouteError> {
        ensure_finite(&origin, &destination)?;
        let topology = self.classify(&origin, &destination);
        tracing::info!(
            "Calculating {:?} route ({:.5}, {:.5}) -> ({:.5}, {:.5})",
            topology,
            origin.lat,
            origin.lon,
            destination.lat,
            destination.lon
        );
        self.calculate_with_topology(origin, destination, topology).await
    }

    /// Guided land-to-sea flow: origin must be on land, destination on water.
    /// The check runs before any collaborator is called.
    pub async fn calculate_land_to_sea(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<NavigationRoute, RouteError> {
        ensure_finite(&origin, &destination)?;
        let topology = self.classify(&origin, &destination);
        if topology != RouteTopology::LandToSea {
            let mask = self.mask.read();
            let mut problems = Vec::new();
            if mask.is_point_navigable(&origin) {
                problems.push("origin is on water");
            }
            if !mask.is_point_navigable(&destination) {
                problems.push("destination is on land");
            }
            return Err(RouteError::InvalidPrecondition(problems.join(", ")));
        }
        self.calculate_with_topology(origin, destination, topology).await
    }

    async fn calculate_with_topology(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        topology: RouteTopology,
    ) -> Result<NavigationRoute, RouteError> {
        let segments = match topology {
            RouteTopology::LandOnly => vec![self.road_leg(origin, destination).await?],
            RouteTopology::MarineOnly => vec![self.marine_leg(origin, destination).await?],
            RouteTopology::LandToSea => {
                let marina = self.handoff_marina(&origin)?;
                let handoff = handoff_at(&marina, HandoffDirection::Launch);
                let marine = self
                    .marine_leg(marina.location, destination)
                    .await?
                    .with_entry_handoff(handoff.clone());
                let land = self
                    .road_leg(origin, marina.location)
                    .await?
                    .with_exit_handoff(handoff);
                vec![land, marine]
            }
            RouteTopology::SeaToLand => {
                let marina = self.handoff_marina(&destination)?;
                let handoff = handoff_at(&marina, HandoffDirection::Dock);
                let marine = self
                    .marine_leg(origin, marina.location)
                    .await?
                    .with_exit_handoff(handoff.clone());
                let land = self
                    .road_leg(marina.location, destination)
                    .await?
                    .with_entry_handoff(handoff);
                vec![marine, land]
            }
        };
        Ok(self.assemble(origin, destination, topology, segments))
    }

    fn handoff_marina(&self, land_endpoint: &GeoPoint) -> Result<Marina, RouteError> {
        let radius_m = self.config.marina_search_radius_m;
        let marina = self
            .marinas
            .nearest_to(land_endpoint, radius_m)
            .ok_or(RouteError::NoHandoffAvailable { radius_m })?;
        tracing::debug!("Hand-off via marina {} ({})", marina.id, marina.name);
        Ok(marina)
    }

    async fn road_leg(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteSegment, RouteError> {
        let request = RoadRouteRequest {
            origin: from,
            destination: to,
            profile: self.config.road_profile.clone(),
        };
        let road = self
            .road
            .route(&request)
            .await
            .map_err(RouteError::RoadRouteUnavailable)?;
        let geometry = if road.geometry.len() >= 2 {
            road.geometry
        } else {
            vec![from, to]
        };
        Ok(RouteSegment::new(SegmentKind::Land, geometry, road.distance_m, road.duration_s))
    }

    /// Runs the pathfinder on the blocking pool with one read guard held for
    /// the whole search.
    async fn marine_leg(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteSegment, RouteError> {
        let mask = self.mask.clone();
        let zones = self.restricted.exclusion_zones();
        let weather = Arc::clone(&self.weather);
        let config = self.config.pathfinder.clone();

        let path = tokio::task::spawn_blocking(move || {
            let guard = mask.read();
            find_path(&guard, &from, &to, &zones, weather.as_ref(), &config)
        })
        .await
        .map_err(|err| RouteError::PlannerUnavailable(err.to_string()))??;

        tracing::debug!(
            "Marine leg: {} cells, {:.0} m, {} nodes visited",
            path.cells.len(),
            path.distance_m,
            path.nodes_visited
        );
        Ok(anchor_marine_leg(
            path.points,
            from,
            to,
            self.config.pathfinder.marine_speed_mps,
        ))
    }

    fn assemble(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        topology: RouteTopology,
        segments: Vec<RouteSegment>,
    ) -> NavigationRoute {
        // Hand-off anchors sit at the marina, usually on the shore side.
        let handoff_points: Vec<GeoPoint> = segments
            .iter()
            .flat_map(|segment| [&segment.entry_handoff, &segment.exit_handoff])
            .flatten()
            .map(|handoff| handoff.location)
            .collect();
        let marine_points: Vec<GeoPoint> = segments
            .iter()
            .filter(|segment| segment.kind == SegmentKind::Marine)
            .flat_map(|segment| segment.geometry.iter().copied())
            .filter(|point| !handoff_points.contains(point))
            .collect();
        let validation = self.mask.read().validate_route(&marine_points);

        // Zones may have changed while the search ran.
        let zones = self.restricted.exclusion_zones();
        let restricted_violations = marine_points
            .iter()
            .filter(|point| zones.iter().any(|zone| zone.contains(point)))
            .count();
        if restricted_violations > 0 {
            tracing::warn!(
                "Route crosses {} restricted points (restricted areas changed during planning)",
                restricted_violations
            );
        }

        let mut metrics = RouteMetrics {
            restricted_violations,
            ..RouteMetrics::default()
        };
        for segment in &segments {
            match segment.kind {
                SegmentKind::Land => {
                    metrics.land_distance_m += segment.distance_m;
                    metrics.land_duration_s += segment.duration_s;
                }
                SegmentKind::Marine => {
                    metrics.marine_distance_m += segment.distance_m;
                    metrics.marine_duration_s += segment.duration_s;
                }
            }
        }

        let waypoints = build_waypoints(&origin, &destination, &segments);
        let route = NavigationRoute {
            id: new_route_id(),
            origin,
            destination,
            topology,
            total_distance_m: segments.iter().map(|segment| segment.distance_m).sum(),
            total_duration_s: segments.iter().map(|segment| segment.duration_s).sum(),
            segments,
            waypoints,
            validation,
            metrics,
            created_at: Utc::now(),
        };
        tracing::info!(
            "Route {} ready: {} segments, {:.0} m, {:.0} s",
            route.id,
            route.segments.len(),
            route.total_distance_m,
            route.total_duration_s
        );
        route
    }
}

#[async_trait]
impl<R: RoadRouter + 'static> RoutePlanner for RouteCoordinator<R> {
    async fn plan(&self, origin: GeoPoint, destination: GeoPoint) -> Result<NavigationRoute, RouteError> {
        self.calculate_route(origin, destination).await
    }
}

pub fn classify_endpoints(origin_navigable: bool, destination_navigable: bool) -> RouteTopology {
    match (origin_navigable, destination_navigable) {
        (false, false) => RouteTopology::LandOnly,
        (true, true) => RouteTopology::MarineOnly,
        (false, true) => RouteTopology::LandToSea,
        (true, false) => RouteTopology::SeaToLand,
    }
}

fn ensure_finite(origin: &GeoPoint, destination: &GeoPoint) -> Result<(), RouteError> {
    if origin.is_finite() && destination.is_finite() {
        Ok(())
    } else {
        Err(RouteError::InvalidPrecondition(
            "coordinates must be finite".to_string(),
        ))
    }
}

/// Pin the cell-center path to the points the leg was requested between, so
/// the leg starts where the previous one ended and ends where the next begins.
fn anchor_marine_leg(
    cell_points: Vec<GeoPoint>,
    from: GeoPoint,
    to: GeoPoint,
    speed_mps: f64,
) -> RouteSegment {
    let mut geometry = Vec::with_capacity(cell_points.len() + 2);
    geometry.push(from);
    geometry.extend(cell_points);
    geometry.push(to);
    geometry.dedup();
    let distance_m = path_length_m(&geometry);
    let duration_s = distance_m / speed_mps.max(0.1);
    RouteSegment::new(SegmentKind::Marine, geometry, distance_m, duration_s)
}

fn handoff_at(marina: &Marina, direction: HandoffDirection) -> Handoff {
    Handoff {
        marina_id: marina.id.clone(),
        marina_name: marina.name.clone(),
        location: marina.location,
        direction,
    }
}

pub(crate) fn new_route_id() -> String {
    format!("route-{:016x}", rand::random::<u64>())
}

fn heading_text(geometry: &[GeoPoint]) -> Option<&'static str> {
    let first = geometry.first()?;
    let next = geometry.iter().find(|point| *point != first)?;
    Some(compass_label(bearing(first.lat, first.lon, next.lat, next.lon)))
}

fn departure_instruction(segment: &RouteSegment) -> String {
    let mode = match segment.kind {
        SegmentKind::Land => "Drive",
        SegmentKind::Marine => "Sail",
    };
    match heading_text(&segment.geometry) {
        Some(heading) => format!("{mode} {heading}"),
        None => mode.to_string(),
    }
}

/// Derive waypoints from segments: a start, one hand-off per transport-mode
/// change, and an end. Distances and times accumulate across segments.
pub fn build_waypoints(
    origin: &GeoPoint,
    destination: &GeoPoint,
    segments: &[RouteSegment],
) -> Vec<Waypoint> {
    let Some(first) = segments.first() else {
        return Vec::new();
    };

    let mut waypoints = vec![Waypoint {
        id: "wp-0".to_string(),
        location: *origin,
        kind: WaypointKind::Start,
        distance_from_start_m: 0.0,
        instruction: departure_instruction(first),
        eta_from_start_s: 0.0,
        segment_kind: first.kind,
        marina_id: None,
    }];

    let mut distance = first.distance_m;
    let mut duration = first.duration_s;
    for pair in segments.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if previous.kind != next.kind {
            let handoff = next.entry_handoff.as_ref().or(previous.exit_handoff.as_ref());
            let location = handoff
                .map(|handoff| handoff.location)
                .or_else(|| next.geometry.first().copied())
                .or_else(|| previous.geometry.last().copied())
                .unwrap_or(*destination);
            let place = handoff
                .map(|handoff| handoff.marina_name.clone())
                .unwrap_or_else(|| "the marina".to_string());
            let (kind, action) = match next.kind {
                SegmentKind::Marine => (WaypointKind::HandoffEntry, "Launch"),
                SegmentKind::Land => (WaypointKind::HandoffExit, "Dock"),
            };
            waypoints.push(Waypoint {
                id: format!("wp-{}", waypoints.len()),
                location,
                kind,
                distance_from_start_m: distance,
                instruction: format!("{action} at {place}, then {}", departure_instruction(next).to_lowercase()),
                eta_from_start_s: duration,
                segment_kind: next.kind,
                marina_id: handoff.map(|handoff| handoff.marina_id.clone()),
            });
        }
        distance += next.distance_m;
        duration += next.duration_s;
    }

    let last_kind = segments.last().map(|segment| segment.kind).unwrap_or(first.kind);
    waypoints.push(Waypoint {
        id: format!("wp-{}", waypoints.len()),
        location: *destination,
        kind: WaypointKind::End,
        distance_from_start_m: distance,
        instruction: "Arrive at destination".to_string(),
        eta_from_start_s: duration,
        segment_kind: last_kind,
        marina_id: None,
    });
    waypoints
}

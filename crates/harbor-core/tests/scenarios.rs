//! End-to-end planning and navigation scenarios.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use harbor_core::spatial::offset_by_bearing;
use harbor_core::{
    find_path, search, AccessKind, CellKind, CoordinatorConfig, ExclusionZone, GeoBounds, GeoPoint,
    GridCell, InMemoryMarinas, Marina, NavigationRules, NoWeather, OccupancyMask, PathfindError,
    PathfinderConfig, PositionFix, RoadRoute, RoadRouteRequest, RoadRouter, RoadRoutingError,
    RouteCoordinator, SegmentKind, SessionEvent, SessionManager, SessionState, SharedMask,
    WaypointKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const RES: f64 = 0.001;

fn open_water(width: usize, height: usize) -> OccupancyMask {
    OccupancyMask::filled(
        GeoBounds::new(50.0, 26.0, RES, width, height).unwrap(),
        CellKind::Water,
    )
}

fn square_zone(id: &str, center: &GeoPoint, half_side_deg: f64) -> ExclusionZone {
    ExclusionZone::new(
        id,
        id,
        vec![
            GeoPoint::new(center.lat - half_side_deg, center.lon - half_side_deg),
            GeoPoint::new(center.lat - half_side_deg, center.lon + half_side_deg),
            GeoPoint::new(center.lat + half_side_deg, center.lon + half_side_deg),
            GeoPoint::new(center.lat + half_side_deg, center.lon - half_side_deg),
        ],
    )
}

struct StraightRoads;

#[async_trait]
impl RoadRouter for StraightRoads {
    async fn route(&self, request: &RoadRouteRequest) -> Result<RoadRoute, RoadRoutingError> {
        let distance_m = request.origin.distance_to(&request.destination);
        Ok(RoadRoute {
            distance_m,
            duration_s: distance_m / 12.0,
            geometry: vec![request.origin, request.destination],
        })
    }
}

#[test]
fn test_open_water_path_uses_single_steps() {
    let mask = open_water(10, 10);
    let origin = mask.cell_center(GridCell::new(1, 2));
    let destination = mask.cell_center(GridCell::new(8, 6));

    let path = find_path(
        &mask,
        &origin,
        &destination,
        &[],
        &NoWeather,
        &PathfinderConfig::default(),
    )
    .unwrap();

    let start = *path.cells.first().unwrap();
    let goal = *path.cells.last().unwrap();
    assert_eq!(start, GridCell::new(1, 2));
    assert_eq!(goal, GridCell::new(8, 6));
    let chebyshev = start.chebyshev_distance(goal) as usize;
    assert!(path.cells.len() - 1 >= chebyshev);
    for pair in path.cells.windows(2) {
        assert_eq!(pair[0].chebyshev_distance(pair[1]), 1);
    }
    assert!(path.cells.iter().all(|cell| mask.is_cell_navigable(*cell)));
}

#[tokio::test]
async fn test_land_to_sea_hybrid_route() {
    // Land on the western 8 columns, water to the east.
    let mut mask = OccupancyMask::filled(
        GeoBounds::new(50.0, 26.03, RES, 30, 30).unwrap(),
        CellKind::Water,
    );
    for row in 0..30 {
        for col in 0..8 {
            mask.set_cell(row, col, CellKind::Land).unwrap();
        }
    }
    let origin = mask.cell_center(GridCell::new(15, 1));
    let destination = mask.cell_center(GridCell::new(10, 25));
    let marina = Marina {
        id: "ramp-1".to_string(),
        name: "East Ramp".to_string(),
        location: mask.cell_center(GridCell::new(14, 7)),
        access: AccessKind::PublicRamp,
    };

    let coordinator = RouteCoordinator::new(
        SharedMask::new(mask),
        StraightRoads,
        Arc::new(InMemoryMarinas::new(vec![marina])),
        CoordinatorConfig::default(),
    );
    let route = coordinator.calculate_route(origin, destination).await.unwrap();

    assert_eq!(route.segments.len(), 2);
    assert_eq!(route.segments[0].kind, SegmentKind::Land);
    assert_eq!(route.segments[1].kind, SegmentKind::Marine);
    let handoffs: Vec<_> = route
        .waypoints
        .iter()
        .filter(|waypoint| waypoint.kind.is_handoff())
        .collect();
    assert_eq!(handoffs.len(), 1);
    assert_eq!(handoffs[0].kind, WaypointKind::HandoffEntry);
    assert_eq!(handoffs[0].marina_id.as_deref(), Some("ramp-1"));

    let segment_sum: f64 = route.segments.iter().map(|segment| segment.distance_m).sum();
    assert_eq!(route.total_distance_m, segment_sum);
    assert!(route
        .waypoints
        .windows(2)
        .all(|pair| pair[0].distance_from_start_m <= pair[1].distance_from_start_m));
    assert!(route.validation.is_valid);
    assert_eq!(route.metrics.restricted_violations, 0);
}

async fn launch_route_on_coarse_coast() -> harbor_core::NavigationRoute {
    // Half-kilometer cells; land on the western 8 columns.
    let mut mask = OccupancyMask::filled(
        GeoBounds::new(50.0, 26.15, 0.005, 30, 30).unwrap(),
        CellKind::Water,
    );
    for row in 0..30 {
        for col in 0..8 {
            mask.set_cell(row, col, CellKind::Land).unwrap();
        }
    }
    let origin = mask.cell_center(GridCell::new(15, 1));
    let destination = mask.cell_center(GridCell::new(10, 25));
    let marina = Marina {
        id: "shore-ramp".to_string(),
        name: "Shore Ramp".to_string(),
        location: mask.cell_center(GridCell::new(14, 7)),
        access: AccessKind::PublicRamp,
    };
    assert!(!mask.is_point_navigable(&marina.location));

    let coordinator = RouteCoordinator::new(
        SharedMask::new(mask),
        StraightRoads,
        Arc::new(InMemoryMarinas::new(vec![marina])),
        CoordinatorConfig::default(),
    );
    coordinator
        .calculate_land_to_sea(origin, destination)
        .await
        .unwrap()
}

fn is_reroute(event: &SessionEvent) -> bool {
    matches!(
        event,
        SessionEvent::OffRoute { .. } | SessionEvent::RecalculationStarted { .. }
    )
}

#[tokio::test]
async fn test_following_planned_hybrid_route_never_reroutes() {
    let route = launch_route_on_coarse_coast().await;
    let track: Vec<GeoPoint> = route
        .segments
        .iter()
        .flat_map(|segment| segment.geometry.iter().copied())
        .collect();

    let mut manager = SessionManager::new(NavigationRules::default());
    let t0 = Utc::now();
    manager.start(route, t0).unwrap();

    let mut events = Vec::new();
    for (i, point) in track.into_iter().enumerate() {
        let update = manager
            .handle_position(PositionFix::new(point, t0 + Duration::seconds(30 * (i as i64 + 1))))
            .unwrap();
        assert!(update.recalculation.is_none(), "rerouted at fix {i}: {:?}", update.events);
        events.extend(update.events);
    }

    assert!(!events.iter().any(is_reroute));
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::SegmentChanged { kind: SegmentKind::Marine, .. })));
    assert_eq!(manager.session().unwrap().state, SessionState::Completed);
}

#[tokio::test]
async fn test_leaving_marine_leg_after_launch_reroutes() {
    let route = launch_route_on_coarse_coast().await;
    let marine = route.segments[1].geometry.clone();
    let land = route.segments[0].geometry.clone();

    let mut manager = SessionManager::new(NavigationRules::default());
    let t0 = Utc::now();
    manager.start(route, t0).unwrap();

    let halfway = marine.len() / 2;
    let track = land.iter().chain(marine[..=halfway].iter()).copied();
    let mut seconds = 0;
    for point in track {
        seconds += 30;
        let update = manager
            .handle_position(PositionFix::new(point, t0 + Duration::seconds(seconds)))
            .unwrap();
        assert!(!update.events.iter().any(is_reroute));
    }
    assert_eq!(manager.session().unwrap().current_segment_kind(), Some(SegmentKind::Marine));

    let here = marine[halfway];
    let (lat, lon) = offset_by_bearing(here.lat, here.lon, 2_000.0, std::f64::consts::PI);
    let update = manager
        .handle_position(PositionFix::new(GeoPoint::new(lat, lon), t0 + Duration::seconds(seconds + 30)))
        .unwrap();
    assert!(update.events.iter().any(|event| matches!(event, SessionEvent::OffRoute { .. })));
    assert!(update.recalculation.is_some());
}

#[test]
fn test_enclosed_destination_has_no_path() {
    let mask = open_water(20, 20);
    let origin = mask.cell_center(GridCell::new(2, 2));
    let destination = mask.cell_center(GridCell::new(12, 12));
    // Goal sits two cells inside a closed ring.
    let fence = square_zone("fence", &destination, RES * 2.5);

    assert!(origin.distance_to(&destination) < 2_000.0);
    let result = find_path(
        &mask,
        &origin,
        &destination,
        &[fence],
        &NoWeather,
        &PathfinderConfig::default(),
    );
    assert!(matches!(result, Err(PathfindError::NoPathFound(_))));
}

#[test]
fn test_session_completes_without_recalculation() {
    let origin = GeoPoint::new(26.1, 50.5);
    let (lat, lon) = offset_by_bearing(origin.lat, origin.lon, 3_000.0, std::f64::consts::FRAC_PI_2);
    let destination = GeoPoint::new(lat, lon);
    let segment = harbor_core::RouteSegment::new(
        SegmentKind::Marine,
        vec![origin, destination],
        origin.distance_to(&destination),
        300.0,
    );
    let route = harbor_core::NavigationRoute {
        id: "route-scenario".to_string(),
        origin,
        destination,
        topology: harbor_core::RouteTopology::MarineOnly,
        waypoints: harbor_core::build_waypoints(&origin, &destination, std::slice::from_ref(&segment)),
        segments: vec![segment],
        total_distance_m: origin.distance_to(&destination),
        total_duration_s: 300.0,
        validation: Default::default(),
        metrics: Default::default(),
        created_at: Utc::now(),
    };

    let mut manager = SessionManager::new(NavigationRules::default());
    let t0 = Utc::now();
    manager.start(route, t0).unwrap();

    // Mid-route, then closing in on the final waypoint.
    let mut events = Vec::new();
    for (i, remaining) in [1_500.0, 200.0, 15.0].into_iter().enumerate() {
        let (lat, lon) = offset_by_bearing(
            destination.lat,
            destination.lon,
            remaining,
            -std::f64::consts::FRAC_PI_2,
        );
        let update = manager
            .handle_position(
                PositionFix::new(GeoPoint::new(lat, lon), t0 + Duration::seconds(60 * (i as i64 + 1)))
                    .with_speed(8.0),
            )
            .unwrap();
        assert!(update.recalculation.is_none());
        events.extend(update.events);
    }

    assert_eq!(manager.session().unwrap().state, SessionState::Completed);
    assert!(events
        .iter()
        .all(|event| !matches!(event, SessionEvent::RecalculationStarted { .. } | SessionEvent::OffRoute { .. })));
    assert!(matches!(events.last(), Some(SessionEvent::Completed { .. })));
}

#[test]
fn test_adding_exclusion_zones_never_lowers_cost() {
    let mut rng = StdRng::seed_from_u64(7);
    let mask = open_water(40, 40);
    let start = GridCell::new(20, 0);
    let goal = GridCell::new(20, 39);
    let config = PathfinderConfig::default();

    let mut zones: Vec<ExclusionZone> = Vec::new();
    let mut previous_cost = search(&mask, start, goal, &zones, &NoWeather, &config)
        .unwrap()
        .cost;

    for i in 0..8 {
        let center = mask.cell_center(GridCell::new(rng.random_range(5..35), rng.random_range(5..35)));
        zones.push(square_zone(&format!("z{i}"), &center, RES * rng.random_range(1.0..4.0)));
        match search(&mask, start, goal, &zones, &NoWeather, &config) {
            Ok(outcome) => {
                assert!(outcome.cost + 1e-9 >= previous_cost);
                for cell in &outcome.cells {
                    let center = mask.cell_center(*cell);
                    assert!(zones.iter().all(|zone| !zone.contains(&center)));
                }
                previous_cost = outcome.cost;
            }
            Err(_) => previous_cost = f64::INFINITY,
        }
    }
}

#[test]
fn test_brush_footprint_matches_disc_after_growth() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let mut mask = OccupancyMask::filled(
            GeoBounds::new(50.0, 26.0, RES, 15, 15).unwrap(),
            CellKind::Land,
        );
        let lon = 50.0 + rng.random_range(-0.01..0.025);
        let lat = 26.0 - rng.random_range(-0.01..0.025);
        let radius = rng.random_range(0..5usize);

        let affected = mask
            .paint_circular_brush(lon, lat, radius, CellKind::Water)
            .unwrap();
        let center = mask.cell_for(lon, lat).unwrap();
        let bounds = *mask.bounds();

        let r = radius as i64;
        let mut expected = Vec::new();
        for dr in -r..=r {
            for dc in -r..=r {
                let cell = center.offset(dr, dc);
                if dr * dr + dc * dc <= r * r && bounds.contains_cell(cell) {
                    expected.push(cell);
                }
            }
        }
        let mut actual = affected.clone();
        actual.sort();
        expected.sort();
        assert_eq!(actual, expected);
        assert_eq!(mask.stats().water_cells, expected.len());
    }
}

#[test]
fn test_out_of_bounds_is_never_navigable() {
    let mask = open_water(10, 10);
    let bounds = *mask.bounds();
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..200 {
        let lon = if rng.random_bool(0.5) {
            bounds.min_lon - rng.random_range(1e-6..1.0)
        } else {
            bounds.max_lon + rng.random_range(1e-6..1.0)
        };
        let lat = rng.random_range(bounds.min_lat - 1.0..bounds.max_lat + 1.0);
        assert!(!mask.is_navigable(lon, lat));
    }
}

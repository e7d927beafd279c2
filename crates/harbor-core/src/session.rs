//! Navigation session state machine.
//!
//! `SessionManager` owns at most one `NavigationSession` and mutates it only
//! through the methods below, one event at a time. It performs no I/O: when a
//! fix drifts off the route it hands back a `RecalculationRequest` and waits
//! for `finish_recalculation`.
//!
//! ```text
//! Active <-> Paused
//!   |          |
//!   +----------+--> Completed | Cancelled | Error
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RouteError, SessionError};
use crate::models::{GeoPoint, NavigationRoute, PositionFix, SegmentKind, WaypointKind};
use crate::rules::NavigationRules;
use crate::spatial::distance_to_polyline_m;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Error
        )
    }

    fn name(self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub location: GeoPoint,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Accumulated as fixes arrive; unaffected by breadcrumb eviction
    pub distance_traveled_m: f64,
    pub elapsed_s: f64,
    pub max_speed_mps: f64,
    pub average_speed_mps: f64,
    pub recalculations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationSession {
    pub id: String,
    pub route: NavigationRoute,
    pub state: SessionState,
    pub current_location: Option<GeoPoint>,
    pub current_bearing_deg: Option<f64>,
    pub current_speed_mps: Option<f64>,
    pub current_segment_index: usize,
    /// Index of the next waypoint to reach
    pub current_waypoint_index: usize,
    pub started_at: DateTime<Utc>,
    pub breadcrumbs: VecDeque<Breadcrumb>,
    pub metrics: SessionMetrics,
    /// A recalculation is in flight
    pub recalculating: bool,
    /// Recalculations since the last on-route fix
    pub consecutive_recalculations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl NavigationSession {
    fn new(route: NavigationRoute, started_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("session-{:016x}", rand::random::<u64>()),
            current_location: None,
            current_bearing_deg: None,
            current_speed_mps: None,
            current_segment_index: 0,
            current_waypoint_index: first_target(&route),
            route,
            state: SessionState::Active,
            started_at,
            breadcrumbs: VecDeque::new(),
            metrics: SessionMetrics::default(),
            recalculating: false,
            consecutive_recalculations: 0,
            failure: None,
        }
    }

    /// Distance from a point to the active segment's geometry.
    pub fn distance_from_route_m(&self, point: &GeoPoint) -> Option<f64> {
        self.route
            .segment(self.current_segment_index)
            .and_then(|segment| distance_to_polyline_m(point, &segment.geometry))
    }

    pub fn current_segment_kind(&self) -> Option<SegmentKind> {
        self.route
            .segment(self.current_segment_index)
            .map(|segment| segment.kind)
    }

    fn fail(&mut self, reason: String) -> SessionEvent {
        self.state = SessionState::Error;
        self.recalculating = false;
        self.failure = Some(reason.clone());
        SessionEvent::Failed {
            session_id: self.id.clone(),
            reason,
        }
    }
}

/// Skip the start waypoint; the operator is already there.
fn first_target(route: &NavigationRoute) -> usize {
    match route.waypoints.first() {
        Some(waypoint) if waypoint.kind == WaypointKind::Start => 1,
        _ => 0,
    }
}

/// Everything observable that happens to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        route_id: String,
    },
    WaypointReached {
        session_id: String,
        waypoint_index: usize,
        waypoint_id: String,
        kind: WaypointKind,
    },
    SegmentChanged {
        session_id: String,
        segment_index: usize,
        kind: SegmentKind,
    },
    OffRoute {
        session_id: String,
        distance_m: f64,
    },
    RecalculationStarted {
        session_id: String,
        attempt: u32,
    },
    Rerouted {
        session_id: String,
        route_id: String,
    },
    Paused {
        session_id: String,
    },
    Resumed {
        session_id: String,
    },
    Completed {
        session_id: String,
        metrics: SessionMetrics,
    },
    Cancelled {
        session_id: String,
    },
    Failed {
        session_id: String,
        reason: String,
    },
}

/// Work the caller must perform for the session: plan from `from` to `to`
/// and report back via `finish_recalculation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalculationRequest {
    pub session_id: String,
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub attempt: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub events: Vec<SessionEvent>,
    pub recalculation: Option<RecalculationRequest>,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    rules: NavigationRules,
    session: Option<NavigationSession>,
}

impl SessionManager {
    pub fn new(rules: NavigationRules) -> Self {
        Self {
            rules,
            session: None,
        }
    }

    pub fn rules(&self) -> &NavigationRules {
        &self.rules
    }

    pub fn session(&self) -> Option<&NavigationSession> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<NavigationSession> {
        self.session.clone()
    }

    /// Begin navigating `route`. A finished session is replaced; a running
    /// or paused one is not.
    pub fn start(
        &mut self,
        route: NavigationRoute,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if let Some(existing) = &self.session {
            if !existing.state.is_terminal() {
                return Err(SessionError::AlreadyActive);
            }
        }
        if route.waypoints.is_empty() || route.segments.is_empty() {
            return Err(SessionError::InvalidState(
                "an empty route".to_string(),
                "a route with segments and waypoints".to_string(),
            ));
        }
        let session = NavigationSession::new(route, now);
        tracing::info!("Navigation session {} started on route {}", session.id, session.route.id);
        let event = SessionEvent::Started {
            session_id: session.id.clone(),
            route_id: session.route.id.clone(),
        };
        self.session = Some(session);
        Ok(vec![event])
    }

    /// Process one position fix. Fixes outside the Active state are ignored.
    pub fn handle_position(&mut self, fix: PositionFix) -> Result<SessionUpdate, SessionError> {
        let rules = self.rules.clone();
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        let mut update = SessionUpdate::default();
        if session.state != SessionState::Active || !fix.location.is_finite() {
            return Ok(update);
        }

        record_fix(session, &fix, rules.breadcrumb_capacity);

        // Progress logic waits for the in-flight recalculation.
        if session.recalculating {
            return Ok(update);
        }

        advance_waypoints(session, &fix.location, rules.arrival_threshold_m, &mut update.events);
        if session.state != SessionState::Active {
            return Ok(update);
        }

        let Some(distance_m) = session.distance_from_route_m(&fix.location) else {
            return Ok(update);
        };
        if distance_m <= rules.off_route_threshold_m {
            session.consecutive_recalculations = 0;
            return Ok(update);
        }

        tracing::info!(
            "Session {} off route by {:.0} m (threshold {:.0} m)",
            session.id,
            distance_m,
            rules.off_route_threshold_m
        );
        update.events.push(SessionEvent::OffRoute {
            session_id: session.id.clone(),
            distance_m,
        });

        if session.consecutive_recalculations >= rules.max_recalculations {
            let reason = RouteError::RecalculationExhausted {
                attempts: rules.max_recalculations,
            }
            .to_string();
            tracing::warn!("Session {} failed: {}", session.id, reason);
            update.events.push(session.fail(reason));
            return Ok(update);
        }

        session.consecutive_recalculations += 1;
        session.metrics.recalculations += 1;
        session.recalculating = true;
        let attempt = session.consecutive_recalculations;
        update.events.push(SessionEvent::RecalculationStarted {
            session_id: session.id.clone(),
            attempt,
        });
        update.recalculation = Some(RecalculationRequest {
            session_id: session.id.clone(),
            from: fix.location,
            to: session.route.destination,
            attempt,
        });
        Ok(update)
    }

    /// Apply the outcome of a recalculation. Results for another session, or
    /// for one that has ended meanwhile, are discarded.
    pub fn finish_recalculation(
        &mut self,
        session_id: &str,
        result: Result<NavigationRoute, RouteError>,
    ) -> Vec<SessionEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.id != session_id || session.state.is_terminal() || !session.recalculating {
            tracing::debug!("Discarding stale recalculation result for {}", session_id);
            return Vec::new();
        }
        session.recalculating = false;

        match result {
            Ok(route) if !route.segments.is_empty() && !route.waypoints.is_empty() => {
                tracing::info!("Session {} rerouted onto {}", session.id, route.id);
                session.current_segment_index = 0;
                session.current_waypoint_index = first_target(&route);
                let event = SessionEvent::Rerouted {
                    session_id: session.id.clone(),
                    route_id: route.id.clone(),
                };
                session.route = route;
                vec![event]
            }
            Ok(_) => vec![session.fail("recalculation produced an empty route".to_string())],
            Err(err) => {
                tracing::warn!("Session {} recalculation failed: {}", session.id, err);
                vec![session.fail(err.to_string())]
            }
        }
    }

    /// The position source broke. The session stops consuming fixes.
    pub fn stream_failed(&mut self, reason: &str) -> Vec<SessionEvent> {
        match self.session.as_mut() {
            Some(session) if !session.state.is_terminal() => {
                tracing::warn!("Session {} position stream failed: {}", session.id, reason);
                vec![session.fail(format!("position stream failed: {reason}"))]
            }
            _ => Vec::new(),
        }
    }

    pub fn pause(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let session = self.require(SessionState::Active)?;
        session.state = SessionState::Paused;
        Ok(vec![SessionEvent::Paused {
            session_id: session.id.clone(),
        }])
    }

    pub fn resume(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let session = self.require(SessionState::Paused)?;
        session.state = SessionState::Active;
        Ok(vec![SessionEvent::Resumed {
            session_id: session.id.clone(),
        }])
    }

    pub fn cancel(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.state.is_terminal() {
            return Err(SessionError::InvalidState(
                session.state.name().to_string(),
                "active or paused".to_string(),
            ));
        }
        session.state = SessionState::Cancelled;
        session.recalculating = false;
        tracing::info!("Session {} cancelled", session.id);
        Ok(vec![SessionEvent::Cancelled {
            session_id: session.id.clone(),
        }])
    }

    fn require(&mut self, expected: SessionState) -> Result<&mut NavigationSession, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        if session.state != expected {
            return Err(SessionError::InvalidState(
                session.state.name().to_string(),
                expected.name().to_string(),
            ));
        }
        Ok(session)
    }
}

fn record_fix(session: &mut NavigationSession, fix: &PositionFix, capacity: usize) {
    let previous = session.breadcrumbs.back().copied();
    if let Some(previous) = previous {
        let step = previous.location.distance_to(&fix.location);
        session.metrics.distance_traveled_m += step;
        let dt = (fix.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;
        let speed = match fix.speed_mps {
            Some(speed) if speed.is_finite() => speed,
            _ if dt > 0.0 => step / dt,
            _ => 0.0,
        };
        session.metrics.max_speed_mps = session.metrics.max_speed_mps.max(speed);
    } else if let Some(speed) = fix.speed_mps.filter(|speed| speed.is_finite()) {
        session.metrics.max_speed_mps = session.metrics.max_speed_mps.max(speed);
    }

    session.breadcrumbs.push_back(Breadcrumb {
        location: fix.location,
        timestamp: fix.timestamp,
        speed_mps: fix.speed_mps,
    });
    while session.breadcrumbs.len() > capacity.max(1) {
        session.breadcrumbs.pop_front();
    }

    let elapsed_s = (fix.timestamp - session.started_at).num_milliseconds() as f64 / 1000.0;
    session.metrics.elapsed_s = elapsed_s.max(session.metrics.elapsed_s);
    session.metrics.average_speed_mps = if session.metrics.elapsed_s > 0.0 {
        session.metrics.distance_traveled_m / session.metrics.elapsed_s
    } else {
        0.0
    };
    session.current_location = Some(fix.location);
    session.current_bearing_deg = fix.bearing_deg;
    session.current_speed_mps = fix.speed_mps;
}

fn advance_waypoints(
    session: &mut NavigationSession,
    location: &GeoPoint,
    threshold_m: f64,
    events: &mut Vec<SessionEvent>,
) {
    while let Some(waypoint) = session.route.waypoints.get(session.current_waypoint_index) {
        if waypoint.location.distance_to(location) > threshold_m {
            break;
        }
        events.push(SessionEvent::WaypointReached {
            session_id: session.id.clone(),
            waypoint_index: session.current_waypoint_index,
            waypoint_id: waypoint.id.clone(),
            kind: waypoint.kind,
        });
        let passed_handoff = waypoint.kind.is_handoff();
        session.current_waypoint_index += 1;

        if passed_handoff && session.current_segment_index + 1 < session.route.segments.len() {
            session.current_segment_index += 1;
            let kind = session.route.segments[session.current_segment_index].kind;
            events.push(SessionEvent::SegmentChanged {
                session_id: session.id.clone(),
                segment_index: session.current_segment_index,
                kind,
            });
        }
    }

    let finished = session.current_waypoint_index >= session.route.waypoints.len();
    if finished && session.route.destination.distance_to(location) <= threshold_m {
        session.state = SessionState::Completed;
        tracing::info!(
            "Session {} completed: {:.0} m in {:.0} s",
            session.id,
            session.metrics.distance_traveled_m,
            session.metrics.elapsed_s
        );
        events.push(SessionEvent::Completed {
            session_id: session.id.clone(),
            metrics: session.metrics.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::build_waypoints;
    use crate::models::{RouteMetrics, RouteSegment, RouteTopology, RouteValidation};
    use crate::spatial::offset_by_bearing;
    use chrono::Duration;

    fn point_east(from: &GeoPoint, meters: f64) -> GeoPoint {
        let (lat, lon) = offset_by_bearing(from.lat, from.lon, meters, std::f64::consts::FRAC_PI_2);
        GeoPoint::new(lat, lon)
    }

    fn point_north(from: &GeoPoint, meters: f64) -> GeoPoint {
        let (lat, lon) = offset_by_bearing(from.lat, from.lon, meters, 0.0);
        GeoPoint::new(lat, lon)
    }

    fn route_through(points: &[(SegmentKind, Vec<GeoPoint>)]) -> NavigationRoute {
        let segments: Vec<RouteSegment> = points
            .iter()
            .map(|(kind, geometry)| {
                let distance = crate::models::path_length_m(geometry);
                RouteSegment::new(*kind, geometry.clone(), distance, distance / 10.0)
            })
            .collect();
        let origin = segments[0].geometry[0];
        let destination = *segments.last().unwrap().geometry.last().unwrap();
        NavigationRoute {
            id: "route-test".to_string(),
            origin,
            destination,
            topology: RouteTopology::MarineOnly,
            waypoints: build_waypoints(&origin, &destination, &segments),
            total_distance_m: segments.iter().map(|s| s.distance_m).sum(),
            total_duration_s: segments.iter().map(|s| s.duration_s).sum(),
            segments,
            validation: RouteValidation::default(),
            metrics: RouteMetrics::default(),
            created_at: Utc::now(),
        }
    }

    fn straight_route() -> NavigationRoute {
        let start = GeoPoint::new(26.1, 50.5);
        let end = point_east(&start, 2_000.0);
        route_through(&[(SegmentKind::Marine, vec![start, end])])
    }

    fn hybrid_route() -> NavigationRoute {
        let start = GeoPoint::new(26.1, 50.5);
        let marina = point_east(&start, 1_000.0);
        let end = point_east(&marina, 1_000.0);
        route_through(&[
            (SegmentKind::Land, vec![start, marina]),
            (SegmentKind::Marine, vec![marina, end]),
        ])
    }

    fn started(route: NavigationRoute) -> (SessionManager, DateTime<Utc>) {
        let mut manager = SessionManager::new(NavigationRules::default());
        let t0 = Utc::now();
        manager.start(route, t0).unwrap();
        (manager, t0)
    }

    fn fix(location: GeoPoint, at: DateTime<Utc>) -> PositionFix {
        PositionFix::new(location, at)
    }

    #[test]
    fn start_rejects_second_live_session() {
        let (mut manager, t0) = started(straight_route());
        assert_eq!(
            manager.start(straight_route(), t0),
            Err(SessionError::AlreadyActive)
        );
        manager.cancel().unwrap();
        assert!(manager.start(straight_route(), t0).is_ok());
        assert_eq!(manager.session().unwrap().current_waypoint_index, 1);
    }

    #[test]
    fn off_route_triggers_only_past_threshold() {
        let route = straight_route();
        let start = route.origin;
        let mid = point_east(&start, 1_000.0);

        for (offset, expect_recalc) in [(60.0, false), (97.0, false), (103.0, true), (250.0, true)] {
            let (mut manager, t0) = started(route.clone());
            let update = manager
                .handle_position(fix(point_north(&mid, offset), t0 + Duration::seconds(5)))
                .unwrap();
            assert_eq!(
                update.recalculation.is_some(),
                expect_recalc,
                "offset {offset} m"
            );
            if expect_recalc {
                let request = update.recalculation.unwrap();
                assert_eq!(request.to, route.destination);
                assert!(manager.session().unwrap().recalculating);
            }
        }
    }

    #[test]
    fn no_nested_recalculation_while_in_flight() {
        let (mut manager, t0) = started(straight_route());
        let far = point_north(&manager.session().unwrap().route.origin, 500.0);

        let first = manager.handle_position(fix(far, t0 + Duration::seconds(1))).unwrap();
        assert!(first.recalculation.is_some());
        let second = manager.handle_position(fix(far, t0 + Duration::seconds(2))).unwrap();
        assert!(second.recalculation.is_none());
        assert!(second.events.is_empty());
        assert_eq!(manager.session().unwrap().breadcrumbs.len(), 2);
    }

    #[test]
    fn successful_recalculation_swaps_route_and_keeps_history() {
        let (mut manager, t0) = started(hybrid_route());
        let far = point_north(&manager.session().unwrap().route.origin, 500.0);
        let update = manager.handle_position(fix(far, t0 + Duration::seconds(10))).unwrap();
        let request = update.recalculation.unwrap();

        let replacement = straight_route();
        let replacement_id = replacement.id.clone();
        let events = manager.finish_recalculation(&request.session_id, Ok(replacement));
        assert!(matches!(&events[0], SessionEvent::Rerouted { route_id, .. } if *route_id == replacement_id));

        let session = manager.session().unwrap();
        assert_eq!(session.current_segment_index, 0);
        assert_eq!(session.current_waypoint_index, 1);
        assert_eq!(session.breadcrumbs.len(), 1);
        assert_eq!(session.metrics.elapsed_s, 10.0);
        assert!(!session.recalculating);
    }

    #[test]
    fn failed_recalculation_moves_to_error() {
        let (mut manager, t0) = started(straight_route());
        let far = point_north(&manager.session().unwrap().route.origin, 500.0);
        let request = manager
            .handle_position(fix(far, t0))
            .unwrap()
            .recalculation
            .unwrap();
        let events = manager.finish_recalculation(
            &request.session_id,
            Err(RouteError::NoHandoffAvailable { radius_m: 50_000.0 }),
        );
        assert!(matches!(events[0], SessionEvent::Failed { .. }));
        let session = manager.session().unwrap();
        assert_eq!(session.state, SessionState::Error);
        assert!(session.failure.as_deref().unwrap().contains("no marina"));

        // Error stops the update cycle.
        let update = manager.handle_position(fix(far, t0)).unwrap();
        assert!(update.events.is_empty());
    }

    #[test]
    fn budget_exhaustion_fails_the_session() {
        let rules = NavigationRules {
            max_recalculations: 2,
            ..NavigationRules::default()
        };
        let mut manager = SessionManager::new(rules);
        let t0 = Utc::now();
        manager.start(straight_route(), t0).unwrap();
        let far = point_north(&straight_route().origin, 800.0);

        for _ in 0..2 {
            let request = manager.handle_position(fix(far, t0)).unwrap().recalculation.unwrap();
            // new route that the operator is still far from
            manager.finish_recalculation(&request.session_id, Ok(straight_route()));
        }
        let update = manager.handle_position(fix(far, t0)).unwrap();
        assert!(update.recalculation.is_none());
        assert!(matches!(update.events.last(), Some(SessionEvent::Failed { .. })));
        assert_eq!(manager.session().unwrap().state, SessionState::Error);
    }

    #[test]
    fn on_route_fix_resets_budget() {
        let (mut manager, t0) = started(straight_route());
        let origin = manager.session().unwrap().route.origin;
        let far = point_north(&origin, 500.0);
        let request = manager.handle_position(fix(far, t0)).unwrap().recalculation.unwrap();
        manager.finish_recalculation(&request.session_id, Ok(straight_route()));
        assert_eq!(manager.session().unwrap().consecutive_recalculations, 1);

        manager
            .handle_position(fix(point_east(&origin, 300.0), t0 + Duration::seconds(30)))
            .unwrap();
        let session = manager.session().unwrap();
        assert_eq!(session.consecutive_recalculations, 0);
        assert_eq!(session.metrics.recalculations, 1);
    }

    #[test]
    fn cancelled_session_discards_late_route() {
        let (mut manager, t0) = started(straight_route());
        let far = point_north(&manager.session().unwrap().route.origin, 500.0);
        let request = manager.handle_position(fix(far, t0)).unwrap().recalculation.unwrap();
        manager.cancel().unwrap();

        let events = manager.finish_recalculation(&request.session_id, Ok(hybrid_route()));
        assert!(events.is_empty());
        let session = manager.session().unwrap();
        assert_eq!(session.state, SessionState::Cancelled);
        assert_eq!(session.route.segments.len(), 1);
    }

    #[test]
    fn handoff_advances_segment() {
        let route = hybrid_route();
        let marina = route.waypoints[1].location;
        let (mut manager, t0) = started(route);

        let update = manager
            .handle_position(fix(point_east(&marina, 10.0), t0 + Duration::seconds(100)))
            .unwrap();
        assert!(matches!(
            update.events[0],
            SessionEvent::WaypointReached { waypoint_index: 1, kind: WaypointKind::HandoffEntry, .. }
        ));
        assert!(matches!(
            update.events[1],
            SessionEvent::SegmentChanged { segment_index: 1, kind: SegmentKind::Marine, .. }
        ));
        let session = manager.session().unwrap();
        assert_eq!(session.current_segment_index, 1);
        assert_eq!(session.current_waypoint_index, 2);
    }

    #[test]
    fn arriving_at_destination_completes() {
        let route = straight_route();
        let destination = route.destination;
        let (mut manager, t0) = started(route);
        let update = manager
            .handle_position(fix(point_north(&destination, 20.0), t0 + Duration::seconds(200)))
            .unwrap();
        assert!(matches!(update.events.last(), Some(SessionEvent::Completed { .. })));
        assert_eq!(manager.session().unwrap().state, SessionState::Completed);
    }

    #[test]
    fn paused_session_ignores_fixes() {
        let (mut manager, t0) = started(straight_route());
        manager.pause().unwrap();
        assert!(matches!(manager.pause(), Err(SessionError::InvalidState(..))));
        let far = point_north(&straight_route().origin, 900.0);
        let update = manager.handle_position(fix(far, t0)).unwrap();
        assert!(update.recalculation.is_none());
        assert!(manager.session().unwrap().breadcrumbs.is_empty());

        manager.resume().unwrap();
        assert_eq!(manager.session().unwrap().state, SessionState::Active);
    }

    #[test]
    fn breadcrumbs_are_bounded_but_distance_keeps_growing() {
        let rules = NavigationRules {
            breadcrumb_capacity: 3,
            ..NavigationRules::default()
        };
        let mut manager = SessionManager::new(rules);
        let t0 = Utc::now();
        let route = straight_route();
        let origin = route.origin;
        manager.start(route, t0).unwrap();

        for step in 0..6 {
            let location = point_east(&origin, 100.0 * step as f64);
            manager
                .handle_position(fix(location, t0 + Duration::seconds(10 * step)))
                .unwrap();
        }
        let session = manager.session().unwrap();
        assert_eq!(session.breadcrumbs.len(), 3);
        assert!((session.metrics.distance_traveled_m - 500.0).abs() < 1.0);
        assert!((session.metrics.max_speed_mps - 10.0).abs() < 0.1);
        assert!((session.metrics.average_speed_mps - 10.0).abs() < 0.1);
        assert_eq!(session.metrics.elapsed_s, 50.0);
    }

    #[test]
    fn stream_failure_is_terminal() {
        let (mut manager, _) = started(straight_route());
        let events = manager.stream_failed("gps disconnected");
        assert!(matches!(&events[0], SessionEvent::Failed { reason, .. } if reason.contains("gps disconnected")));
        assert!(manager.stream_failed("again").is_empty());
        assert!(manager.resume().is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = SessionEvent::OffRoute {
            session_id: "s".to_string(),
            distance_m: 120.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "off_route");
        assert_eq!(json["distance_m"], 120.0);
    }
}

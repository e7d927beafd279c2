pub mod actor;
pub mod collaborators;
pub mod coordinator;
pub mod error;
pub mod mask;
pub mod mask_store;
pub mod models;
pub mod pathfinder;
pub mod rules;
pub mod session;
pub mod spatial;

pub use actor::{spawn_session_actor, SessionCommand, SessionHandle};
pub use collaborators::{
    InMemoryMarinas, MarinaDirectory, NoWeather, RestrictedAreaSource, RoadRoute,
    RoadRouteRequest, RoadRouter, RoadRoutingError, WeatherCostProvider,
};
pub use coordinator::{build_waypoints, classify_endpoints, CoordinatorConfig, RouteCoordinator, RoutePlanner};
pub use error::{RouteError, SessionError};
pub use mask::{
    CellKind, GeoBounds, GridCell, MaskError, MaskMetadata, MaskSnapshot, MaskStats,
    OccupancyMask, SharedMask,
};
pub use mask_store::{FileMaskStore, MaskFiles};
pub use models::{
    AccessKind, ExclusionZone, GeoPoint, Handoff, HandoffDirection, Marina, NavigationRoute,
    PositionFix, RouteMetrics, RouteSegment, RouteTopology, RouteValidation, SegmentKind,
    WeatherAssessment, WeatherSafetyLevel, Waypoint, WaypointKind,
};
pub use pathfinder::{
    find_path, search, Endpoint, MarinePath, PathfindError, PathfinderConfig, SearchFailure,
    SearchOutcome,
};
pub use rules::NavigationRules;
pub use session::{
    Breadcrumb, NavigationSession, RecalculationRequest, SessionEvent, SessionManager,
    SessionMetrics, SessionState, SessionUpdate,
};
pub use spatial::haversine_distance;

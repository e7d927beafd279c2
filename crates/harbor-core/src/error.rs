//! Failure types shared by the coordinator and the session layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::RoadRoutingError;
use crate::pathfinder::{Endpoint, PathfindError, SearchFailure};

/// Why a route could not be calculated. No partial route accompanies any of these.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{0} is not within snapping distance of navigable water")]
    EndpointUnreachable(Endpoint),
    #[error("no marine path found: {0}")]
    NoPathFound(SearchFailure),
    #[error("no marina within {radius_m:.0} m of the land endpoint")]
    NoHandoffAvailable { radius_m: f64 },
    #[error("road route unavailable: {0}")]
    RoadRouteUnavailable(#[source] RoadRoutingError),
    #[error("recalculation budget of {attempts} exhausted")]
    RecalculationExhausted { attempts: u32 },
    #[error("invalid precondition: {0}")]
    InvalidPrecondition(String),
    #[error("route planner unavailable: {0}")]
    PlannerUnavailable(String),
}

impl RouteError {
    /// Stable machine-readable code for API responses and session events.
    pub fn code(&self) -> &'static str {
        match self {
            RouteError::EndpointUnreachable(_) => "endpoint_unreachable",
            RouteError::NoPathFound(_) => "no_path_found",
            RouteError::NoHandoffAvailable { .. } => "no_handoff_available",
            RouteError::RoadRouteUnavailable(_) => "road_route_unavailable",
            RouteError::RecalculationExhausted { .. } => "recalculation_exhausted",
            RouteError::InvalidPrecondition(_) => "invalid_precondition",
            RouteError::PlannerUnavailable(_) => "planner_unavailable",
        }
    }
}

impl From<PathfindError> for RouteError {
    fn from(err: PathfindError) -> Self {
        match err {
            PathfindError::EndpointUnreachable(endpoint) => RouteError::EndpointUnreachable(endpoint),
            PathfindError::NoPathFound(failure) => RouteError::NoPathFound(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum SessionError {
    #[error("a navigation session is already running")]
    AlreadyActive,
    #[error("no navigation session")]
    NoSession,
    #[error("session is {0}, expected {1}")]
    InvalidState(String, String),
    #[error("session actor has stopped")]
    ActorStopped,
}

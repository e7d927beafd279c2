//! Route planning endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use harbor_core::{GeoPoint, NavigationRoute};

use crate::api::error::{bad_request, route_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

impl RouteRequest {
    fn check(&self) -> Result<(), ApiError> {
        for (label, point) in [("origin", &self.origin), ("destination", &self.destination)] {
            if !point.is_valid_coordinate() {
                return Err(bad_request(format!("{label} is not a valid coordinate")));
            }
        }
        Ok(())
    }
}

/// Plan a route, choosing land, marine, or hybrid legs from the endpoints.
pub async fn calculate_route(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<NavigationRoute>, ApiError> {
    req.check()?;
    state
        .coordinator()
        .calculate_route(req.origin, req.destination)
        .await
        .map(Json)
        .map_err(|err| {
            tracing::info!("Route request failed: {}", err);
            route_error(&err)
        })
}

/// Strict land-origin, water-destination variant.
pub async fn calculate_land_to_sea(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<NavigationRoute>, ApiError> {
    req.check()?;
    state
        .coordinator()
        .calculate_land_to_sea(req.origin, req.destination)
        .await
        .map(Json)
        .map_err(|err| route_error(&err))
}

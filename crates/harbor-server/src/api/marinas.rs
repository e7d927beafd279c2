//! Marina lookup endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use harbor_core::{GeoPoint, Marina, MarinaDirectory};

use crate::api::error::{bad_request, not_found, ApiError};
use crate::state::AppState;

pub async fn list_marinas(State(state): State<Arc<AppState>>) -> Json<Vec<Marina>> {
    Json(state.marinas().all().to_vec())
}

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub lon: f64,
    pub lat: f64,
    /// Defaults to the coordinator's hand-off search radius
    pub radius_m: Option<f64>,
}

pub async fn nearest_marina(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearestQuery>,
) -> Result<Json<Marina>, ApiError> {
    let point = GeoPoint::new(query.lat, query.lon);
    if !point.is_finite() {
        return Err(bad_request("lon and lat must be finite"));
    }
    let radius_m = query
        .radius_m
        .unwrap_or(state.config().coordinator.marina_search_radius_m);
    state
        .marinas()
        .nearest_to(&point, radius_m)
        .map(Json)
        .ok_or_else(|| not_found(format!("no marina within {radius_m:.0} m")))
}

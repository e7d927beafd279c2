//! Restricted area endpoints. Zones take effect on the next route request.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use harbor_core::{ExclusionZone, GeoPoint};

use crate::api::error::{bad_request, internal, not_found, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRestrictedAreaRequest {
    pub name: String,
    pub ring: Vec<GeoPoint>,
}

pub async fn create_restricted_area(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRestrictedAreaRequest>,
) -> Result<(StatusCode, Json<ExclusionZone>), ApiError> {
    let zone = ExclusionZone::new(Uuid::new_v4().to_string(), req.name, req.ring);
    let errors = zone.validate();
    if !errors.is_empty() {
        return Err(bad_request(errors.join("; ")));
    }

    state
        .add_restricted_area(zone.clone())
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(zone)))
}

pub async fn list_restricted_areas(State(state): State<Arc<AppState>>) -> Json<Vec<ExclusionZone>> {
    Json(state.restricted_areas().list())
}

pub async fn delete_restricted_area(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.remove_restricted_area(&id).await.map_err(internal)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("restricted area {id} not found")))
    }
}

//! Occupancy mask endpoints: point checks, statistics, brush edits,
//! validation, and persistence.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use harbor_core::{CellKind, GeoBounds, GeoPoint, MaskStats, RouteValidation};

use crate::api::error::{bad_request, internal, mask_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    pub lon: f64,
    pub lat: f64,
}

fn check_coordinate(lon: f64, lat: f64) -> Result<(), ApiError> {
    if GeoPoint::new(lat, lon).is_valid_coordinate() {
        Ok(())
    } else {
        Err(bad_request("lon must be within ±180 and lat within ±90"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointCheckResponse {
    pub navigable: bool,
    /// Nearest water within the snap radius; the point itself when navigable
    pub nearest: Option<GeoPoint>,
}

pub async fn check_point(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PointQuery>,
) -> Result<Json<PointCheckResponse>, ApiError> {
    check_coordinate(query.lon, query.lat)?;
    let radius = state.config().coordinator.pathfinder.snap_radius_cells;
    let mask = state.mask().read();
    Ok(Json(PointCheckResponse {
        navigable: mask.is_navigable(query.lon, query.lat),
        nearest: mask.find_nearest_navigable(query.lon, query.lat, radius),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaskSummary {
    pub bounds: GeoBounds,
    pub stats: MaskStats,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<MaskSummary> {
    let mask = state.mask().read();
    Json(MaskSummary {
        bounds: *mask.bounds(),
        stats: mask.stats(),
    })
}

#[derive(Debug, Deserialize)]
pub struct PaintRequest {
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub radius_cells: usize,
    /// Paint water when true, land when false
    pub water: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaintResponse {
    pub affected_cells: usize,
    pub bounds: GeoBounds,
}

/// Apply a circular brush. The mask grows when the brush lands outside it.
/// Edits stay in memory until `/v1/mask/save`.
pub async fn paint(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaintRequest>,
) -> Result<Json<PaintResponse>, ApiError> {
    let max_radius = state.config().max_brush_radius_cells;
    if req.radius_cells > max_radius {
        return Err(bad_request(format!(
            "radius_cells must be at most {max_radius}"
        )));
    }
    check_coordinate(req.lon, req.lat)?;
    let kind = CellKind::from_navigable(req.water);

    // The write guard waits for any marine search holding a read guard.
    let mask = state.mask().clone();
    let (affected, bounds) = tokio::task::spawn_blocking(move || {
        let mut mask = mask.write();
        mask.paint_circular_brush(req.lon, req.lat, req.radius_cells, kind)
            .map(|affected| (affected.len(), *mask.bounds()))
    })
    .await
    .map_err(|err| internal(err.into()))?
    .map_err(|err| mask_error(&err))?;

    tracing::debug!(
        "Painted {} cells as {:?} at ({:.5}, {:.5})",
        affected,
        kind,
        req.lon,
        req.lat
    );
    Ok(Json(PaintResponse {
        affected_cells: affected,
        bounds,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub points: Vec<GeoPoint>,
}

pub async fn validate_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateRequest>,
) -> Json<RouteValidation> {
    Json(state.mask().read().validate_route(&req.points))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: bool,
    pub width: usize,
    pub height: usize,
    pub checksum: Option<u64>,
}

pub async fn save(State(state): State<Arc<AppState>>) -> Result<Json<SaveResponse>, ApiError> {
    let snapshot = state.save_mask().await.map_err(internal)?;
    Ok(Json(SaveResponse {
        saved: true,
        width: snapshot.metadata.grid.width,
        height: snapshot.metadata.grid.height,
        checksum: snapshot.metadata.checksum,
    }))
}

pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<MaskSummary>, ApiError> {
    let mask = state.reset_mask().await.map_err(internal)?;
    Ok(Json(MaskSummary {
        bounds: *mask.bounds(),
        stats: mask.stats(),
    }))
}

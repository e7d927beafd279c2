//! Navigation session endpoints. One session at a time, driven by position
//! fixes posted from the client.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use harbor_core::{NavigationRoute, NavigationSession, PositionFix};

use crate::api::error::{bad_request, not_found, session_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub route: NavigationRoute,
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<NavigationSession>), ApiError> {
    if req.route.waypoints.is_empty() || req.route.segments.is_empty() {
        return Err(bad_request("route has no waypoints or segments"));
    }
    let session = state
        .sessions()
        .start(req.route)
        .await
        .map_err(|err| session_error(&err))?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn current_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NavigationSession>, ApiError> {
    state
        .sessions()
        .current()
        .map(Json)
        .ok_or_else(|| not_found("no navigation session"))
}

pub async fn update_position(
    State(state): State<Arc<AppState>>,
    Json(fix): Json<PositionFix>,
) -> Result<StatusCode, ApiError> {
    if !fix.location.is_finite() {
        return Err(bad_request("location must be finite"));
    }
    state
        .sessions()
        .update_position(fix)
        .await
        .map_err(|err| session_error(&err))?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn pause_session(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state
        .sessions()
        .pause()
        .await
        .map_err(|err| session_error(&err))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_session(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state
        .sessions()
        .resume()
        .await
        .map_err(|err| session_error(&err))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_session(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state
        .sessions()
        .cancel()
        .await
        .map_err(|err| session_error(&err))?;
    Ok(StatusCode::NO_CONTENT)
}

//! Router assembly.

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::{marinas, mask, planning, restricted_areas, sessions, weather, ws};
use crate::state::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        // Route planning
        .route("/v1/routes", post(planning::calculate_route))
        .route("/v1/routes/land-to-sea", post(planning::calculate_land_to_sea))
        // Occupancy mask
        .route("/v1/mask/check", get(mask::check_point))
        .route("/v1/mask/stats", get(mask::stats))
        .route("/v1/mask/paint", post(mask::paint))
        .route("/v1/mask/validate", post(mask::validate_points))
        .route("/v1/mask/save", post(mask::save))
        .route("/v1/mask/reset", post(mask::reset))
        // Restricted areas
        .route(
            "/v1/restricted-areas",
            get(restricted_areas::list_restricted_areas)
                .post(restricted_areas::create_restricted_area),
        )
        .route(
            "/v1/restricted-areas/:id",
            delete(restricted_areas::delete_restricted_area),
        )
        // Weather
        .route(
            "/v1/weather",
            get(weather::list_weather).put(weather::put_weather),
        )
        // Marinas
        .route("/v1/marinas", get(marinas::list_marinas))
        .route("/v1/marinas/nearest", get(marinas::nearest_marina))
        // Navigation session
        .route("/v1/sessions", post(sessions::start_session))
        .route("/v1/sessions/current", get(sessions::current_session))
        .route("/v1/sessions/position", post(sessions::update_position))
        .route("/v1/sessions/pause", post(sessions::pause_session))
        .route("/v1/sessions/resume", post(sessions::resume_session))
        .route("/v1/sessions/cancel", post(sessions::cancel_session))
        .route("/v1/sessions/stream", get(ws::session_stream))
}

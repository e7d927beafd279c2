//! HTTP API for the navigation server.

pub mod error;
pub mod marinas;
pub mod mask;
pub mod planning;
pub mod restricted_areas;
mod routes;
pub mod sessions;
pub mod weather;
pub mod ws;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::state::AppState>> {
    routes::create_router()
}

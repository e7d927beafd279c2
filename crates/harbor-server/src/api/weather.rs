//! Weather cost inputs on the coarse weather grid.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::{AppState, WeatherReport};

#[derive(Debug, Deserialize)]
pub struct PutWeatherRequest {
    pub cells: Vec<WeatherReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutWeatherResponse {
    pub accepted: usize,
    pub total: usize,
}

pub async fn put_weather(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PutWeatherRequest>,
) -> Json<PutWeatherResponse> {
    let accepted = state.weather().upsert(req.cells);
    tracing::debug!("Accepted {} weather cells", accepted);
    Json(PutWeatherResponse {
        accepted,
        total: state.weather().len(),
    })
}

pub async fn list_weather(State(state): State<Arc<AppState>>) -> Json<Vec<WeatherReport>> {
    Json(state.weather().reports())
}

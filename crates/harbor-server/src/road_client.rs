//! OSRM-compatible road routing client.
//!
//! Requests `{base}/route/v1/{profile}/{lon},{lat};{lon},{lat}` with full
//! GeoJSON geometry. Transport failures, timeouts, and 5xx/429 responses are
//! retried with exponential backoff; everything else fails immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use harbor_core::{GeoPoint, RoadRoute, RoadRouteRequest, RoadRouter, RoadRoutingError};

use crate::backoff::Backoff;
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct OsrmClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl OsrmClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.road_timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.road_base_url.trim_end_matches('/').to_string(),
            max_attempts: config.road_max_attempts.max(1),
            backoff_base: Duration::from_millis(config.road_backoff_base_ms),
            backoff_max: Duration::from_millis(config.road_backoff_max_ms),
        })
    }

    pub fn route_url(&self, request: &RoadRouteRequest) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url,
            request.profile,
            request.origin.lon,
            request.origin.lat,
            request.destination.lon,
            request.destination.lat,
        )
    }

    async fn route_once(&self, request: &RoadRouteRequest) -> Result<RoadRoute, RoadRoutingError> {
        let response = self
            .client
            .get(self.route_url(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            // OSRM reports unroutable pairs as a 400 with code "NoRoute".
            if let Ok(parsed) = serde_json::from_str::<OsrmResponse>(&body) {
                if parsed.code == "NoRoute" {
                    return Err(RoadRoutingError::NoRoute);
                }
            }
            return Err(RoadRoutingError::Upstream {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        parse_route_body(&body, request)
    }
}

#[async_trait]
impl RoadRouter for OsrmClient {
    async fn route(&self, request: &RoadRouteRequest) -> Result<RoadRoute, RoadRoutingError> {
        let mut backoff = Backoff::new(self.backoff_base, self.backoff_max);
        loop {
            match self.route_once(request).await {
                Ok(route) => return Ok(route),
                Err(err) if err.is_retryable() && backoff.failures() + 1 < self.max_attempts => {
                    let delay = backoff.fail();
                    tracing::warn!(
                        "Road routing attempt {} failed ({}); retrying in {:?}",
                        backoff.failures(),
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn transport_error(err: reqwest::Error) -> RoadRoutingError {
    if err.is_timeout() {
        RoadRoutingError::Timeout
    } else {
        RoadRoutingError::Transport(err.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// Decode a successful OSRM body into the first route it offers.
pub fn parse_route_body(
    body: &str,
    request: &RoadRouteRequest,
) -> Result<RoadRoute, RoadRoutingError> {
    let parsed: OsrmResponse =
        serde_json::from_str(body).map_err(|e| RoadRoutingError::Malformed(e.to_string()))?;

    match parsed.code.as_str() {
        "Ok" => {}
        "NoRoute" | "NoSegment" => return Err(RoadRoutingError::NoRoute),
        other => {
            return Err(RoadRoutingError::Malformed(format!(
                "{}: {}",
                other,
                parsed.message.unwrap_or_default()
            )))
        }
    }

    let route = parsed
        .routes
        .into_iter()
        .next()
        .ok_or(RoadRoutingError::NoRoute)?;
    if !(route.distance.is_finite() && route.duration.is_finite()) {
        return Err(RoadRoutingError::Malformed("non-finite distance or duration".to_string()));
    }

    let mut geometry: Vec<GeoPoint> = route
        .geometry
        .coordinates
        .iter()
        .map(|[lon, lat]| GeoPoint::new(*lat, *lon))
        .collect();
    if geometry.len() < 2 {
        geometry = vec![request.origin, request.destination];
    }

    Ok(RoadRoute {
        distance_m: route.distance,
        duration_s: route.duration,
        geometry,
    })
}

//! Server configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use harbor_core::{CoordinatorConfig, NavigationRules};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Directory holding `default_mask.bin` + `default_mask_metadata.json`
    pub mask_dir: String,
    pub marinas_path: String,
    /// Base URL of the OSRM-compatible road router
    pub road_base_url: String,
    pub road_timeout_ms: u64,
    pub road_max_attempts: u32,
    pub road_backoff_base_ms: u64,
    pub road_backoff_max_ms: u64,
    /// Edge length of one weather cell, degrees
    pub weather_cell_deg: f64,
    pub weather_ttl_s: u64,
    pub weather_max_entries: usize,
    pub weather_prune_interval_s: u64,
    pub max_brush_radius_cells: usize,
    /// Empty means permissive CORS
    pub cors_allowed_origins: Vec<String>,
    pub coordinator: CoordinatorConfig,
    pub rules: NavigationRules,
}

impl Config {
    pub fn from_env() -> Self {
        let mut coordinator = CoordinatorConfig::default();
        coordinator.marina_search_radius_m =
            env_or("HARBOR_MARINA_RADIUS_M", coordinator.marina_search_radius_m);
        if let Ok(profile) = env::var("HARBOR_ROAD_PROFILE") {
            coordinator.road_profile = profile;
        }
        coordinator.pathfinder.snap_radius_cells =
            env_or("HARBOR_SNAP_RADIUS_CELLS", coordinator.pathfinder.snap_radius_cells);
        coordinator.pathfinder.max_iterations =
            env_or("HARBOR_MAX_ITERATIONS", coordinator.pathfinder.max_iterations);
        coordinator.pathfinder.timeout_ms =
            env_or("HARBOR_SEARCH_TIMEOUT_MS", coordinator.pathfinder.timeout_ms);
        coordinator.pathfinder.marine_speed_mps =
            env_or("HARBOR_MARINE_SPEED_MPS", coordinator.pathfinder.marine_speed_mps);
        coordinator.pathfinder.simplify = env_flag("HARBOR_SIMPLIFY_PATHS");

        let mut rules = NavigationRules::default();
        rules.arrival_threshold_m = env_or("HARBOR_ARRIVAL_THRESHOLD_M", rules.arrival_threshold_m);
        rules.off_route_threshold_m =
            env_or("HARBOR_OFF_ROUTE_THRESHOLD_M", rules.off_route_threshold_m);
        rules.breadcrumb_capacity = env_or("HARBOR_BREADCRUMB_CAPACITY", rules.breadcrumb_capacity);
        rules.max_recalculations = env_or("HARBOR_MAX_RECALCULATIONS", rules.max_recalculations);

        Self {
            server_port: env_or("HARBOR_PORT", 3000),
            database_path: env::var("HARBOR_DB_PATH")
                .unwrap_or_else(|_| "data/harbor.db".to_string()),
            database_max_connections: env_or("HARBOR_DB_MAX_CONNECTIONS", 4),
            mask_dir: env::var("HARBOR_MASK_DIR").unwrap_or_else(|_| "assets".to_string()),
            marinas_path: env::var("HARBOR_MARINAS_PATH")
                .unwrap_or_else(|_| "assets/marinas.json".to_string()),
            road_base_url: env::var("HARBOR_ROAD_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            road_timeout_ms: env_or("HARBOR_ROAD_TIMEOUT_MS", 10_000),
            road_max_attempts: env_or("HARBOR_ROAD_MAX_ATTEMPTS", 3),
            road_backoff_base_ms: env_or("HARBOR_ROAD_BACKOFF_BASE_MS", 250),
            road_backoff_max_ms: env_or("HARBOR_ROAD_BACKOFF_MAX_MS", 2_000),
            weather_cell_deg: env_or("HARBOR_WEATHER_CELL_DEG", 0.05),
            weather_ttl_s: env_or("HARBOR_WEATHER_TTL_S", 1_800),
            weather_max_entries: env_or("HARBOR_WEATHER_MAX_ENTRIES", 10_000),
            weather_prune_interval_s: env_or("HARBOR_WEATHER_PRUNE_INTERVAL_S", 60),
            max_brush_radius_cells: env_or("HARBOR_MAX_BRUSH_RADIUS", 100),
            cors_allowed_origins: env::var("HARBOR_CORS_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            coordinator,
            rules,
        }
    }

    pub fn road_timeout(&self) -> Duration {
        Duration::from_millis(self.road_timeout_ms)
    }

    pub fn weather_ttl(&self) -> Duration {
        Duration::from_secs(self.weather_ttl_s)
    }

    /// Human-readable problems with the loaded values.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.rules.validate();
        if self.road_max_attempts == 0 {
            errors.push("HARBOR_ROAD_MAX_ATTEMPTS must be at least 1".to_string());
        }
        if !(self.weather_cell_deg.is_finite() && self.weather_cell_deg > 0.0) {
            errors.push("HARBOR_WEATHER_CELL_DEG must be positive".to_string());
        }
        if self.coordinator.marina_search_radius_m <= 0.0 {
            errors.push("HARBOR_MARINA_RADIUS_M must be positive".to_string());
        }
        errors
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::from_env();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert!(config.road_max_attempts >= 1);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = Config::from_env();
        config.road_max_attempts = 0;
        assert!(config
            .validate()
            .iter()
            .any(|e| e.contains("HARBOR_ROAD_MAX_ATTEMPTS")));
    }
}

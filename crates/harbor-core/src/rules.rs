//! Navigation rules and thresholds for live sessions.

use serde::{Deserialize, Serialize};

/// Thresholds applied by the session manager to every position fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationRules {
    /// Distance at which a waypoint (or the destination) counts as reached, meters
    pub arrival_threshold_m: f64,
    /// Distance from the active segment beyond which a recalculation is triggered, meters
    pub off_route_threshold_m: f64,
    /// Maximum breadcrumbs retained; oldest are dropped first
    pub breadcrumb_capacity: usize,
    /// Consecutive recalculations allowed before the session fails
    pub max_recalculations: u32,
}

impl Default for NavigationRules {
    fn default() -> Self {
        Self {
            arrival_threshold_m: 50.0,
            off_route_threshold_m: 100.0,
            breadcrumb_capacity: 500,
            max_recalculations: 3,
        }
    }
}

impl NavigationRules {
    /// Reject thresholds the session state machine cannot work with.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.arrival_threshold_m.is_finite() && self.arrival_threshold_m > 0.0) {
            errors.push("arrival_threshold_m must be a positive distance".to_string());
        }
        if !(self.off_route_threshold_m.is_finite() && self.off_route_threshold_m > 0.0) {
            errors.push("off_route_threshold_m must be a positive distance".to_string());
        }
        if self.breadcrumb_capacity < 2 {
            errors.push("breadcrumb_capacity must retain at least 2 fixes".to_string());
        }
        errors
    }
}

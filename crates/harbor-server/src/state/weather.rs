//! Weather assessments on a coarse lat/lon grid.
//!
//! The mask is far finer than any weather feed, so each report covers a
//! square of `cell_deg` degrees. Entries expire after the TTL; expired
//! entries read as "no data" even before the prune loop removes them.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use harbor_core::{GeoBounds, GeoPoint, GridCell, WeatherAssessment, WeatherCostProvider, WeatherSafetyLevel};

/// One coarse-cell report as accepted and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub lat: f64,
    pub lon: f64,
    pub level: WeatherSafetyLevel,
    #[serde(default = "default_multiplier")]
    pub cost_multiplier: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
struct WeatherEntry {
    assessment: WeatherAssessment,
    updated_at: DateTime<Utc>,
    received_at: Instant,
}

pub struct WeatherStore {
    entries: DashMap<(i64, i64), WeatherEntry>,
    cell_deg: f64,
    ttl: Duration,
    max_entries: usize,
}

impl WeatherStore {
    pub fn new(cell_deg: f64, ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            cell_deg,
            ttl,
            max_entries,
        }
    }

    fn key(&self, lat: f64, lon: f64) -> (i64, i64) {
        (
            (lat / self.cell_deg).floor() as i64,
            (lon / self.cell_deg).floor() as i64,
        )
    }

    fn key_center(&self, key: (i64, i64)) -> GeoPoint {
        GeoPoint::new(
            (key.0 as f64 + 0.5) * self.cell_deg,
            (key.1 as f64 + 0.5) * self.cell_deg,
        )
    }

    /// Store reports, replacing whatever covered the same coarse cells.
    /// Returns how many were accepted; non-finite coordinates are skipped.
    pub fn upsert(&self, reports: Vec<WeatherReport>) -> usize {
        let now = Instant::now();
        let mut accepted = 0;
        for report in reports {
            if !(report.lat.is_finite() && report.lon.is_finite()) {
                continue;
            }
            let key = self.key(report.lat, report.lon);
            self.entries.insert(
                key,
                WeatherEntry {
                    assessment: WeatherAssessment {
                        level: report.level,
                        cost_multiplier: report.cost_multiplier,
                    },
                    updated_at: report.updated_at.unwrap_or_else(Utc::now),
                    received_at: now,
                },
            );
            accepted += 1;
        }
        accepted
    }

    /// Current, unexpired reports keyed to their coarse-cell centers.
    pub fn reports(&self) -> Vec<WeatherReport> {
        let now = Instant::now();
        let mut reports: Vec<WeatherReport> = self
            .entries
            .iter()
            .filter(|entry| now.duration_since(entry.received_at) <= self.ttl)
            .map(|entry| {
                let center = self.key_center(*entry.key());
                WeatherReport {
                    lat: center.lat,
                    lon: center.lon,
                    level: entry.assessment.level,
                    cost_multiplier: entry.assessment.cost_multiplier,
                    updated_at: Some(entry.updated_at),
                }
            })
            .collect();
        reports.sort_by(|a, b| a.lat.total_cmp(&b.lat).then(a.lon.total_cmp(&b.lon)));
        reports
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, then the oldest ones beyond capacity.
    /// Returns how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.received_at) <= self.ttl);

        if self.entries.len() > self.max_entries {
            let mut by_age: Vec<((i64, i64), Instant)> = self
                .entries
                .iter()
                .map(|entry| (*entry.key(), entry.received_at))
                .collect();
            by_age.sort_by_key(|(_, received_at)| *received_at);
            let excess = self.entries.len() - self.max_entries;
            for (key, _) in by_age.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }
        before.saturating_sub(self.entries.len())
    }
}

impl WeatherCostProvider for WeatherStore {
    fn assessment_for(&self, cell: GridCell, bounds: &GeoBounds) -> Option<WeatherAssessment> {
        let center = bounds.cell_center(cell);
        let entry = self.entries.get(&self.key(center.lat, center.lon))?;
        if entry.received_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.assessment)
    }
}

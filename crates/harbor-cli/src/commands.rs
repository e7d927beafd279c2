//! Command implementations. Each returns a serializable report; the binary
//! decides whether to print it as JSON or text.

use std::fmt;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use harbor_core::{
    find_path, CellKind, FileMaskStore, GeoBounds, GeoPoint, GridCell, MaskStats, NoWeather,
    OccupancyMask, PathfinderConfig, RouteValidation,
};

/// Samples per segment when checking the legs between validated points.
const SEGMENT_SAMPLES: usize = 10;

/// Parse `lon,lat`.
pub fn parse_point(text: &str) -> Result<GeoPoint> {
    let (lon, lat) = text
        .split_once(',')
        .with_context(|| format!("expected lon,lat but got {text:?}"))?;
    let lon: f64 = lon.trim().parse().with_context(|| format!("bad longitude in {text:?}"))?;
    let lat: f64 = lat.trim().parse().with_context(|| format!("bad latitude in {text:?}"))?;
    checked_point(lon, lat).with_context(|| format!("in {text:?}"))
}

/// Reject coordinates off the globe before they reach the mask.
pub fn checked_point(lon: f64, lat: f64) -> Result<GeoPoint> {
    let point = GeoPoint::new(lat, lon);
    if !point.is_valid_coordinate() {
        bail!("lon must be within ±180 and lat within ±90, got ({lon}, {lat})");
    }
    Ok(point)
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub source: &'static str,
    pub bounds: GeoBounds,
    pub stats: MaskStats,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bounds;
        writeln!(f, "Mask ({} copy)", self.source)?;
        writeln!(
            f,
            "  Bounds: lon {:.5}..{:.5}, lat {:.5}..{:.5}",
            b.min_lon, b.max_lon, b.min_lat, b.max_lat
        )?;
        writeln!(f, "  Grid: {}x{} @ {}°", b.width, b.height, b.resolution_deg)?;
        writeln!(
            f,
            "  Water: {} cells ({:.1}%, {:.2} km²)",
            self.stats.water_cells, self.stats.water_percentage, self.stats.water_area_km2
        )?;
        write!(
            f,
            "  Land:  {} cells ({:.2} km²)",
            self.stats.land_cells, self.stats.land_area_km2
        )
    }
}

pub fn stats(store: &FileMaskStore) -> Result<StatsReport> {
    let mask = store.load()?;
    Ok(StatsReport {
        source: if store.has_user_mask() { "user" } else { "default" },
        bounds: *mask.bounds(),
        stats: mask.stats(),
    })
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub lon: f64,
    pub lat: f64,
    pub navigable: bool,
    pub cell: Option<GridCell>,
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.navigable { "water" } else { "not navigable" };
        match self.cell {
            Some(cell) => write!(
                f,
                "({}, {}) is {} [row {}, col {}]",
                self.lon, self.lat, verdict, cell.row, cell.col
            ),
            None => write!(f, "({}, {}) is outside the mask", self.lon, self.lat),
        }
    }
}

pub fn check(mask: &OccupancyMask, lon: f64, lat: f64) -> CheckReport {
    CheckReport {
        lon,
        lat,
        navigable: mask.is_navigable(lon, lat),
        cell: mask.cell_for(lon, lat),
    }
}

#[derive(Debug, Serialize)]
pub struct NearestReport {
    pub origin: GeoPoint,
    pub nearest: Option<GeoPoint>,
    pub distance_m: Option<f64>,
}

impl fmt::Display for NearestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.nearest, self.distance_m) {
            (Some(point), Some(distance)) => write!(
                f,
                "Nearest water: ({:.6}, {:.6}), {:.0} m away",
                point.lon, point.lat, distance
            ),
            _ => write!(f, "No water within the search radius"),
        }
    }
}

pub fn nearest(mask: &OccupancyMask, lon: f64, lat: f64, radius_cells: usize) -> NearestReport {
    let origin = GeoPoint::new(lat, lon);
    let nearest = mask.find_nearest_navigable(lon, lat, radius_cells);
    NearestReport {
        origin,
        nearest,
        distance_m: nearest.map(|point| origin.distance_to(&point)),
    }
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub distance_m: f64,
    pub duration_s: f64,
    pub cells: usize,
    pub nodes_visited: usize,
    pub points: Vec<GeoPoint>,
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Marine path: {:.0} m, ~{:.0} min, {} points ({} nodes visited)",
            self.distance_m,
            self.duration_s / 60.0,
            self.points.len(),
            self.nodes_visited
        )?;
        for point in &self.points {
            writeln!(f, "  {:.6},{:.6}", point.lon, point.lat)?;
        }
        Ok(())
    }
}

/// Water-only path between two points on the stored mask.
pub fn plan(
    mask: &OccupancyMask,
    from: GeoPoint,
    to: GeoPoint,
    config: &PathfinderConfig,
) -> Result<PlanReport> {
    let path = find_path(mask, &from, &to, &[], &NoWeather, config)?;
    Ok(PlanReport {
        distance_m: path.distance_m,
        duration_s: path.duration_s,
        cells: path.cells.len(),
        nodes_visited: path.nodes_visited,
        points: path.points,
    })
}

#[derive(Debug, Serialize)]
pub struct PaintReport {
    pub affected_cells: usize,
    pub kind: CellKind,
    pub bounds: GeoBounds,
    pub grew: bool,
}

impl fmt::Display for PaintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Painted {} cells as {:?}; mask is now {}x{}{}",
            self.affected_cells,
            self.kind,
            self.bounds.width,
            self.bounds.height,
            if self.grew { " (grown)" } else { "" }
        )
    }
}

/// Paint a brush onto the current mask and save it as the user copy.
pub fn paint(
    store: &FileMaskStore,
    lon: f64,
    lat: f64,
    radius_cells: usize,
    kind: CellKind,
) -> Result<PaintReport> {
    checked_point(lon, lat)?;
    let mut mask = store.load()?;
    let before = *mask.bounds();
    let affected = mask.paint_circular_brush(lon, lat, radius_cells, kind)?;
    store.save(&mask)?;
    Ok(PaintReport {
        affected_cells: affected.len(),
        kind,
        bounds: *mask.bounds(),
        grew: *mask.bounds() != before,
    })
}

pub fn reset(store: &FileMaskStore) -> Result<StatsReport> {
    let mask = store.reset()?;
    Ok(StatsReport {
        source: "default",
        bounds: *mask.bounds(),
        stats: mask.stats(),
    })
}

#[derive(Debug, Serialize)]
pub struct ValidateReport {
    #[serde(flatten)]
    pub validation: RouteValidation,
    /// Legs between consecutive points that cross land
    pub invalid_segments: Vec<usize>,
}

impl fmt::Display for ValidateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.validation;
        writeln!(
            f,
            "{}: {}/{} points on water",
            if v.is_valid && self.invalid_segments.is_empty() { "VALID" } else { "INVALID" },
            v.water_points,
            v.total_points
        )?;
        if !v.land_point_indices.is_empty() {
            writeln!(f, "  Land points: {:?}", v.land_point_indices)?;
        }
        if !self.invalid_segments.is_empty() {
            writeln!(f, "  Segments crossing land: {:?}", self.invalid_segments)?;
        }
        Ok(())
    }
}

pub fn validate(mask: &OccupancyMask, points: &[GeoPoint]) -> ValidateReport {
    ValidateReport {
        validation: mask.validate_route(points),
        invalid_segments: mask.invalid_segments(points, SEGMENT_SAMPLES),
    }
}

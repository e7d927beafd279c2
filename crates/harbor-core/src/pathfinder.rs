//! Weighted A* over the occupancy mask.
//!
//! Cells are 8-connected. Land, restricted polygons, and weather-blocked cells
//! are rejected before they reach the frontier; weather elsewhere only scales
//! the edge cost. The heuristic is Euclidean distance in cell units, which
//! treats cells as locally square.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::WeatherCostProvider;
use crate::mask::{GridCell, OccupancyMask};
use crate::models::{path_length_m, ExclusionZone, GeoPoint, RouteSegment, SegmentKind};

const NEIGHBORS: [(i64, i64); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Iterations between wall-clock checks.
const CLOCK_CHECK_INTERVAL: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathfinderConfig {
    /// Ring-search radius used to snap endpoints onto water
    pub snap_radius_cells: usize,
    /// Cost of a diagonal step relative to an orthogonal one
    pub diagonal_cost: f64,
    /// Nodes expanded before the search gives up
    pub max_iterations: usize,
    /// Wall-clock budget for one search
    pub timeout_ms: u64,
    /// Average vessel speed used for durations
    pub marine_speed_mps: f64,
    /// Drop intermediate cells that continue a straight run
    pub simplify: bool,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            snap_radius_cells: 50,
            diagonal_cost: std::f64::consts::SQRT_2,
            max_iterations: 250_000,
            timeout_ms: 5_000,
            marine_speed_mps: 10.0,
            simplify: false,
        }
    }
}

/// Why the raw search stopped without reaching the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFailure {
    #[error("every reachable cell was explored without reaching the goal")]
    FrontierExhausted,
    #[error("iteration cap reached")]
    IterationCap,
    #[error("search timed out")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Origin,
    Destination,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Origin => f.write_str("origin"),
            Endpoint::Destination => f.write_str("destination"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathfindError {
    #[error("{0} is not within snapping distance of navigable water")]
    EndpointUnreachable(Endpoint),
    #[error("no marine path found: {0}")]
    NoPathFound(#[from] SearchFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub cells: Vec<GridCell>,
    pub cost: f64,
    pub nodes_visited: usize,
}

/// A marine path with its geometry already in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarinePath {
    pub cells: Vec<GridCell>,
    pub points: Vec<GeoPoint>,
    pub cost: f64,
    pub nodes_visited: usize,
    pub distance_m: f64,
    pub duration_s: f64,
}

impl MarinePath {
    pub fn into_segment(self) -> RouteSegment {
        RouteSegment::new(SegmentKind::Marine, self.points, self.distance_m, self.duration_s)
    }
}

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    cell: GridCell,
    g_score: FloatOrd,
    f_score: FloatOrd,
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_score
            .cmp(&other.f_score)
            // deeper nodes first on ties
            .then_with(|| other.g_score.cmp(&self.g_score))
            .then_with(|| self.cell.cmp(&other.cell))
    }
}

/// Exclusion zone with its bounding box, so the ray cast only runs for
/// candidate cells inside it.
struct PreparedZone<'a> {
    zone: &'a ExclusionZone,
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl<'a> PreparedZone<'a> {
    fn new(zone: &'a ExclusionZone) -> Option<Self> {
        if zone.ring.len() < 3 {
            return None;
        }
        let mut prepared = Self {
            zone,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
        };
        for vertex in &zone.ring {
            prepared.min_lat = prepared.min_lat.min(vertex.lat);
            prepared.max_lat = prepared.max_lat.max(vertex.lat);
            prepared.min_lon = prepared.min_lon.min(vertex.lon);
            prepared.max_lon = prepared.max_lon.max(vertex.lon);
        }
        Some(prepared)
    }

    fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && self.zone.contains(point)
    }
}

struct CostField<'a> {
    mask: &'a OccupancyMask,
    zones: Vec<PreparedZone<'a>>,
    weather: &'a dyn WeatherCostProvider,
}

impl CostField<'_> {
    /// Movement multiplier for entering `cell`, or `None` when it is hard-blocked.
    fn entry_multiplier(&self, cell: GridCell) -> Option<f64> {
        if !self.mask.is_cell_navigable(cell) {
            return None;
        }
        let center = self.mask.cell_center(cell);
        if self.zones.iter().any(|zone| zone.contains(&center)) {
            return None;
        }
        match self.weather.assessment_for(cell, self.mask.bounds()) {
            Some(assessment) if assessment.is_blocked() => None,
            Some(assessment) => Some(assessment.effective_multiplier()),
            None => Some(1.0),
        }
    }
}

fn heuristic(from: GridCell, to: GridCell, scale: f64) -> f64 {
    let dr = (from.row - to.row) as f64;
    let dc = (from.col - to.col) as f64;
    (dr * dr + dc * dc).sqrt() * scale
}

/// Cell-level A* between two cells of the mask.
pub fn search(
    mask: &OccupancyMask,
    start: GridCell,
    goal: GridCell,
    zones: &[ExclusionZone],
    weather: &dyn WeatherCostProvider,
    config: &PathfinderConfig,
) -> Result<SearchOutcome, SearchFailure> {
    let started = Instant::now();
    let timeout = Duration::from_millis(config.timeout_ms);
    let diagonal_cost = config.diagonal_cost.max(1.0);
    // Euclidean distance overestimates when diagonals are cheaper than √2.
    let h_scale = (diagonal_cost / std::f64::consts::SQRT_2).min(1.0);

    let field = CostField {
        mask,
        zones: zones.iter().filter_map(PreparedZone::new).collect(),
        weather,
    };

    if field.entry_multiplier(start).is_none() || field.entry_multiplier(goal).is_none() {
        tracing::debug!("A* endpoint {:?} -> {:?} is hard-blocked", start, goal);
        return Err(SearchFailure::FrontierExhausted);
    }

    let mut open_set: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();
    open_set.push(Reverse(OpenNode {
        cell: start,
        g_score: FloatOrd(0.0),
        f_score: FloatOrd(heuristic(start, goal, h_scale)),
    }));
    let mut closed_set: HashSet<GridCell> = HashSet::new();
    let mut g_score: HashMap<GridCell, f64> = HashMap::new();
    let mut came_from: HashMap<GridCell, GridCell> = HashMap::new();
    g_score.insert(start, 0.0);

    let mut nodes_visited = 0usize;

    while let Some(Reverse(current)) = open_set.pop() {
        if closed_set.contains(&current.cell) {
            continue;
        }
        let best_g = g_score.get(&current.cell).copied().unwrap_or(f64::INFINITY);
        if current.g_score.0 > best_g + 1e-9 {
            continue;
        }

        nodes_visited += 1;
        if nodes_visited > config.max_iterations {
            tracing::debug!("A* hit iteration cap after {} nodes", nodes_visited - 1);
            return Err(SearchFailure::IterationCap);
        }
        if nodes_visited % CLOCK_CHECK_INTERVAL == 0 && started.elapsed() > timeout {
            tracing::debug!("A* timed out after {} nodes", nodes_visited);
            return Err(SearchFailure::Timeout);
        }

        if current.cell == goal {
            let mut cells = vec![goal];
            let mut cursor = goal;
            while let Some(previous) = came_from.get(&cursor) {
                cells.push(*previous);
                cursor = *previous;
            }
            cells.reverse();
            tracing::debug!(
                "A* reached goal: {} cells, cost {:.2}, {} nodes in {:?}",
                cells.len(),
                best_g,
                nodes_visited,
                started.elapsed()
            );
            return Ok(SearchOutcome {
                cells,
                cost: best_g,
                nodes_visited,
            });
        }

        closed_set.insert(current.cell);

        for (dr, dc) in NEIGHBORS {
            let next = current.cell.offset(dr, dc);
            if closed_set.contains(&next) {
                continue;
            }
            let Some(multiplier) = field.entry_multiplier(next) else {
                continue;
            };
            let diagonal = dr != 0 && dc != 0;
            if diagonal
                && !mask.is_cell_navigable(current.cell.offset(dr, 0))
                && !mask.is_cell_navigable(current.cell.offset(0, dc))
            {
                // no squeezing between two land corners
                continue;
            }

            let base = if diagonal { diagonal_cost } else { 1.0 };
            let tentative_g = best_g + base * multiplier;
            if tentative_g < g_score.get(&next).copied().unwrap_or(f64::INFINITY) {
                came_from.insert(next, current.cell);
                g_score.insert(next, tentative_g);
                open_set.push(Reverse(OpenNode {
                    cell: next,
                    g_score: FloatOrd(tentative_g),
                    f_score: FloatOrd(tentative_g + heuristic(next, goal, h_scale)),
                }));
            }
        }
    }

    tracing::debug!("A* frontier exhausted after {} nodes", nodes_visited);
    Err(SearchFailure::FrontierExhausted)
}

/// Snap a point onto water and return the cell it lands in.
pub fn snap_to_cell(mask: &OccupancyMask, point: &GeoPoint, radius_cells: usize) -> Option<GridCell> {
    let snapped = mask.find_nearest_navigable(point.lon, point.lat, radius_cells)?;
    mask.cell_for(snapped.lon, snapped.lat)
}

/// Drop cells that continue the previous step direction.
pub fn simplify_cells(cells: &[GridCell]) -> Vec<GridCell> {
    if cells.len() <= 2 {
        return cells.to_vec();
    }
    let mut kept = vec![cells[0]];
    for window in cells.windows(3) {
        let first = (window[1].row - window[0].row, window[1].col - window[0].col);
        let second = (window[2].row - window[1].row, window[2].col - window[1].col);
        if first != second {
            kept.push(window[1]);
        }
    }
    if let Some(last) = cells.last() {
        kept.push(*last);
    }
    kept
}

/// Plan a marine path between two geographic points.
pub fn find_path(
    mask: &OccupancyMask,
    origin: &GeoPoint,
    destination: &GeoPoint,
    zones: &[ExclusionZone],
    weather: &dyn WeatherCostProvider,
    config: &PathfinderConfig,
) -> Result<MarinePath, PathfindError> {
    let start = snap_to_cell(mask, origin, config.snap_radius_cells)
        .ok_or(PathfindError::EndpointUnreachable(Endpoint::Origin))?;
    let goal = snap_to_cell(mask, destination, config.snap_radius_cells)
        .ok_or(PathfindError::EndpointUnreachable(Endpoint::Destination))?;

    let outcome = search(mask, start, goal, zones, weather, config)?;
    let cells = if config.simplify {
        simplify_cells(&outcome.cells)
    } else {
        outcome.cells
    };
    let points: Vec<GeoPoint> = cells.iter().map(|cell| mask.cell_center(*cell)).collect();
    let distance_m = path_length_m(&points);
    let duration_s = distance_m / config.marine_speed_mps.max(0.1);

    Ok(MarinePath {
        cells,
        points,
        cost: outcome.cost,
        nodes_visited: outcome.nodes_visited,
        distance_m,
        duration_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NoWeather;
    use crate::mask::{CellKind, GeoBounds};
    use crate::models::{WeatherAssessment, WeatherSafetyLevel};

    const RES: f64 = 0.001;

    fn open_water(size: usize) -> OccupancyMask {
        OccupancyMask::filled(
            GeoBounds::new(50.0, 26.0, RES, size, size).unwrap(),
            CellKind::Water,
        )
    }

    fn zone_around(mask: &OccupancyMask, top_left: GridCell, bottom_right: GridCell) -> ExclusionZone {
        let nw = mask.cell_center(top_left);
        let se = mask.cell_center(bottom_right);
        let pad = RES * 0.4;
        ExclusionZone::new(
            "zone",
            "Box",
            vec![
                GeoPoint::new(nw.lat + pad, nw.lon - pad),
                GeoPoint::new(nw.lat + pad, se.lon + pad),
                GeoPoint::new(se.lat - pad, se.lon + pad),
                GeoPoint::new(se.lat - pad, nw.lon - pad),
            ],
        )
    }

    fn assert_steps_are_adjacent(cells: &[GridCell]) {
        for pair in cells.windows(2) {
            assert_eq!(pair[0].chebyshev_distance(pair[1]), 1, "{pair:?} is not a single step");
        }
    }

    #[test]
    fn straight_line_in_open_water() {
        let mask = open_water(10);
        let outcome = search(
            &mask,
            GridCell::new(5, 0),
            GridCell::new(5, 9),
            &[],
            &NoWeather,
            &PathfinderConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.cells.len(), 10);
        assert!((outcome.cost - 9.0).abs() < 1e-9);
    }

    #[test]
    fn diagonal_is_preferred_over_staircase() {
        let mask = open_water(10);
        let outcome = search(
            &mask,
            GridCell::new(0, 0),
            GridCell::new(9, 9),
            &[],
            &NoWeather,
            &PathfinderConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.cells.len(), 10);
        assert!((outcome.cost - 9.0 * std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn routes_around_land_wall() {
        let mut mask = open_water(10);
        for row in 0..9 {
            mask.set_cell(row, 5, CellKind::Land).unwrap();
        }
        let outcome = search(
            &mask,
            GridCell::new(0, 0),
            GridCell::new(0, 9),
            &[],
            &NoWeather,
            &PathfinderConfig::default(),
        )
        .unwrap();
        assert!(outcome.cells.iter().all(|cell| mask.is_cell_navigable(*cell)));
        assert!(outcome.cells.contains(&GridCell::new(9, 5)));
        assert_steps_are_adjacent(&outcome.cells);
    }

    #[test]
    fn does_not_cut_between_land_corners() {
        let mask = OccupancyMask::from_rows(50.0, 26.0, RES, &["~#~", "#~~", "~~~"]).unwrap();
        let outcome = search(
            &mask,
            GridCell::new(1, 1),
            GridCell::new(0, 0),
            &[],
            &NoWeather,
            &PathfinderConfig::default(),
        );
        assert_eq!(outcome, Err(SearchFailure::FrontierExhausted));
    }

    #[test]
    fn exclusion_zone_is_never_entered_and_never_cheaper() {
        let mask = open_water(12);
        let config = PathfinderConfig::default();
        let start = GridCell::new(6, 0);
        let goal = GridCell::new(6, 11);

        let free = search(&mask, start, goal, &[], &NoWeather, &config).unwrap();
        let zone = zone_around(&mask, GridCell::new(2, 4), GridCell::new(9, 7));
        let constrained = search(&mask, start, goal, &[zone.clone()], &NoWeather, &config).unwrap();

        assert!(constrained.cost >= free.cost);
        for cell in &constrained.cells {
            assert!(!zone.contains(&mask.cell_center(*cell)), "{cell:?} lies in the zone");
        }
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let mask = open_water(12);
        let zone = zone_around(&mask, GridCell::new(4, 4), GridCell::new(8, 8));
        let result = find_path(
            &mask,
            &mask.cell_center(GridCell::new(6, 1)),
            &mask.cell_center(GridCell::new(6, 6)),
            &[zone],
            &NoWeather,
            &PathfinderConfig::default(),
        );
        assert_eq!(
            result,
            Err(PathfindError::NoPathFound(SearchFailure::FrontierExhausted))
        );
    }

    struct StormColumn {
        col: i64,
        level: WeatherSafetyLevel,
        multiplier: f64,
    }

    impl WeatherCostProvider for StormColumn {
        fn assessment_for(&self, cell: GridCell, _bounds: &GeoBounds) -> Option<WeatherAssessment> {
            (cell.col == self.col).then_some(WeatherAssessment {
                level: self.level,
                cost_multiplier: self.multiplier,
            })
        }
    }

    #[test]
    fn blocked_weather_is_a_wall_and_rough_weather_is_a_cost() {
        let mask = open_water(8);
        let config = PathfinderConfig::default();
        let start = GridCell::new(3, 0);
        let goal = GridCell::new(3, 7);

        let wall = StormColumn {
            col: 4,
            level: WeatherSafetyLevel::Blocked,
            multiplier: 1.0,
        };
        assert_eq!(
            search(&mask, start, goal, &[], &wall, &config),
            Err(SearchFailure::FrontierExhausted)
        );

        let rough = StormColumn {
            col: 4,
            level: WeatherSafetyLevel::Dangerous,
            multiplier: 4.0,
        };
        let outcome = search(&mask, start, goal, &[], &rough, &config).unwrap();
        assert!((outcome.cost - 10.0).abs() < 1e-9);

        let broken = StormColumn {
            col: 4,
            level: WeatherSafetyLevel::Caution,
            multiplier: f64::INFINITY,
        };
        let outcome = search(&mask, start, goal, &[], &broken, &config).unwrap();
        assert!((outcome.cost - 7.0).abs() < 1e-9);
    }

    #[test]
    fn iteration_cap_stops_the_search() {
        let mut mask = open_water(30);
        for row in 0..30 {
            mask.set_cell(row, 20, CellKind::Land).unwrap();
        }
        let config = PathfinderConfig {
            max_iterations: 50,
            ..PathfinderConfig::default()
        };
        assert_eq!(
            search(&mask, GridCell::new(15, 0), GridCell::new(15, 29), &[], &NoWeather, &config),
            Err(SearchFailure::IterationCap)
        );
    }

    #[test]
    fn zero_timeout_stops_long_searches() {
        let mut mask = open_water(80);
        for row in 0..80 {
            mask.set_cell(row, 60, CellKind::Land).unwrap();
        }
        let config = PathfinderConfig {
            timeout_ms: 0,
            ..PathfinderConfig::default()
        };
        assert_eq!(
            search(&mask, GridCell::new(40, 0), GridCell::new(40, 79), &[], &NoWeather, &config),
            Err(SearchFailure::Timeout)
        );
    }

    #[test]
    fn land_endpoints_snap_or_fail() {
        let mut mask = OccupancyMask::filled(
            GeoBounds::new(50.0, 26.0, RES, 10, 10).unwrap(),
            CellKind::Land,
        );
        for col in 5..10 {
            for row in 0..10 {
                mask.set_cell(row, col, CellKind::Water).unwrap();
            }
        }
        let config = PathfinderConfig {
            snap_radius_cells: 2,
            ..PathfinderConfig::default()
        };
        let near_shore = mask.cell_center(GridCell::new(5, 3));
        let far_inland = mask.cell_center(GridCell::new(5, 0));
        let offshore = mask.cell_center(GridCell::new(5, 9));

        let path = find_path(&mask, &near_shore, &offshore, &[], &NoWeather, &config).unwrap();
        // ring 2 is scanned from its northern edge
        assert_eq!(path.cells.first(), Some(&GridCell::new(3, 5)));

        assert_eq!(
            find_path(&mask, &far_inland, &offshore, &[], &NoWeather, &config),
            Err(PathfindError::EndpointUnreachable(Endpoint::Origin))
        );
        assert_eq!(
            find_path(&mask, &offshore, &far_inland, &[], &NoWeather, &config),
            Err(PathfindError::EndpointUnreachable(Endpoint::Destination))
        );
    }

    #[test]
    fn marine_path_becomes_a_boat_segment() {
        let mask = open_water(10);
        let path = find_path(
            &mask,
            &mask.cell_center(GridCell::new(0, 0)),
            &mask.cell_center(GridCell::new(0, 9)),
            &[],
            &NoWeather,
            &PathfinderConfig::default(),
        )
        .unwrap();
        let expected = path_length_m(&path.points);
        let segment = path.into_segment();
        assert_eq!(segment.kind, SegmentKind::Marine);
        assert_eq!(segment.transport_label, "boat");
        assert!((segment.distance_m - expected).abs() < 1e-9);
        assert!((segment.duration_s - expected / 10.0).abs() < 1e-9);
    }

    #[test]
    fn simplify_keeps_turns_and_endpoints() {
        let cells = [
            GridCell::new(0, 0),
            GridCell::new(0, 1),
            GridCell::new(0, 2),
            GridCell::new(1, 3),
            GridCell::new(2, 4),
        ];
        assert_eq!(
            simplify_cells(&cells),
            vec![GridCell::new(0, 0), GridCell::new(0, 2), GridCell::new(2, 4)]
        );
    }
}

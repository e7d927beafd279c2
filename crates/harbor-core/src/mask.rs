//! Rasterized land/water occupancy mask.
//!
//! The mask owns a row-major byte buffer (`0` = land, `1` = water) over a
//! geographic bounding box. Row 0 is the northern edge; rows grow southward.
//! Every lookup is bounds-checked before it touches the buffer, and anything
//! outside the box is treated as land.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{GeoPoint, RouteValidation};

/// Cells added beyond the requested padding whenever the grid grows.
pub const GROWTH_EXTRA_CELLS: usize = 5;
/// Upper bound on grid size after growth (cells).
pub const MAX_GRID_CELLS: usize = 64_000_000;
/// Rough kilometers per degree used for area statistics.
const KM_PER_DEGREE: f64 = 111.0;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("buffer holds {actual} cells but bounds describe {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("cell {index} has value {value}; expected 0 (land) or 1 (water)")]
    InvalidCellValue { index: usize, value: u8 },
    #[error("cell ({row}, {col}) is outside the grid")]
    CellOutOfBounds { row: i64, col: i64 },
    #[error("coordinate ({lon}, {lat}) is not finite")]
    InvalidCoordinate { lon: f64, lat: f64 },
    #[error("grid would grow to {cells} cells (limit {MAX_GRID_CELLS})")]
    GridTooLarge { cells: usize },
    #[error("mask buffer does not match its metadata checksum")]
    ChecksumMismatch,
    #[error("mask file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("mask metadata is malformed: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Value stored in one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CellKind {
    Land = 0,
    Water = 1,
}

impl CellKind {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(CellKind::Land),
            1 => Some(CellKind::Water),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_navigable(navigable: bool) -> Self {
        if navigable {
            CellKind::Water
        } else {
            CellKind::Land
        }
    }
}

/// Grid coordinate. Signed so neighbor arithmetic can step off the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: i64,
    pub col: i64,
}

impl GridCell {
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    pub fn offset(self, dr: i64, dc: i64) -> Self {
        Self::new(self.row.saturating_add(dr), self.col.saturating_add(dc))
    }

    pub fn chebyshev_distance(self, other: GridCell) -> i64 {
        let rows = self.row.saturating_sub(other.row).saturating_abs();
        let cols = self.col.saturating_sub(other.col).saturating_abs();
        rows.max(cols)
    }
}

/// Geographic extent and raster geometry of the mask.
///
/// `max_lon` and `min_lat` are always derived from the north-west corner,
/// the resolution, and the cell counts, so the box and the grid never drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub resolution_deg: f64,
    pub width: usize,
    pub height: usize,
}

impl GeoBounds {
    /// Build bounds from the north-west corner and the grid size.
    pub fn new(
        min_lon: f64,
        max_lat: f64,
        resolution_deg: f64,
        width: usize,
        height: usize,
    ) -> Result<Self, MaskError> {
        if !min_lon.is_finite() || !max_lat.is_finite() {
            return Err(MaskError::InvalidBounds("corner is not finite".to_string()));
        }
        if !resolution_deg.is_finite() || resolution_deg <= 0.0 {
            return Err(MaskError::InvalidBounds(format!(
                "resolution must be positive, got {resolution_deg}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(MaskError::InvalidBounds(format!(
                "grid must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self {
            min_lon,
            min_lat: max_lat - height as f64 * resolution_deg,
            max_lon: min_lon + width as f64 * resolution_deg,
            max_lat,
            resolution_deg,
            width,
            height,
        })
    }

    /// Build bounds covering an extent; the grid is rounded up to whole cells.
    pub fn from_extent(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
        resolution_deg: f64,
    ) -> Result<Self, MaskError> {
        if !(max_lon > min_lon && max_lat > min_lat) {
            return Err(MaskError::InvalidBounds(format!(
                "extent ({min_lon}, {min_lat}) - ({max_lon}, {max_lat}) is empty"
            )));
        }
        if !resolution_deg.is_finite() || resolution_deg <= 0.0 {
            return Err(MaskError::InvalidBounds(format!(
                "resolution must be positive, got {resolution_deg}"
            )));
        }
        let width = ((max_lon - min_lon) / resolution_deg - 1e-9).ceil().max(1.0) as usize;
        let height = ((max_lat - min_lat) / resolution_deg - 1e-9).ceil().max(1.0) as usize;
        Self::new(min_lon, max_lat, resolution_deg, width, height)
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Cell a coordinate falls in, ignoring the grid extent.
    fn raw_cell(&self, lon: f64, lat: f64) -> GridCell {
        let col = ((lon - self.min_lon) / self.resolution_deg).floor() as i64;
        let row = ((self.max_lat - lat) / self.resolution_deg).floor() as i64;
        GridCell::new(row, col)
    }

    /// Cell containing a coordinate, or `None` outside the grid.
    pub fn cell_for(&self, lon: f64, lat: f64) -> Option<GridCell> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let cell = self.raw_cell(lon, lat);
        self.contains_cell(cell).then_some(cell)
    }

    /// Chebyshev distance in cells from `cell` to the nearest grid cell.
    pub fn cells_outside(&self, cell: GridCell) -> i64 {
        let gap = |value: i64, len: usize| {
            let last = len as i64 - 1;
            if value < 0 {
                value.saturating_neg()
            } else if value > last {
                value - last
            } else {
                0
            }
        };
        gap(cell.row, self.height).max(gap(cell.col, self.width))
    }

    pub fn contains_cell(&self, cell: GridCell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.height
            && (cell.col as usize) < self.width
    }

    /// Buffer index for a cell, bounds-checked first.
    pub fn index(&self, cell: GridCell) -> Option<usize> {
        self.contains_cell(cell)
            .then(|| cell.row as usize * self.width + cell.col as usize)
    }

    pub fn cell_center(&self, cell: GridCell) -> GeoPoint {
        GeoPoint::new(
            self.max_lat - (cell.row as f64 + 0.5) * self.resolution_deg,
            self.min_lon + (cell.col as f64 + 0.5) * self.resolution_deg,
        )
    }
}

/// Area statistics for the mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStats {
    pub total_cells: usize,
    pub water_cells: usize,
    pub land_cells: usize,
    pub water_percentage: f64,
    pub water_area_km2: f64,
    pub land_area_km2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetadataBbox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetadataGrid {
    pub width: usize,
    pub height: usize,
    pub resolution_degrees: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_meters_approx: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetadataEncoding {
    pub water: u8,
    pub land: u8,
}

/// Metadata record persisted next to the cell buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskMetadata {
    pub bbox: MetadataBbox,
    pub grid: MetadataGrid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<MetadataEncoding>,
    /// FNV-1a hash of the cell buffer, ties the pair together
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<u64>,
}

impl MaskMetadata {
    pub fn bounds(&self) -> Result<GeoBounds, MaskError> {
        GeoBounds::new(
            self.bbox.min_lon,
            self.bbox.max_lat,
            self.grid.resolution_degrees,
            self.grid.width,
            self.grid.height,
        )
    }
}

/// Buffer + metadata pair, the unit of persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSnapshot {
    pub metadata: MaskMetadata,
    pub cells: Vec<u8>,
}

pub fn cells_checksum(cells: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    cells.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

/// The land/water grid. Exclusively owns its buffer; callers only get
/// bounds-checked accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyMask {
    bounds: GeoBounds,
    cells: Vec<u8>,
}

impl OccupancyMask {
    pub fn filled(bounds: GeoBounds, kind: CellKind) -> Self {
        Self {
            cells: vec![kind.as_byte(); bounds.cell_count()],
            bounds,
        }
    }

    pub fn from_cells(bounds: GeoBounds, cells: Vec<u8>) -> Result<Self, MaskError> {
        if cells.len() != bounds.cell_count() {
            return Err(MaskError::SizeMismatch {
                expected: bounds.cell_count(),
                actual: cells.len(),
            });
        }
        if let Some((index, value)) = cells
            .iter()
            .enumerate()
            .find(|(_, value)| CellKind::from_byte(**value).is_none())
        {
            return Err(MaskError::InvalidCellValue {
                index,
                value: *value,
            });
        }
        Ok(Self { bounds, cells })
    }

    /// Build a mask from ASCII rows: `~` (or `.`) is water, anything else is land.
    /// Handy for fixtures; row 0 is the northern edge.
    pub fn from_rows(
        min_lon: f64,
        max_lat: f64,
        resolution_deg: f64,
        rows: &[&str],
    ) -> Result<Self, MaskError> {
        let height = rows.len();
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);
        let bounds = GeoBounds::new(min_lon, max_lat, resolution_deg, width, height)?;
        let mut cells = Vec::with_capacity(bounds.cell_count());
        for row in rows {
            if row.chars().count() != width {
                return Err(MaskError::InvalidBounds("fixture rows differ in length".to_string()));
            }
            cells.extend(row.chars().map(|c| {
                CellKind::from_navigable(c == '~' || c == '.').as_byte()
            }));
        }
        Self::from_cells(bounds, cells)
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn cell_for(&self, lon: f64, lat: f64) -> Option<GridCell> {
        self.bounds.cell_for(lon, lat)
    }

    pub fn cell_center(&self, cell: GridCell) -> GeoPoint {
        self.bounds.cell_center(cell)
    }

    pub fn cell_value(&self, cell: GridCell) -> Option<CellKind> {
        let index = self.bounds.index(cell)?;
        self.cells.get(index).copied().and_then(CellKind::from_byte)
    }

    pub fn is_cell_navigable(&self, cell: GridCell) -> bool {
        self.cell_value(cell) == Some(CellKind::Water)
    }

    /// Whether a coordinate lies on navigable water. Outside the grid is land.
    pub fn is_navigable(&self, lon: f64, lat: f64) -> bool {
        self.cell_for(lon, lat)
            .map(|cell| self.is_cell_navigable(cell))
            .unwrap_or(false)
    }

    pub fn is_point_navigable(&self, point: &GeoPoint) -> bool {
        self.is_navigable(point.lon, point.lat)
    }

    /// Nearest navigable cell to `origin` within `max_radius_cells` rings.
    ///
    /// Rings are scanned in increasing Chebyshev radius and only the ring
    /// perimeter is visited at each radius. `origin` may lie off the grid.
    pub fn find_nearest_navigable_cell(
        &self,
        origin: GridCell,
        max_radius_cells: usize,
    ) -> Option<GridCell> {
        if self.is_cell_navigable(origin) {
            return Some(origin);
        }
        let max_radius = i64::try_from(max_radius_cells)
            .unwrap_or(i64::MAX)
            .min(MAX_GRID_CELLS as i64);
        let outside = self.bounds.cells_outside(origin);
        if outside > max_radius {
            return None;
        }

        // Rings closer than `outside` miss the grid; rings past `last` enclose it.
        let (rows, cols) = (self.bounds.height as i64, self.bounds.width as i64);
        let last = max_radius.min(outside + rows.max(cols));
        for radius in outside.max(1)..=last {
            let first_col = (-radius).max(-origin.col);
            let last_col = radius.min(cols - 1 - origin.col);
            for dr in (-radius).max(-origin.row)..=radius.min(rows - 1 - origin.row) {
                if dr.abs() == radius {
                    for dc in first_col..=last_col {
                        let cell = origin.offset(dr, dc);
                        if self.is_cell_navigable(cell) {
                            return Some(cell);
                        }
                    }
                } else {
                    // Interior rows only contribute their two end columns.
                    for dc in [-radius, radius] {
                        let cell = origin.offset(dr, dc);
                        if self.is_cell_navigable(cell) {
                            return Some(cell);
                        }
                    }
                }
            }
        }
        None
    }

    /// Snap a coordinate to water.
    ///
    /// A navigable coordinate is returned unchanged; otherwise the center of the
    /// first navigable cell found by the ring search, or `None`.
    pub fn find_nearest_navigable(
        &self,
        lon: f64,
        lat: f64,
        max_radius_cells: usize,
    ) -> Option<GeoPoint> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        if self.is_navigable(lon, lat) {
            return Some(GeoPoint::new(lat, lon));
        }
        let origin = self.bounds.raw_cell(lon, lat);
        self.find_nearest_navigable_cell(origin, max_radius_cells)
            .map(|cell| self.cell_center(cell))
    }

    pub fn set_cell(&mut self, row: i64, col: i64, kind: CellKind) -> Result<(), MaskError> {
        let cell = GridCell::new(row, col);
        let index = self
            .bounds
            .index(cell)
            .ok_or(MaskError::CellOutOfBounds { row, col })?;
        self.cells[index] = kind.as_byte();
        Ok(())
    }

    /// Set the cell under a coordinate, growing the grid if it lies outside.
    pub fn set_point(&mut self, lon: f64, lat: f64, kind: CellKind) -> Result<GridCell, MaskError> {
        self.grow_to_include(lon, lat, 0)?;
        let cell = self
            .cell_for(lon, lat)
            .ok_or(MaskError::InvalidCoordinate { lon, lat })?;
        self.set_cell(cell.row, cell.col, kind)?;
        Ok(cell)
    }

    /// Paint a filled circle of cells around a coordinate.
    ///
    /// Grows the grid first when the center lies outside it. Returns every
    /// cell written: those with `dr² + dc² <= radius²` that are on the grid.
    pub fn paint_circular_brush(
        &mut self,
        lon: f64,
        lat: f64,
        radius_cells: usize,
        kind: CellKind,
    ) -> Result<Vec<GridCell>, MaskError> {
        self.grow_to_include(lon, lat, radius_cells)?;
        let center = self
            .cell_for(lon, lat)
            .ok_or(MaskError::InvalidCoordinate { lon, lat })?;

        // Past twice the longer side every on-grid cell is inside the disc.
        let span = 2 * self.bounds.width.max(self.bounds.height) as i64;
        let radius = i64::try_from(radius_cells).unwrap_or(i64::MAX).min(span);
        let radius_sq = radius * radius;
        let (rows, cols) = (self.bounds.height as i64, self.bounds.width as i64);
        let mut affected = Vec::new();
        for dr in (-radius).max(-center.row)..=radius.min(rows - 1 - center.row) {
            for dc in (-radius).max(-center.col)..=radius.min(cols - 1 - center.col) {
                if dr * dr + dc * dc > radius_sq {
                    continue;
                }
                let cell = center.offset(dr, dc);
                if let Some(index) = self.bounds.index(cell) {
                    self.cells[index] = kind.as_byte();
                    affected.push(cell);
                }
            }
        }
        Ok(affected)
    }

    /// Enlarge the grid so `(lon, lat)` plus padding is covered.
    ///
    /// Only deficient sides grow, each by whole cells so existing cells keep
    /// their geographic centers. New cells are land. Bounds and buffer are
    /// replaced together. Returns whether the grid changed.
    pub fn grow_to_include(
        &mut self,
        lon: f64,
        lat: f64,
        padding_cells: usize,
    ) -> Result<bool, MaskError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(MaskError::InvalidCoordinate { lon, lat });
        }
        if self.cell_for(lon, lat).is_some() {
            return Ok(false);
        }

        let old = self.bounds;
        let res = old.resolution_deg;
        let margin = res * padding_cells.saturating_add(GROWTH_EXTRA_CELLS) as f64;
        let cells_for = |span: f64| (span / res).ceil().max(0.0) as usize;

        let raw = old.raw_cell(lon, lat);
        let add_west = if raw.col < 0 { cells_for(old.min_lon - (lon - margin)) } else { 0 };
        let add_east = if raw.col >= old.width as i64 {
            cells_for(lon + margin - old.max_lon)
        } else {
            0
        };
        let add_north = if raw.row < 0 { cells_for(lat + margin - old.max_lat) } else { 0 };
        let add_south = if raw.row >= old.height as i64 {
            cells_for(old.min_lat - (lat - margin))
        } else {
            0
        };

        let too_large = || MaskError::GridTooLarge { cells: usize::MAX };
        let new_width = old
            .width
            .checked_add(add_west)
            .and_then(|width| width.checked_add(add_east))
            .ok_or_else(too_large)?;
        let new_height = old
            .height
            .checked_add(add_north)
            .and_then(|height| height.checked_add(add_south))
            .ok_or_else(too_large)?;
        let total = new_width.saturating_mul(new_height);
        if total > MAX_GRID_CELLS {
            return Err(MaskError::GridTooLarge { cells: total });
        }

        let bounds = GeoBounds::new(
            old.min_lon - add_west as f64 * res,
            old.max_lat + add_north as f64 * res,
            res,
            new_width,
            new_height,
        )?;

        let mut cells = vec![CellKind::Land.as_byte(); total];
        for row in 0..old.height {
            let src = row * old.width;
            let dst = (row + add_north) * new_width + add_west;
            cells[dst..dst + old.width].copy_from_slice(&self.cells[src..src + old.width]);
        }

        tracing::info!(
            "Grew mask from {}x{} to {}x{} to include ({:.5}, {:.5})",
            old.width,
            old.height,
            new_width,
            new_height,
            lon,
            lat
        );

        self.bounds = bounds;
        self.cells = cells;
        Ok(true)
    }

    /// Classify every point as water or land.
    pub fn validate_route(&self, points: &[GeoPoint]) -> RouteValidation {
        let land_point_indices: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, point)| !self.is_point_navigable(point))
            .map(|(index, _)| index)
            .collect();
        let land_points = land_point_indices.len();
        RouteValidation {
            is_valid: land_points == 0,
            total_points: points.len(),
            water_points: points.len() - land_points,
            land_points,
            land_point_indices,
        }
    }

    /// Indices of consecutive-point segments that touch land when sampled
    /// linearly at `samples_per_segment` steps.
    pub fn invalid_segments(&self, points: &[GeoPoint], samples_per_segment: usize) -> Vec<usize> {
        let samples = samples_per_segment.max(1);
        points
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| {
                (0..=samples).any(|step| {
                    let t = step as f64 / samples as f64;
                    let lon = pair[0].lon + t * (pair[1].lon - pair[0].lon);
                    let lat = pair[0].lat + t * (pair[1].lat - pair[0].lat);
                    !self.is_navigable(lon, lat)
                })
            })
            .map(|(index, _)| index)
            .collect()
    }

    pub fn stats(&self) -> MaskStats {
        let total_cells = self.cells.len();
        let water_cells = self
            .cells
            .iter()
            .filter(|value| **value == CellKind::Water.as_byte())
            .count();
        let land_cells = total_cells - water_cells;
        let cell_area_km2 = (self.bounds.resolution_deg * KM_PER_DEGREE).powi(2);
        MaskStats {
            total_cells,
            water_cells,
            land_cells,
            water_percentage: if total_cells == 0 {
                0.0
            } else {
                water_cells as f64 / total_cells as f64 * 100.0
            },
            water_area_km2: water_cells as f64 * cell_area_km2,
            land_area_km2: land_cells as f64 * cell_area_km2,
        }
    }

    pub fn metadata(&self) -> MaskMetadata {
        let bounds = &self.bounds;
        MaskMetadata {
            bbox: MetadataBbox {
                min_lon: bounds.min_lon,
                min_lat: bounds.min_lat,
                max_lon: bounds.max_lon,
                max_lat: bounds.max_lat,
            },
            grid: MetadataGrid {
                width: bounds.width,
                height: bounds.height,
                resolution_degrees: bounds.resolution_deg,
                resolution_meters_approx: Some(bounds.resolution_deg * KM_PER_DEGREE * 1000.0),
            },
            projection: Some("EPSG:4326".to_string()),
            encoding: Some(MetadataEncoding { water: 1, land: 0 }),
            checksum: Some(cells_checksum(&self.cells)),
        }
    }

    pub fn snapshot(&self) -> MaskSnapshot {
        MaskSnapshot {
            metadata: self.metadata(),
            cells: self.cells.clone(),
        }
    }

    pub fn from_snapshot(snapshot: MaskSnapshot) -> Result<Self, MaskError> {
        if let Some(expected) = snapshot.metadata.checksum {
            if cells_checksum(&snapshot.cells) != expected {
                return Err(MaskError::ChecksumMismatch);
            }
        }
        let bounds = snapshot.metadata.bounds()?;
        Self::from_cells(bounds, snapshot.cells)
    }
}

/// Mask shared between editors and route planners.
///
/// One writer or many readers at a time; a reader always sees bounds and
/// buffer from the same instant because both live behind the same lock.
#[derive(Debug, Clone)]
pub struct SharedMask(Arc<RwLock<OccupancyMask>>);

impl SharedMask {
    pub fn new(mask: OccupancyMask) -> Self {
        Self(Arc::new(RwLock::new(mask)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, OccupancyMask> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, OccupancyMask> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a whole new mask (e.g. after reset).
    pub fn replace(&self, mask: OccupancyMask) {
        *self.write() = mask;
    }
}

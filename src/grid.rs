//! Grid-based sampling.
//!
//! A band is partitioned into square cells whose size adapts
//! to the raster size. Each cell has a cached average over
//! its normal-range pixels; a query averages the cell with
//! its (up to) eight neighbors and falls back to neighbor
//! interpolation when that average is not a normal reading.
//!
//! Cached averages are keyed by `(band, grid_row, grid_col)`
//! and are dropped in bulk whenever the band or the grid
//! geometry changes.

use std::collections::HashMap;

use itertools::iproduct;
use rayon::prelude::*;
use serde_derive::*;
use tracing::debug;

use crate::{
    error::Rejection,
    interpolate::NeighborInterpolator,
    raster::RasterBand,
    sample::{SampleResult, SamplingMode},
    temperature::{is_normal, matches_nodata, Classifier, TemperatureLevel, Validation},
};

/// Cell edge in pixels for a raster whose larger side is
/// `max_dim`.
pub fn adaptive_cell_size(max_dim: usize) -> usize {
    if max_dim < 1000 {
        20
    } else if max_dim < 5000 {
        40
    } else if max_dim < 10000 {
        80
    } else {
        150
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub cell_size: usize,
    pub rows: usize,
    pub cols: usize,
    pub width: usize,
    pub height: usize,
}

/// Pixel rectangle of a cell; ends are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellBounds {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl GridGeometry {
    pub fn for_raster(width: usize, height: usize) -> Self {
        Self::with_cell_size(width, height, adaptive_cell_size(width.max(height)))
    }

    pub fn with_cell_size(width: usize, height: usize, cell_size: usize) -> Self {
        assert!(cell_size > 0, "grid cell size must be positive");
        GridGeometry {
            cell_size,
            rows: (height + cell_size - 1) / cell_size,
            cols: (width + cell_size - 1) / cell_size,
            width,
            height,
        }
    }

    /// Grid cell containing pixel `(row, col)`.
    pub fn cell_of(&self, row: usize, col: usize) -> (usize, usize) {
        (row / self.cell_size, col / self.cell_size)
    }

    pub fn cell_bounds(&self, grid_row: usize, grid_col: usize) -> CellBounds {
        let row_start = grid_row * self.cell_size;
        let col_start = grid_col * self.cell_size;
        CellBounds {
            row_start,
            row_end: (row_start + self.cell_size).min(self.height),
            col_start,
            col_end: (col_start + self.cell_size).min(self.width),
        }
    }

    /// The cell and its in-bounds 8-neighbors, row-major.
    pub fn neighborhood(
        &self,
        grid_row: usize,
        grid_col: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        let (rows, cols) = (self.rows as isize, self.cols as isize);
        let (gr, gc) = (grid_row as isize, grid_col as isize);
        iproduct!(-1isize..=1, -1isize..=1).filter_map(move |(dr, dc)| {
            let (r, c) = (gr + dr, gc + dc);
            if r >= 0 && r < rows && c >= 0 && c < cols {
                Some((r as usize, c as usize))
            } else {
                None
            }
        })
    }

    fn matches(&self, band: &RasterBand) -> bool {
        band.width() == self.width && band.height() == self.height
    }
}

/// `(band_index, grid_row, grid_col)`
pub type CellKey = (usize, usize, usize);

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Cell scans, from lookups and batch precomputation.
    pub scans: u64,
    pub entries: usize,
}

/// Cache of per-cell averages. Only successful averages are
/// stored; empty cells are recomputed on every request.
#[derive(Debug, Default)]
pub struct CellCache {
    entries: HashMap<CellKey, f64>,
    hits: u64,
    misses: u64,
    scans: u64,
}

impl CellCache {
    pub fn get_or_compute<F>(&mut self, key: CellKey, compute: F) -> Option<f64>
    where
        F: FnOnce() -> Option<f64>,
    {
        if let Some(&value) = self.entries.get(&key) {
            self.hits += 1;
            return Some(value);
        }
        self.misses += 1;
        let value = compute();
        self.store(key, value);
        value
    }

    /// Record the outcome of a scan done outside the cache.
    pub fn store(&mut self, key: CellKey, value: Option<f64>) {
        self.scans += 1;
        if let Some(value) = value {
            self.entries.insert(key, value);
        }
    }

    pub fn contains(&self, key: &CellKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            scans: self.scans,
            entries: self.entries.len(),
        }
    }
}

/// 3x3 neighborhood average with pooled pixel statistics.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NeighborhoodAverage {
    /// Mean of the per-cell means (each cell weighs the same).
    pub value: f64,
    pub cells_used: usize,
    /// Qualifying pixels over all used cells.
    pub pixel_count: usize,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation of those pixels.
    pub std_dev: f64,
}

/// Grid geometry, cell-average cache and the query flow.
#[derive(Debug)]
pub struct GridSampler {
    geometry: GridGeometry,
    cache: CellCache,
    active_band: Option<usize>,
    mode: SamplingMode,
}

impl GridSampler {
    pub fn new(geometry: GridGeometry) -> Self {
        GridSampler {
            geometry,
            cache: CellCache::default(),
            active_band: None,
            mode: SamplingMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SamplingMode) {
        self.mode = mode;
    }

    /// Switch to a new grid; drops every cached average.
    pub fn reset(&mut self, geometry: GridGeometry) {
        self.geometry = geometry;
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            debug!(entries = self.cache.len(), "invalidating cell cache");
        }
        self.cache.invalidate_all();
        self.active_band = None;
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of cell scans performed so far.
    pub fn scan_count(&self) -> u64 {
        self.cache.stats().scans
    }

    fn activate(&mut self, band: &RasterBand) {
        assert!(
            self.geometry.matches(band),
            "band of {}x{} does not match grid over {}x{}",
            band.width(),
            band.height(),
            self.geometry.width,
            self.geometry.height
        );
        if self.active_band != Some(band.index()) {
            self.invalidate();
            self.active_band = Some(band.index());
        }
    }

    /// Mean of the normal-range pixels of a cell, in band
    /// units. `None` when no pixel qualifies.
    pub fn grid_average(&mut self, band: &RasterBand, grid_row: usize, grid_col: usize) -> Option<f64> {
        self.activate(band);
        let bounds = self.geometry.cell_bounds(grid_row, grid_col);
        self.cache
            .get_or_compute((band.index(), grid_row, grid_col), || cell_mean(band, bounds))
    }

    pub fn neighborhood_average(
        &mut self,
        band: &RasterBand,
        grid_row: usize,
        grid_col: usize,
    ) -> Result<NeighborhoodAverage, Rejection> {
        let geometry = self.geometry;
        let mut means = Vec::with_capacity(9);
        let mut pooled = Vec::new();
        for (r, c) in geometry.neighborhood(grid_row, grid_col) {
            if let Some(mean) = self.grid_average(band, r, c) {
                means.push(mean);
                pooled.extend(qualifying(band, geometry.cell_bounds(r, c)));
            }
        }

        if means.is_empty() {
            return Err(Rejection::EmptyCell {
                row: grid_row,
                col: grid_col,
            });
        }

        let value = means.iter().sum::<f64>() / means.len() as f64;
        let n = pooled.len() as f64;
        let mean = pooled.iter().sum::<f64>() / n;
        let variance = pooled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = pooled
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Ok(NeighborhoodAverage {
            value,
            cells_used: means.len(),
            pixel_count: pooled.len(),
            min,
            max,
            std_dev: variance.sqrt(),
        })
    }

    /// Fill the cache with every cell of `band`, scanning
    /// cells in parallel.
    pub fn precompute(&mut self, band: &RasterBand) {
        self.activate(band);
        let index = band.index();
        let geometry = self.geometry;
        let pending: Vec<(usize, usize)> = iproduct!(0..geometry.rows, 0..geometry.cols)
            .filter(|&(r, c)| !self.cache.contains(&(index, r, c)))
            .collect();

        let computed: Vec<_> = pending
            .into_par_iter()
            .map(|(r, c)| ((r, c), cell_mean(band, geometry.cell_bounds(r, c))))
            .collect();

        for ((r, c), mean) in computed {
            self.cache.store((index, r, c), mean);
        }
        debug!(band = index, entries = self.cache.len(), "precomputed cell averages");
    }

    /// Temperature at pixel `(row, col)` of `band`.
    ///
    /// The reading from the configured [`SamplingMode`] is
    /// classified; anything but a normal reading gets a
    /// second chance through `interpolator`, centered at the
    /// exact pixel. If that also fails the original
    /// classification is returned, marked unusable.
    ///
    /// Panics when `(row, col)` lies outside `band`.
    pub fn sample(
        &mut self,
        band: &RasterBand,
        classifier: &Classifier,
        interpolator: &NeighborInterpolator,
        row: usize,
        col: usize,
    ) -> SampleResult {
        assert!(
            band.contains(row, col),
            "pixel ({}, {}) outside band of {}x{}",
            row,
            col,
            band.width(),
            band.height()
        );
        let (grid_row, grid_col) = self.geometry.cell_of(row, col);

        let mut neighborhood = None;
        let mode = self.mode;
        let (value, validation) = match mode {
            SamplingMode::Neighborhood => match self.neighborhood_average(band, grid_row, grid_col) {
                Ok(n) => {
                    neighborhood = Some(n);
                    (n.value, classifier.validate(n.value))
                }
                Err(rejection) => (f64::NAN, Validation::rejected(rejection)),
            },
            SamplingMode::Cell => match self.grid_average(band, grid_row, grid_col) {
                Some(mean) => (mean, classifier.validate(mean)),
                None => (
                    f64::NAN,
                    Validation::rejected(Rejection::EmptyCell {
                        row: grid_row,
                        col: grid_col,
                    }),
                ),
            },
            SamplingMode::Pixel => {
                let value = band.get(row, col);
                (value, classifier.validate(value))
            }
        };

        let level = validation.level;
        let result = SampleResult::from_validation(band.index(), (row, col), mode, value, validation)
            .with_neighborhood(neighborhood);
        if level == TemperatureLevel::Normal {
            return result;
        }

        match interpolator.interpolate(band, row, col) {
            Ok(interpolation) => result.estimated(interpolation),
            Err(rejection) => {
                debug!(row, col, %level, "no reliable value");
                result.unvalidated(rejection)
            }
        }
    }
}

fn qualifying(band: &RasterBand, bounds: CellBounds) -> impl Iterator<Item = f64> + '_ {
    let nodata = band.calibrated_nodata();
    iproduct!(bounds.row_start..bounds.row_end, bounds.col_start..bounds.col_end)
        .map(move |(r, c)| band.get(r, c))
        .filter(move |&v| is_normal(v) && !matches_nodata(v, nodata))
}

fn cell_mean(band: &RasterBand, bounds: CellBounds) -> Option<f64> {
    let (sum, count) = qualifying(band, bounds).fold((0., 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

//! Recover an estimate for a rejected pixel from its
//! neighbors.
//!
//! The search grows a square window around the pixel one
//! ring at a time and only ever borrows normal-range values.
//! Extreme neighbors are treated as suspect just like
//! sentinels, so the estimate is a locally typical reading
//! rather than another extreme.

use serde_derive::*;
use tracing::debug;

use crate::{
    error::Rejection,
    raster::RasterBand,
    temperature::{is_normal, matches_nodata},
};

/// Default search radius in pixels.
pub const DEFAULT_MAX_RADIUS: usize = 15;

/// Fewest neighbors an estimate may be based on.
pub const MIN_NEIGHBORS: usize = 3;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Interpolation {
    /// In the units of the band (unit inferred per value).
    pub value: f64,
    pub neighbors_used: usize,
    pub radius_used: usize,
}

/// Inverse-distance-weighted neighbor search.
#[derive(Clone, Copy, Debug)]
pub struct NeighborInterpolator {
    nodata: Option<f64>,
    max_radius: usize,
    min_neighbors: usize,
}

impl NeighborInterpolator {
    /// `nodata` is compared against calibrated sample values.
    pub fn new(nodata: Option<f64>) -> Self {
        NeighborInterpolator {
            nodata,
            max_radius: DEFAULT_MAX_RADIUS,
            min_neighbors: MIN_NEIGHBORS,
        }
    }

    /// Interpolator matching the sentinel of `band`.
    pub fn for_band(band: &RasterBand) -> Self {
        Self::new(band.calibrated_nodata())
    }

    pub fn with_max_radius(mut self, max_radius: usize) -> Self {
        self.max_radius = max_radius;
        self
    }

    pub fn with_min_neighbors(mut self, min_neighbors: usize) -> Self {
        self.min_neighbors = min_neighbors.max(1);
        self
    }

    pub fn max_radius(&self) -> usize {
        self.max_radius
    }

    /// Estimate the value at `(row, col)` from normal-range
    /// neighbors. The center pixel itself is never used.
    ///
    /// Panics when `(row, col)` lies outside `band`.
    pub fn interpolate(
        &self,
        band: &RasterBand,
        row: usize,
        col: usize,
    ) -> Result<Interpolation, Rejection> {
        assert!(
            band.contains(row, col),
            "pixel ({}, {}) outside band of {}x{}",
            row,
            col,
            band.width(),
            band.height()
        );

        let mut candidates = Vec::new();
        for radius in 1..=self.max_radius {
            candidates.clear();
            self.collect_candidates(band, row, col, radius, &mut candidates);
            if candidates.len() < self.min_neighbors {
                continue;
            }

            let value = inverse_distance_mean(&candidates);
            if !is_normal(value) {
                debug!(row, col, radius, value, "estimate left normal range, widening");
                continue;
            }

            debug!(row, col, radius, neighbors = candidates.len(), value, "interpolated");
            return Ok(Interpolation {
                value,
                neighbors_used: candidates.len(),
                radius_used: radius,
            });
        }

        Err(Rejection::InsufficientNeighbors {
            radius: self.max_radius,
        })
    }

    /// Push `(value, distance)` for every usable pixel in the
    /// `(2r+1)^2` square around the center.
    fn collect_candidates(
        &self,
        band: &RasterBand,
        row: usize,
        col: usize,
        radius: usize,
        out: &mut Vec<(f64, f64)>,
    ) {
        let r0 = row.saturating_sub(radius);
        let r1 = (row + radius).min(band.height() - 1);
        let c0 = col.saturating_sub(radius);
        let c1 = (col + radius).min(band.width() - 1);

        for r in r0..=r1 {
            for c in c0..=c1 {
                if r == row && c == col {
                    continue;
                }
                let value = band.get(r, c);
                if matches_nodata(value, self.nodata) || !is_normal(value) {
                    continue;
                }
                let dr = r as f64 - row as f64;
                let dc = c as f64 - col as f64;
                out.push((value, dr.hypot(dc)));
            }
        }
    }
}

fn inverse_distance_mean(candidates: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = candidates.iter().map(|&(_, d)| 1. / d).sum();
    candidates
        .iter()
        .map(|&(v, d)| v * (1. / d) / total_weight)
        .sum()
}

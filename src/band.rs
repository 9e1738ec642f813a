//! Picking the band that most looks like surface temperature.

use ndarray::s;
use rayon::prelude::*;
use serde_derive::*;
use std::fmt;
use tracing::{debug, info, warn};

use crate::{
    error::Rejection,
    raster::{BandStack, RasterBand},
    temperature::is_normal,
};

const NORMAL_WEIGHT: f64 = 0.7;
const VALID_WEIGHT: f64 = 0.3;

/// Side of the top-left window inspected by
/// [`detect_display_mode`].
const CORNER_SIZE: usize = 100;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BandScore {
    pub index: usize,
    /// Share of finite samples in the normal range.
    pub normal_percentage: f64,
    /// Share of samples that are finite.
    pub valid_percentage: f64,
    pub score: f64,
}

/// Score one (calibrated) band.
pub fn score_band(band: &RasterBand) -> Result<BandScore, Rejection> {
    let (finite, normal) = band
        .values()
        .iter()
        .filter(|v| v.is_finite())
        .fold((0usize, 0usize), |(f, n), &v| {
            (f + 1, if is_normal(v) { n + 1 } else { n })
        });
    if finite == 0 {
        return Err(Rejection::EmptyBand(band.index()));
    }

    let normal_percentage = normal as f64 / finite as f64 * 100.;
    let valid_percentage = finite as f64 / band.len() as f64 * 100.;
    Ok(BandScore {
        index: band.index(),
        normal_percentage,
        valid_percentage,
        score: NORMAL_WEIGHT * normal_percentage + VALID_WEIGHT * valid_percentage,
    })
}

/// Scores of every band of `stack` that has finite samples,
/// in band order.
pub fn band_scores(stack: &BandStack) -> Vec<BandScore> {
    let scored: Vec<_> = (0..stack.band_count())
        .into_par_iter()
        .map(|index| score_band(&stack.band(index)))
        .collect();

    scored
        .into_iter()
        .filter_map(|score| match score {
            Ok(score) => {
                debug!(
                    band = score.index,
                    normal = score.normal_percentage,
                    valid = score.valid_percentage,
                    score = score.score,
                    "scored band"
                );
                Some(score)
            }
            Err(rejection) => {
                warn!(%rejection, "skipping band");
                None
            }
        })
        .collect()
}

/// Index of the highest scoring band; the lowest index wins
/// ties. Stacks of one band, and stacks where no band has a
/// finite sample, give band 0.
pub fn select_best_band(stack: &BandStack) -> usize {
    if stack.band_count() == 1 {
        return 0;
    }
    let best = band_scores(stack)
        .into_iter()
        .fold(None, |best: Option<BandScore>, score| match best {
            Some(b) if score.score <= b.score => Some(b),
            _ => Some(score),
        });

    match best {
        Some(b) => {
            info!(band = b.index, score = b.score, "selected band");
            b.index
        }
        None => 0,
    }
}

/// How a stack is meant to be viewed. Only advisory: the
/// engine runs band selection for anything but RGB.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    SingleBand,
    RgbComposite,
    ThermalMultiband,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisplayMode::SingleBand => "single band",
            DisplayMode::RgbComposite => "RGB composite",
            DisplayMode::ThermalMultiband => "thermal multiband",
        })
    }
}

/// Guess the display mode from the raw samples in the
/// top-left corner of the first band.
pub fn detect_display_mode(stack: &BandStack) -> DisplayMode {
    let count = stack.band_count();
    if count < 3 {
        return DisplayMode::SingleBand;
    }

    let rows = stack.height().min(CORNER_SIZE);
    let cols = stack.width().min(CORNER_SIZE);
    let first = stack.raw_band(0);
    let (min, max) = first
        .slice(s![..rows, ..cols])
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((f64::NAN, f64::NAN));
    let sampled = !max.is_nan();

    if count >= 7 && sampled && max > 10. {
        return DisplayMode::ThermalMultiband;
    }
    if (3..=4).contains(&count) && sampled && (max <= 1. || (max <= 255. && min >= 0.)) {
        return DisplayMode::RgbComposite;
    }
    DisplayMode::ThermalMultiband
}

/// Likely thermal band (0-based) by Landsat band layout:
/// TIRS 1 for Landsat 8/9 products, band 6 for TM/ETM+, and
/// the last band for other composites.
pub fn guess_thermal_band(band_count: usize) -> usize {
    match band_count {
        0 | 1 => 0,
        2..=5 => band_count - 1,
        6..=9 => 5,
        _ => 9,
    }
}

const LANDSAT_OLI_TIRS: [&str; 11] = [
    "Coastal/Aerosol",
    "Blue",
    "Green",
    "Red",
    "NIR",
    "SWIR 1",
    "SWIR 2",
    "Panchromatic",
    "Cirrus",
    "Thermal (TIRS 1)",
    "Thermal (TIRS 2)",
];

const LANDSAT_ETM: [&str; 8] = [
    "Blue",
    "Green",
    "Red",
    "NIR",
    "SWIR 1",
    "Thermal",
    "SWIR 2",
    "Panchromatic",
];

/// Human readable name of band `index` (0-based) in a stack
/// of `band_count` bands, e.g. `"Band 10 - Thermal (TIRS 1)"`.
pub fn band_name(band_count: usize, index: usize) -> String {
    let label = match band_count {
        n if n >= 11 => LANDSAT_OLI_TIRS.get(index),
        8..=10 => LANDSAT_ETM.get(index),
        // TM is ETM+ without the panchromatic band
        7 => LANDSAT_ETM[..7].get(index),
        _ => None,
    };
    match label {
        Some(label) => format!("Band {} - {}", index + 1, label),
        None => format!("Band {}", index + 1),
    }
}

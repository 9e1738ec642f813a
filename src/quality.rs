//! Band-level validity masking and quality reporting.
//!
//! The mask drops sentinels, non-finite samples and values
//! outside a wide sanity band. Extremes that could still be
//! real readings are kept. Narrow per-value judgement is
//! left to [`Classifier`](crate::temperature::Classifier).

use ndarray::{Array2, Zip};
use serde::{Serialize, Serializer};
use serde_derive::*;
use std::fmt;

use crate::{
    raster::RasterBand,
    temperature::{matches_nodata, Range, CELSIUS_THRESHOLDS, KELVIN_THRESHOLDS},
    unit::{Unit, KELVIN_THRESHOLD},
};

/// Ordinal grade of the valid-pixel share of a band.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityLevel {
    VeryPoor,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLevel {
    pub fn from_percentage(valid_percentage: f64) -> Self {
        if valid_percentage >= 95. {
            QualityLevel::Excellent
        } else if valid_percentage >= 80. {
            QualityLevel::Good
        } else if valid_percentage >= 60. {
            QualityLevel::Fair
        } else if valid_percentage >= 30. {
            QualityLevel::Poor
        } else {
            QualityLevel::VeryPoor
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityLevel::Excellent => "Excellent",
            QualityLevel::Good => "Good",
            QualityLevel::Fair => "Fair",
            QualityLevel::Poor => "Poor",
            QualityLevel::VeryPoor => "Very Poor",
        })
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct QualityReport {
    pub valid_percentage: f64,
    pub quality_level: QualityLevel,
    pub valid_pixel_count: usize,
    pub total_pixel_count: usize,
    /// Raw sentinel as declared in the metadata.
    pub nodata_value: Option<f64>,
    pub scale: f64,
    pub offset: f64,
}

impl QualityReport {
    pub fn has_nodata(&self) -> bool {
        self.nodata_value.is_some()
    }
}

/// Unit of a whole band, as detected from its statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitLabel {
    Detected(Unit),
    /// Statistics were ambiguous; fell back to the per-value
    /// threshold on the minimum.
    Assumed(Unit),
    Unknown,
}

impl UnitLabel {
    pub fn unit(&self) -> Option<Unit> {
        match *self {
            UnitLabel::Detected(u) | UnitLabel::Assumed(u) => Some(u),
            UnitLabel::Unknown => None,
        }
    }
}

impl fmt::Display for UnitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitLabel::Detected(u) => write!(f, "{}", u),
            UnitLabel::Assumed(u) => write!(f, "{} (assumed)", u),
            UnitLabel::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Serialize for UnitLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Keep-mask of `band`: `true` where the sample may be a
/// real reading.
pub fn validity_mask(band: &RasterBand) -> Array2<bool> {
    let values = band.values();
    let nodata = band.calibrated_nodata();

    let mut mask = values.mapv(|v| v.is_finite() && !matches_nodata(v, nodata));

    // Whole-band unit decision on the minimum of what survived.
    let min = values
        .iter()
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
        .fold(f64::INFINITY, |acc, (&v, _)| acc.min(v));
    let min = if min.is_finite() { min } else { 0. };
    let sanity = if min > KELVIN_THRESHOLD {
        KELVIN_THRESHOLDS.sanity
    } else {
        CELSIUS_THRESHOLDS.sanity
    };

    Zip::from(&mut mask).and(values).for_each(|keep, &v| {
        *keep = *keep && sanity.contains(v);
    });
    mask
}

/// Samples of `band` that survive [`validity_mask`], in
/// row-major order.
pub fn valid_values(band: &RasterBand) -> Vec<f64> {
    let mask = validity_mask(band);
    band.values()
        .iter()
        .zip(mask.iter())
        .filter_map(|(&v, &keep)| if keep { Some(v) } else { None })
        .collect()
}

pub fn quality_report(band: &RasterBand) -> QualityReport {
    let mask = validity_mask(band);
    let total_pixel_count = mask.len();
    let valid_pixel_count = mask.iter().filter(|&&keep| keep).count();
    let valid_percentage = if total_pixel_count > 0 {
        valid_pixel_count as f64 / total_pixel_count as f64 * 100.
    } else {
        0.
    };

    QualityReport {
        valid_percentage,
        quality_level: QualityLevel::from_percentage(valid_percentage),
        valid_pixel_count,
        total_pixel_count,
        nodata_value: band.nodata(),
        scale: band.scale(),
        offset: band.offset(),
    }
}

pub fn unit_label(band: &RasterBand) -> UnitLabel {
    let valid = valid_values(band);
    if valid.is_empty() {
        return UnitLabel::Unknown;
    }

    let (min, max, sum) = valid.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.),
        |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v),
    );
    let mean = sum / valid.len() as f64;
    let spans = |r: Range| r.min <= min && max <= r.max;

    if spans(KELVIN_THRESHOLDS.unusual) && mean > 200. {
        UnitLabel::Detected(Unit::Kelvin)
    } else if spans(CELSIUS_THRESHOLDS.unusual) && mean < 100. {
        UnitLabel::Detected(Unit::Celsius)
    } else if min > KELVIN_THRESHOLD {
        UnitLabel::Assumed(Unit::Kelvin)
    } else {
        UnitLabel::Assumed(Unit::Celsius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn band(values: Array2<f64>, nodata: Option<f64>) -> RasterBand {
        RasterBand::from_values(0, values, nodata)
    }

    #[test]
    fn mask_celsius_band() {
        let b = band(
            array![[20., -9999., f64::NAN], [-48., 65., 150.], [99., -100., 0.]],
            Some(-9999.),
        );
        let mask = validity_mask(&b);
        assert_eq!(
            mask,
            array![[true, false, false], [true, true, false], [true, true, true]]
        );
    }

    #[test]
    fn mask_kelvin_band() {
        let b = band(array![[290., 140.], [401., f64::INFINITY]], None);
        // Masked minimum is 140 > 100, so the Kelvin sanity band applies.
        assert_eq!(
            validity_mask(&b),
            array![[true, false], [false, false]]
        );
    }

    #[test]
    fn report_counts_and_levels() {
        let mut values = Array2::from_elem((10, 10), 20.);
        for c in 0..10 {
            values[(0, c)] = -9999.;
        }
        values[(1, 0)] = f64::NAN;
        let r = quality_report(&band(values, Some(-9999.)));
        assert_eq!(r.total_pixel_count, 100);
        assert_eq!(r.valid_pixel_count, 89);
        assert!((r.valid_percentage - 89.).abs() < 1e-9);
        assert_eq!(r.quality_level, QualityLevel::Good);
        assert!(r.has_nodata());
        assert_eq!(r.scale, 1.);
    }

    #[test]
    fn quality_levels() {
        assert_eq!(QualityLevel::from_percentage(100.), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_percentage(95.), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_percentage(94.9), QualityLevel::Good);
        assert_eq!(QualityLevel::from_percentage(60.), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_percentage(30.), QualityLevel::Poor);
        assert_eq!(QualityLevel::from_percentage(29.9), QualityLevel::VeryPoor);
        assert_eq!(QualityLevel::VeryPoor.to_string(), "Very Poor");
    }

    #[test]
    fn unit_labels() {
        let k = band(Array2::from_elem((3, 3), 295.), None);
        assert_eq!(unit_label(&k).to_string(), "Kelvin");

        let c = band(array![[-20., 10.], [35., 60.]], None);
        assert_eq!(unit_label(&c).to_string(), "Celsius");

        // Celsius-range minimum but too hot for the strict check.
        let hot = band(array![[10., 95.], [90., 99.]], None);
        assert_eq!(unit_label(&hot).to_string(), "Celsius (assumed)");

        let wide_k = band(array![[160., 390.], [300., 200.]], None);
        assert_eq!(unit_label(&wide_k), UnitLabel::Assumed(Unit::Kelvin));

        let empty = band(Array2::from_elem((2, 2), f64::NAN), None);
        assert_eq!(unit_label(&empty), UnitLabel::Unknown);
        assert_eq!(serde_json::to_string(&UnitLabel::Unknown).unwrap(), "\"Unknown\"");
    }

    #[test]
    fn empty_mask_is_celsius() {
        let b = band(array![[-9999., -9999.]], Some(-9999.));
        assert_eq!(validity_mask(&b), array![[false, false]]);
        assert_eq!(quality_report(&b).quality_level, QualityLevel::VeryPoor);
    }
}

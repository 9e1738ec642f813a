//! Classify temperature readings by how far they can be
//! trusted.
//!
//! A reading is [`Normal`](TemperatureLevel::Normal) when it
//! is a typical earth-surface temperature,
//! [`Unusual`](TemperatureLevel::Unusual) when it is extreme
//! but physically plausible (polar ice, desert sand) and
//! [`Impossible`](TemperatureLevel::Impossible) when it is
//! almost certainly a fill value or a sensor error. Unusual
//! readings stay visible; only impossible ones are refused.
//!
//! The unit of each value is inferred locally, see
//! [`crate::unit`].

use serde_derive::*;
use std::fmt;

use crate::{
    error::Rejection,
    unit::{as_celsius, infer_unit, Unit},
};

/// Absolute tolerance when matching a value against the
/// nodata sentinel.
pub const NODATA_TOLERANCE: f64 = 0.01;

/// Trust level of a reading.
///
/// The derived ordering follows trust:
/// `Normal > Unusual > Estimated > Impossible`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureLevel {
    Impossible,
    /// Substitute value interpolated from normal-range
    /// neighbors of a rejected reading.
    Estimated,
    Unusual,
    Normal,
}

impl TemperatureLevel {
    /// Whether a value at this level may be shown as a
    /// temperature.
    pub fn is_usable(self) -> bool {
        !matches!(self, TemperatureLevel::Impossible)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TemperatureLevel::Impossible => "impossible",
            TemperatureLevel::Estimated => "estimated",
            TemperatureLevel::Unusual => "unusual",
            TemperatureLevel::Normal => "normal",
        }
    }
}

impl fmt::Display for TemperatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed interval `[min, max]`.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Classification bands for one unit.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct ValidityThresholds {
    pub normal: Range,
    /// Includes `normal`.
    pub unusual: Range,
    /// Wide band-level filter used when masking whole bands.
    pub sanity: Range,
}

pub const CELSIUS_THRESHOLDS: ValidityThresholds = ValidityThresholds {
    normal: Range::new(0., 50.),
    unusual: Range::new(-60., 70.),
    sanity: Range::new(-100., 100.),
};

pub const KELVIN_THRESHOLDS: ValidityThresholds = ValidityThresholds {
    normal: Range::new(273.15, 323.15),
    unusual: Range::new(213.15, 343.15),
    sanity: Range::new(150., 400.),
};

impl ValidityThresholds {
    pub fn for_unit(unit: Unit) -> &'static ValidityThresholds {
        match unit {
            Unit::Celsius => &CELSIUS_THRESHOLDS,
            Unit::Kelvin => &KELVIN_THRESHOLDS,
        }
    }

    /// Level of a finite value already known to be in this
    /// unit.
    pub fn level_of(&self, value: f64) -> TemperatureLevel {
        if self.normal.contains(value) {
            TemperatureLevel::Normal
        } else if self.unusual.contains(value) {
            TemperatureLevel::Unusual
        } else {
            TemperatureLevel::Impossible
        }
    }
}

#[inline]
pub fn matches_nodata(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) => (value - nd).abs() <= NODATA_TOLERANCE,
        None => false,
    }
}

/// Finite, and within the Celsius normal band once converted
/// with the locally inferred unit. This is the filter used
/// for every aggregate (cell averages, interpolation, band
/// scoring).
#[inline]
pub fn is_normal(value: f64) -> bool {
    value.is_finite() && CELSIUS_THRESHOLDS.normal.contains(as_celsius(value))
}

/// Outcome of [`Classifier::validate`].
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Validation {
    pub usable: bool,
    pub level: TemperatureLevel,
    pub message: String,
    #[serde(skip)]
    pub rejection: Option<Rejection>,
}

impl Validation {
    pub(crate) fn rejected(rejection: Rejection) -> Self {
        Validation {
            usable: false,
            level: TemperatureLevel::Impossible,
            message: rejection.to_string(),
            rejection: Some(rejection),
        }
    }
}

/// Per-value classifier for one band.
#[derive(Clone, Copy, Debug, Default)]
pub struct Classifier {
    nodata: Option<f64>,
}

impl Classifier {
    /// `nodata` must be expressed in the same (calibrated)
    /// units as the values passed in.
    pub fn new(nodata: Option<f64>) -> Self {
        Classifier { nodata }
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Range classification of a value by its inferred unit.
    /// Non-finite values are impossible. The nodata sentinel
    /// is not considered here, see [`validate`](Self::validate).
    pub fn classify(&self, value: f64) -> TemperatureLevel {
        if !value.is_finite() {
            return TemperatureLevel::Impossible;
        }
        ValidityThresholds::for_unit(infer_unit(value)).level_of(value)
    }

    pub fn validate(&self, value: f64) -> Validation {
        if matches_nodata(value, self.nodata) {
            return Validation::rejected(Rejection::NoDataValue);
        }
        if !value.is_finite() {
            return Validation::rejected(Rejection::NonFinite);
        }

        match self.classify(value) {
            TemperatureLevel::Normal => Validation {
                usable: true,
                level: TemperatureLevel::Normal,
                message: "Normal range".into(),
                rejection: None,
            },
            TemperatureLevel::Unusual => {
                let celsius = as_celsius(value);
                let message = if celsius < 0. {
                    format!("Extreme cold ({:.1}°C - Arctic/Antarctic)", celsius)
                } else {
                    format!("Extreme hot ({:.1}°C - Desert surface)", celsius)
                };
                Validation {
                    usable: true,
                    level: TemperatureLevel::Unusual,
                    message,
                    rejection: None,
                }
            }
            _ => Validation::rejected(Rejection::ImpossibleRange(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TemperatureLevel::*;

    fn sweep(from: f64, to: f64, steps: usize) -> impl Iterator<Item = f64> {
        let step = (to - from) / steps as f64;
        (0..=steps).map(move |i| (from + step * i as f64).min(to))
    }

    #[test]
    fn normal_celsius_and_kelvin() {
        let c = Classifier::default();
        for v in sweep(0., 50., 200) {
            assert_eq!(c.classify(v), Normal, "{}", v);
        }
        for v in sweep(273.15, 323.15, 200) {
            assert_eq!(c.classify(v), Normal, "{}", v);
        }
    }

    #[test]
    fn unusual_bands() {
        let c = Classifier::default();
        for v in sweep(-60., -0.01, 100).chain(sweep(50.01, 70., 100)) {
            assert_eq!(c.classify(v), Unusual, "{}", v);
        }
        assert_eq!(c.classify(213.15), Unusual);
        assert_eq!(c.classify(343.15), Unusual);
        assert_eq!(c.classify(330.), Unusual);
    }

    #[test]
    fn impossible_outside_sanity() {
        let c = Classifier::default();
        for &v in &[-100.01, -127., -9999., -1e30] {
            assert_eq!(c.classify(v), Impossible, "{}", v);
        }
        // Above 100 reads as Kelvin; far outside Kelvin bands.
        for &v in &[140., 500., 65535.] {
            assert_eq!(c.classify(v), Impossible, "{}", v);
        }
        assert_eq!(c.classify(f64::NAN), Impossible);
        assert_eq!(c.classify(f64::NEG_INFINITY), Impossible);
    }

    #[test]
    fn ordering_follows_trust() {
        assert!(Normal > Unusual);
        assert!(Unusual > Estimated);
        assert!(Estimated > Impossible);
        assert!(Estimated.is_usable());
        assert!(!Impossible.is_usable());
    }

    #[test]
    fn validate_messages() {
        let c = Classifier::new(Some(-9999.));

        let v = c.validate(-9999.005);
        assert!(!v.usable);
        assert_eq!(v.level, Impossible);
        assert_eq!(v.message, "NoData value (from metadata)");
        assert_eq!(v.rejection, Some(Rejection::NoDataValue));

        let v = c.validate(f64::NAN);
        assert_eq!(v.rejection, Some(Rejection::NonFinite));

        let v = c.validate(21.);
        assert!(v.usable);
        assert_eq!(v.message, "Normal range");

        let v = c.validate(-46.);
        assert!(v.usable);
        assert_eq!(v.level, Unusual);
        assert!(v.message.starts_with("Extreme cold (-46.0°C"));

        let v = c.validate(338.15);
        assert_eq!(v.level, Unusual);
        assert!(v.message.starts_with("Extreme hot (65.0°C"));

        let v = c.validate(-127.);
        assert!(!v.usable);
        assert_eq!(v.message, "Impossible value (-127.0) - likely NoData");
    }

    #[test]
    fn nodata_tolerance_is_absolute() {
        assert!(matches_nodata(-9999.009, Some(-9999.)));
        assert!(!matches_nodata(-9999.02, Some(-9999.)));
        assert!(!matches_nodata(-9999., None));
        assert!(!matches_nodata(f64::NAN, Some(f64::NAN)));
    }

    #[test]
    fn nan_sentinel_reports_invalid_value() {
        let v = Classifier::new(Some(f64::NAN)).validate(f64::NAN);
        assert!(!v.usable);
        assert_eq!(v.rejection, Some(Rejection::NonFinite));
        assert_eq!(v.message, "Invalid (NaN or Inf)");
    }

    #[test]
    fn normal_filter_uses_local_unit() {
        assert!(is_normal(0.));
        assert!(is_normal(50.));
        assert!(is_normal(295.));
        assert!(!is_normal(-0.1));
        assert!(!is_normal(80.));
        assert!(!is_normal(f64::NAN));
    }
}

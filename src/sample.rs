//! Query results.

use serde_derive::*;
use std::{fmt, str::FromStr};

use crate::{
    error::Rejection,
    grid::NeighborhoodAverage,
    interpolate::Interpolation,
    raster::GeoCoordinate,
    temperature::{TemperatureLevel, Validation},
    unit::{celsius_of, infer_unit, kelvin_of, Unit},
};

/// How a queried pixel is turned into a reading.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Average of the per-cell averages of the 3x3 block of
    /// grid cells around the pixel.
    Neighborhood,
    /// Average of the pixel's grid cell.
    Cell,
    /// The pixel itself.
    Pixel,
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::Neighborhood
    }
}

impl SamplingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SamplingMode::Neighborhood => "neighborhood",
            SamplingMode::Cell => "cell",
            SamplingMode::Pixel => "pixel",
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "neighborhood" | "9-grid" => Ok(SamplingMode::Neighborhood),
            "cell" | "grid" => Ok(SamplingMode::Cell),
            "pixel" => Ok(SamplingMode::Pixel),
            other => Err(format!("unknown sampling mode: {}", other)),
        }
    }
}

/// Answer to "what temperature is at this pixel".
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SampleResult {
    pub band_index: usize,
    pub row: usize,
    pub col: usize,
    /// In band units; NaN when nothing could be read.
    pub value: f64,
    pub unit: Unit,
    pub level: TemperatureLevel,
    /// Whether `value` may be presented as a temperature.
    pub usable: bool,
    pub coordinate: Option<GeoCoordinate>,
    pub message: String,
    pub mode: SamplingMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<NeighborhoodAverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<Interpolation>,
    #[serde(skip)]
    pub rejection: Option<Rejection>,
}

impl SampleResult {
    pub(crate) fn from_validation(
        band_index: usize,
        (row, col): (usize, usize),
        mode: SamplingMode,
        value: f64,
        validation: Validation,
    ) -> Self {
        SampleResult {
            band_index,
            row,
            col,
            value,
            unit: infer_unit(value),
            level: validation.level,
            usable: validation.usable,
            coordinate: None,
            message: validation.message,
            mode,
            neighborhood: None,
            interpolation: None,
            rejection: validation.rejection,
        }
    }

    /// Replace the reading with an interpolated estimate.
    pub(crate) fn estimated(mut self, interpolation: Interpolation) -> Self {
        self.message = format!(
            "Estimated from {} normal-range neighbors within {} px (replaces: {})",
            interpolation.neighbors_used, interpolation.radius_used, self.message
        );
        self.value = interpolation.value;
        self.unit = infer_unit(interpolation.value);
        self.level = TemperatureLevel::Estimated;
        self.usable = true;
        self.interpolation = Some(interpolation);
        self.rejection = None;
        self
    }

    /// Keep the original reading but mark it unreliable.
    pub(crate) fn unvalidated(mut self, rejection: Rejection) -> Self {
        self.message = format!("{} - cannot validate ({})", self.message, rejection);
        self.usable = false;
        self.rejection = Some(rejection);
        self
    }

    pub fn with_neighborhood(mut self, neighborhood: Option<NeighborhoodAverage>) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    pub fn with_coordinate(mut self, coordinate: GeoCoordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn celsius(&self) -> f64 {
        celsius_of(self.value, self.unit)
    }

    pub fn kelvin(&self) -> f64 {
        kelvin_of(self.value, self.unit)
    }

    pub fn is_estimated(&self) -> bool {
        self.level == TemperatureLevel::Estimated
    }
}

impl fmt::Display for SampleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.value.is_finite() {
            return f.write_str("No Data Available");
        }
        let c = self.celsius();
        match (self.level, self.usable) {
            (TemperatureLevel::Estimated, _) => write!(f, "{:.1} °C (Estimated)", c),
            (TemperatureLevel::Unusual, true) => write!(f, "{:.1} °C (Extreme)", c),
            (TemperatureLevel::Unusual, false) => write!(f, "{:.1} °C (Extreme - Unvalidated)", c),
            (TemperatureLevel::Impossible, _) => write!(f, "{:.1} °C (No Data)", c),
            (TemperatureLevel::Normal, _) => write!(f, "{:.1} °C", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!("Pixel".parse::<SamplingMode>(), Ok(SamplingMode::Pixel));
        assert_eq!("grid".parse::<SamplingMode>(), Ok(SamplingMode::Cell));
        assert_eq!(
            "neighborhood".parse::<SamplingMode>(),
            Ok(SamplingMode::Neighborhood)
        );
        assert!("bilinear".parse::<SamplingMode>().is_err());
        assert_eq!(SamplingMode::default(), SamplingMode::Neighborhood);
    }

    #[test]
    fn display_by_level() {
        let normal = SampleResult::from_validation(
            0,
            (1, 2),
            SamplingMode::Pixel,
            295.15,
            crate::temperature::Classifier::default().validate(295.15),
        );
        assert_eq!(normal.unit, Unit::Kelvin);
        assert!((normal.celsius() - 22.).abs() < 1e-9);
        assert_eq!(normal.to_string(), "22.0 °C");

        let extreme = SampleResult::from_validation(
            0,
            (1, 2),
            SamplingMode::Pixel,
            -46.,
            crate::temperature::Classifier::default().validate(-46.),
        )
        .unvalidated(Rejection::InsufficientNeighbors { radius: 15 });
        assert!(!extreme.usable);
        assert_eq!(extreme.to_string(), "-46.0 °C (Extreme - Unvalidated)");
        assert!(extreme.message.contains("cannot validate"));
    }

    #[test]
    fn serializes_without_empty_extras() {
        let r = SampleResult::from_validation(
            3,
            (0, 0),
            SamplingMode::Cell,
            20.,
            crate::temperature::Classifier::default().validate(20.),
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["level"], "normal");
        assert_eq!(json["mode"], "cell");
        assert_eq!(json["unit"], "Celsius");
        assert!(json.get("interpolation").is_none());
        assert!(json.get("rejection").is_none());
    }
}

//! Kelvin / Celsius interpretation of raw sample values.
//!
//! Thermal products are delivered in either unit and
//! rarely say which. Every comparison in this crate decides
//! the unit of a value locally, from the value alone, with
//! the same threshold: anything above [`KELVIN_THRESHOLD`]
//! is read as Kelvin.

use serde_derive::*;
use std::fmt;

/// Values strictly above this are interpreted as Kelvin.
pub const KELVIN_THRESHOLD: f64 = 100.;

/// `K = C + CELSIUS_OFFSET`
pub const CELSIUS_OFFSET: f64 = 273.15;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    Celsius,
    Kelvin,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Celsius => "°C",
            Unit::Kelvin => "K",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Celsius => f.write_str("Celsius"),
            Unit::Kelvin => f.write_str("Kelvin"),
        }
    }
}

/// Infer the unit of a single value.
///
/// NaN compares false against the threshold and so reads
/// as Celsius; callers that care check finiteness first.
#[inline]
pub fn infer_unit(value: f64) -> Unit {
    if value > KELVIN_THRESHOLD {
        Unit::Kelvin
    } else {
        Unit::Celsius
    }
}

#[inline]
pub fn celsius_of(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Celsius => value,
        Unit::Kelvin => value - CELSIUS_OFFSET,
    }
}

#[inline]
pub fn kelvin_of(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Celsius => value + CELSIUS_OFFSET,
        Unit::Kelvin => value,
    }
}

/// Celsius-equivalent of a value using its inferred unit.
#[inline]
pub fn as_celsius(value: f64) -> f64 {
    celsius_of(value, infer_unit(value))
}

//! Library to query temperatures from thermal rasters.
//!
//! Given a single- or multi-band raster of surface
//! temperatures (Celsius or Kelvin, possibly scaled and with
//! a nodata sentinel), the crate answers "what temperature is
//! at this pixel, and how far can it be trusted?".
//!
//! # Usage
//!
//! The entry point is [`ThermalEngine`], built over any
//! [`RasterSource`]. The crate ships [`InMemoryRaster`] and
//! a GeoTIFF reader ([`geotiff::GeoTiff`]).
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use thermal_probe::{geotiff::GeoTiff, EngineConfig, ThermalEngine};
//! let raster = GeoTiff::open("scene.tif")?;
//! let mut engine = ThermalEngine::open(raster, EngineConfig::default())?;
//! let reading = engine.sample(120, 340);
//! println!("{} ({})", reading, reading.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Classification
//!
//! Every value is judged on its own: values above 100 are
//! taken to be Kelvin, the rest Celsius. A
//! [`TemperatureLevel`] is assigned from unit-specific
//! ranges; see [`temperature::ValidityThresholds`].
//!
//! ## Sampling
//!
//! Queries go through a grid of square cells
//! ([`grid::GridGeometry`]) whose size adapts to the raster.
//! By default the reading at a pixel is the average over the
//! 3x3 block of cells around it, using only normal-range
//! samples. Readings that are not normal are replaced by an
//! inverse-distance estimate from normal-range neighbors
//! ([`interpolate::NeighborInterpolator`]) when one exists.
//!
//! ## Band selection
//!
//! On multi-band rasters the engine loads the band with the
//! largest share of normal-range samples; see
//! [`band::select_best_band`].

pub mod band;
pub mod config;
pub mod engine;
pub mod error;
pub mod geotiff;
pub mod grid;
pub mod interpolate;
pub mod quality;
pub mod raster;
pub mod sample;
pub mod temperature;
pub mod unit;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::config::EngineConfig;
pub use crate::engine::ThermalEngine;
pub use crate::error::{RasterError, Rejection};
pub use crate::quality::{QualityLevel, QualityReport};
pub use crate::raster::{InMemoryRaster, RasterSource};
pub use crate::sample::{SampleResult, SamplingMode};
pub use crate::temperature::TemperatureLevel;
pub use crate::unit::Unit;

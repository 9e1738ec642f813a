//! Engine configuration.

use serde_derive::*;
use std::{fs::File, io::BufReader, path::Path};
use thiserror::Error;

use crate::{
    interpolate::{DEFAULT_MAX_RADIUS, MIN_NEIGHBORS},
    sample::SamplingMode,
};

/// Pixel budget above which a raster is block-averaged on
/// load.
pub const DEFAULT_MAX_LOADED_PIXELS: usize = 50_000_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file")]
    Io(#[from] std::io::Error),

    #[error("malformed config file")]
    Json(#[from] serde_json::Error),

    #[error("`{0}` must be positive")]
    NotPositive(&'static str),
}

/// Tunables of [`ThermalEngine`](crate::ThermalEngine).
/// Missing fields take their defaults when deserialized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest search radius for neighbor interpolation.
    pub max_radius: usize,
    pub min_neighbors: usize,
    pub sampling_mode: SamplingMode,
    /// Grid cell edge; adaptive to the raster size if unset.
    pub cell_size: Option<usize>,
    /// Load the best scoring band on open instead of band 0.
    pub auto_select_band: bool,
    pub max_loaded_pixels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_radius: DEFAULT_MAX_RADIUS,
            min_neighbors: MIN_NEIGHBORS,
            sampling_mode: SamplingMode::default(),
            cell_size: None,
            auto_select_band: true,
            max_loaded_pixels: DEFAULT_MAX_LOADED_PIXELS,
        }
    }
}

impl EngineConfig {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_radius == 0 {
            return Err(ConfigError::NotPositive("max_radius"));
        }
        if self.min_neighbors == 0 {
            return Err(ConfigError::NotPositive("min_neighbors"));
        }
        if self.cell_size == Some(0) {
            return Err(ConfigError::NotPositive("cell_size"));
        }
        if self.max_loaded_pixels == 0 {
            return Err(ConfigError::NotPositive("max_loaded_pixels"));
        }
        Ok(())
    }
}

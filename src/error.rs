//! Error types.
//!
//! [`Rejection`] describes why a value, cell, band or
//! interpolation attempt produced no trustworthy reading.
//! These are ordinary outcomes of a query and are carried
//! as values. [`RasterError`] covers failures of the raster
//! source the engine reads from.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Value matches the declared sentinel.
    #[error("NoData value (from metadata)")]
    NoDataValue,

    #[error("Invalid (NaN or Inf)")]
    NonFinite,

    /// Value outside every plausible range for its unit.
    #[error("Impossible value ({0:.1}) - likely NoData")]
    ImpossibleRange(f64),

    /// Interpolation gave up at `radius`.
    #[error("not enough normal-range neighbors within {radius} px")]
    InsufficientNeighbors { radius: usize },

    /// No qualifying pixel in the grid cell (or its 3x3 neighborhood).
    #[error("no qualifying samples around grid cell ({row}, {col})")]
    EmptyCell { row: usize, col: usize },

    #[error("band {0} has no finite samples")]
    EmptyBand(usize),
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("band index {index} out of range (band count {count})")]
    BandOutOfRange { index: usize, count: usize },

    #[error("window {window:?} exceeds raster of {width}x{height}")]
    WindowOutOfBounds {
        window: crate::raster::Window,
        width: usize,
        height: usize,
    },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("raster has no bands")]
    Empty,

    #[error("invalid raster metadata: {0}")]
    Metadata(String),

    #[error("failed to read raster: {0}")]
    Read(String),

    #[error("invalid engine configuration")]
    Config(#[from] crate::config::ConfigError),
}

impl RasterError {
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }
}

impl From<ndarray::ShapeError> for RasterError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Read(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RasterError>;

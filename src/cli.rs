//! Helpers to parse CLI arguments in the accompanying
//! binaries.
//!
//! APIs here shouldn't be considered stable / used as a
//! library.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
pub use clap::{App, Arg};
use indicatif::{ProgressBar, ProgressStyle};
pub use inflector::Inflector;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing_subscriber::EnvFilter;

use crate::{config::EngineConfig, engine::ThermalEngine, geotiff::GeoTiff};

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use $crate::cli::Inflector;
        $crate::cli::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Engine config from an optional JSON file.
pub fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("could not load config from {}", path)),
        None => Ok(EngineConfig::default()),
    }
}

/// Parse a `row,col` pixel position.
pub fn parse_pixel(text: &str) -> Result<(usize, usize)> {
    let mut parts = text.splitn(2, ',');
    let mut next = |what: &str| -> Result<usize> {
        parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("missing {} in pixel {:?}", what, text))?
            .parse()
            .with_context(|| format!("invalid {} in pixel {:?}", what, text))
    };
    Ok((next("row")?, next("column")?))
}

pub struct ThermalInput {
    pub filename: String,
    pub engine: ThermalEngine<GeoTiff>,
}

impl ThermalInput {
    pub fn try_from_path(filename: String, config: EngineConfig) -> Result<Self> {
        let raster = GeoTiff::open(Path::new(&filename))?;
        let engine = ThermalEngine::open(raster, config)
            .with_context(|| format!("could not load {}", filename))?;
        Ok(ThermalInput { filename, engine })
    }
}

pub fn process_paths_par(
    paths: Vec<String>,
    config: EngineConfig,
) -> impl IntoParallelIterator<Item = Result<ThermalInput>> {
    let bar = ProgressBar::new(paths.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar:cyan/blue} {pos:>7}/{len:7}"),
    );

    paths
        .into_par_iter()
        .map(move |p| ThermalInput::try_from_path(p, config.clone()))
        .inspect(move |_| bar.inc(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_positions() {
        assert_eq!(parse_pixel("12,7").unwrap(), (12, 7));
        assert_eq!(parse_pixel(" 3 , 4 ").unwrap(), (3, 4));
        assert!(parse_pixel("12").is_err());
        assert!(parse_pixel("a,1").is_err());
        assert!(parse_pixel("1,-1").is_err());
    }

    #[test]
    fn default_config_without_path() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
        assert!(load_config(Some("/nonexistent/config.json")).is_err());
    }
}

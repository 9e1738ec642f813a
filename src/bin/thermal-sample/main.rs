mod args;

use anyhow::{ensure, Result};
use args::Args;
use serde_derive::*;

use thermal_probe::{
    cli::{init_tracing, load_config, ThermalInput},
    SampleResult,
};

fn main() -> Result<()> {
    init_tracing();
    let Args {
        path,
        pixels,
        config,
        band,
        mode,
        max_radius,
    } = Args::from_cmd_line()?;

    let mut config = load_config(config.as_deref())?;
    if let Some(mode) = mode {
        config.sampling_mode = mode;
    }
    if let Some(max_radius) = max_radius {
        config.max_radius = max_radius;
    }
    if band.is_some() {
        config.auto_select_band = false;
    }

    let ThermalInput {
        filename,
        mut engine,
    } = ThermalInput::try_from_path(path, config)?;

    if let Some(band) = band {
        ensure!(
            band < engine.band_count(),
            "band {} out of range: {} has {} bands",
            band,
            filename,
            engine.band_count()
        );
        engine.load_band(band);
    }

    let (height, width) = engine.band().dim();
    let mut samples = Vec::with_capacity(pixels.len());
    for (row, col) in pixels {
        ensure!(
            row < height && col < width,
            "pixel ({}, {}) outside raster of {}x{}",
            row,
            col,
            width,
            height
        );
        let sample = engine.sample(row, col);
        eprintln!("({}, {}): {}", row, col, sample);
        samples.push(sample);
    }

    #[derive(Debug, Serialize)]
    struct OutputJson {
        path: String,
        band: usize,
        band_name: String,
        unit: String,
        downsample_factor: usize,
        cell_size: usize,
        samples: Vec<SampleResult>,
    }

    let band = engine.active_band();
    serde_json::to_writer(
        std::io::stdout().lock(),
        &OutputJson {
            path: filename,
            band,
            band_name: engine.band_name(band),
            unit: engine.unit_label().to_string(),
            downsample_factor: engine.downsample_factor(),
            cell_size: engine.grid_geometry().cell_size,
            samples,
        },
    )?;

    Ok(())
}

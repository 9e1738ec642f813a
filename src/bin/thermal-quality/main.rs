mod args;

use anyhow::Result;
use args::Args;
use serde_derive::*;

use thermal_probe::{
    band::{BandScore, DisplayMode},
    cli::{init_tracing, load_config, process_paths_par, ThermalInput},
    QualityReport,
};

fn main() -> Result<()> {
    init_tracing();
    let Args {
        paths,
        config,
        all_bands,
    } = Args::from_cmd_line()?;
    let config = load_config(config.as_deref())?;

    use rayon::prelude::*;
    let (rasters, cumulative) = process_paths_par(paths, config)
        .into_par_iter()
        .map(|input| -> Result<_> { Ok(RasterQuality::from_input(input?, all_bands)) })
        .try_fold(
            || (vec![], Cumulative::default()),
            |mut acc, item| -> Result<_> {
                let item = item?;
                acc.1 += &item;
                acc.0.push(item);
                Ok(acc)
            },
        )
        .try_reduce(
            || (vec![], Cumulative::default()),
            |mut acc1, acc2| -> Result<_> {
                acc1.0.extend(acc2.0);
                acc1.1.merge(&acc2.1);
                Ok(acc1)
            },
        )?;

    #[derive(Debug, Serialize)]
    struct OutputJson {
        rasters: Vec<RasterQuality>,
        cumulative: Cumulative,
    }

    serde_json::to_writer(
        std::io::stdout().lock(),
        &OutputJson {
            rasters,
            cumulative,
        },
    )?;

    Ok(())
}

#[derive(Serialize, Debug)]
struct BandQuality {
    band: usize,
    name: String,
    report: QualityReport,
}

#[derive(Serialize, Debug)]
struct RasterQuality {
    path: String,
    width: usize,
    height: usize,
    downsample_factor: usize,
    display_mode: DisplayMode,
    selected_band: usize,
    unit: String,
    band_scores: Vec<BandScore>,
    bands: Vec<BandQuality>,
}

impl RasterQuality {
    fn from_input(input: ThermalInput, all_bands: bool) -> Self {
        let ThermalInput { filename, engine } = input;
        let selected_band = engine.active_band();
        let report_bands = if all_bands {
            (0..engine.band_count()).collect()
        } else {
            vec![selected_band]
        };

        let bands = report_bands
            .into_iter()
            .map(|band| BandQuality {
                band,
                name: engine.band_name(band),
                report: engine.quality_report(band),
            })
            .collect();

        let (height, width) = engine.band().dim();
        RasterQuality {
            path: filename,
            width,
            height,
            downsample_factor: engine.downsample_factor(),
            display_mode: engine.display_mode(),
            selected_band,
            unit: engine.unit_label().to_string(),
            band_scores: engine.band_scores(),
            bands,
        }
    }

    fn selected_report(&self) -> Option<&QualityReport> {
        self.bands
            .iter()
            .find(|b| b.band == self.selected_band)
            .map(|b| &b.report)
    }
}

/// Totals over the selected band of every raster.
#[derive(Serialize, Debug, Default)]
struct Cumulative {
    rasters: usize,
    valid_pixel_count: usize,
    total_pixel_count: usize,
}

impl Cumulative {
    fn merge(&mut self, other: &Cumulative) {
        self.rasters += other.rasters;
        self.valid_pixel_count += other.valid_pixel_count;
        self.total_pixel_count += other.total_pixel_count;
    }
}

impl std::ops::AddAssign<&RasterQuality> for Cumulative {
    fn add_assign(&mut self, raster: &RasterQuality) {
        self.rasters += 1;
        if let Some(report) = raster.selected_report() {
            self.valid_pixel_count += report.valid_pixel_count;
            self.total_pixel_count += report.total_pixel_count;
        }
    }
}

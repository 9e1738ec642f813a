//! The query engine over one open raster.

use tracing::info;

use crate::{
    band::{self, BandScore, DisplayMode},
    config::EngineConfig,
    error::Result,
    grid::{CacheStats, GridGeometry, GridSampler},
    interpolate::NeighborInterpolator,
    quality::{self, QualityReport, UnitLabel},
    raster::{downsample_factor, BandStack, RasterBand, RasterSource},
    sample::{SampleResult, SamplingMode},
    temperature::Classifier,
};

/// Temperature lookups on a raster.
///
/// Every band is read from the source once, on
/// [`open`](Self::open). One band is active at a time; its
/// grid averages are cached until another band is loaded.
///
/// Pixel coordinates passed to and returned from the engine
/// refer to the loaded (possibly downsampled) grid.
#[derive(Debug)]
pub struct ThermalEngine<S> {
    source: S,
    config: EngineConfig,
    stack: BandStack,
    factor: usize,
    display_mode: DisplayMode,
    band: RasterBand,
    classifier: Classifier,
    interpolator: NeighborInterpolator,
    sampler: GridSampler,
    last_query: Option<(usize, usize)>,
}

impl<S: RasterSource> ThermalEngine<S> {
    pub fn open(source: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let (width, height, count) = (source.width(), source.height(), source.band_count());
        let factor = downsample_factor(width, height, count, config.max_loaded_pixels);
        if factor > 1 {
            info!(
                factor,
                width, height, "raster exceeds {} pixels, downsampling", config.max_loaded_pixels
            );
        }
        let stack = BandStack::from_source_downsampled(&source, factor)?;

        let display_mode = band::detect_display_mode(&stack);
        let active = if config.auto_select_band && display_mode != DisplayMode::RgbComposite {
            band::select_best_band(&stack)
        } else {
            0
        };

        let geometry = match config.cell_size {
            Some(cell_size) => GridGeometry::with_cell_size(stack.width(), stack.height(), cell_size),
            None => GridGeometry::for_raster(stack.width(), stack.height()),
        };
        let band = stack.band(active);
        let engine = ThermalEngine {
            classifier: Classifier::new(band.calibrated_nodata()),
            interpolator: interpolator_for(&band, &config),
            sampler: GridSampler::new(geometry).with_mode(config.sampling_mode),
            band,
            source,
            config,
            stack,
            factor,
            display_mode,
            last_query: None,
        };

        info!(
            bands = count,
            active,
            mode = %display_mode,
            cell_size = geometry.cell_size,
            "opened raster"
        );
        Ok(engine)
    }

    /// Make band `band_index` the active band.
    ///
    /// Panics when `band_index >= band_count()`.
    pub fn load_band(&mut self, band_index: usize) {
        if band_index == self.band.index() {
            return;
        }
        let band = self.stack.band(band_index);
        self.classifier = Classifier::new(band.calibrated_nodata());
        self.interpolator = interpolator_for(&band, &self.config);
        self.band = band;
        self.sampler.invalidate();
        info!(band = band_index, "loaded band");
    }

    /// Temperature at pixel `(row, col)` of the active band.
    ///
    /// Panics when the pixel lies outside the raster.
    pub fn sample(&mut self, row: usize, col: usize) -> SampleResult {
        let result = self
            .sampler
            .sample(&self.band, &self.classifier, &self.interpolator, row, col);
        self.last_query = Some((row, col));

        let (src_row, src_col) = self.source_pixel(row, col);
        let coordinate = self.source.pixel_to_geographic(src_row, src_col);
        result.with_coordinate(coordinate)
    }

    /// Repeat the last [`sample`](Self::sample) query, e.g.
    /// after switching bands.
    pub fn resample_last(&mut self) -> Option<SampleResult> {
        let (row, col) = self.last_query?;
        Some(self.sample(row, col))
    }

    /// Fill the grid cache of the active band.
    pub fn precompute(&mut self) {
        self.sampler.precompute(&self.band);
    }

    /// Panics when `band_index >= band_count()`.
    pub fn quality_report(&self, band_index: usize) -> QualityReport {
        if band_index == self.band.index() {
            quality::quality_report(&self.band)
        } else {
            quality::quality_report(&self.stack.band(band_index))
        }
    }

    pub fn unit_label(&self) -> UnitLabel {
        quality::unit_label(&self.band)
    }

    pub fn select_best_band(&self) -> usize {
        band::select_best_band(&self.stack)
    }

    pub fn band_scores(&self) -> Vec<BandScore> {
        band::band_scores(&self.stack)
    }

    pub fn band_name(&self, band_index: usize) -> String {
        band::band_name(self.band_count(), band_index)
    }

    pub fn grid_geometry(&self) -> GridGeometry {
        self.sampler.geometry()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.sampler.cache_stats()
    }

    pub fn sampling_mode(&self) -> SamplingMode {
        self.sampler.mode()
    }

    pub fn set_sampling_mode(&mut self, mode: SamplingMode) {
        self.sampler.set_mode(mode);
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn active_band(&self) -> usize {
        self.band.index()
    }

    pub fn band(&self) -> &RasterBand {
        &self.band
    }

    pub fn band_count(&self) -> usize {
        self.stack.band_count()
    }

    /// Block size of the load-time downsampling; 1 if the
    /// raster was loaded at full resolution.
    pub fn downsample_factor(&self) -> usize {
        self.factor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Center pixel of the source block behind a loaded
    /// pixel.
    fn source_pixel(&self, row: usize, col: usize) -> (usize, usize) {
        if self.factor == 1 {
            return (row, col);
        }
        let half = self.factor / 2;
        (
            (row * self.factor + half).min(self.source.height() - 1),
            (col * self.factor + half).min(self.source.width() - 1),
        )
    }
}

fn interpolator_for(band: &RasterBand, config: &EngineConfig) -> NeighborInterpolator {
    NeighborInterpolator::for_band(band)
        .with_max_radius(config.max_radius)
        .with_min_neighbors(config.min_neighbors)
}

//! Raster data model and the interface to raster readers.
//!
//! The engine never opens files itself. A reader implements
//! [`RasterSource`]; the engine pulls every band once into a
//! [`BandStack`] and hands out calibrated [`RasterBand`]s
//! from it.

use ndarray::{s, Array2, Array3, ArrayView2, Axis, Zip};
use serde_derive::*;

use crate::{
    error::{RasterError, Result},
    temperature::matches_nodata,
};

/// Pixel window `rows x cols` starting at `(row_off, col_off)`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    pub fn new(row_off: usize, col_off: usize, rows: usize, cols: usize) -> Self {
        Window {
            row_off,
            col_off,
            rows,
            cols,
        }
    }

    /// Window anchored at the origin, clipped to the raster.
    pub fn top_left(rows: usize, cols: usize, height: usize, width: usize) -> Self {
        Window::new(0, 0, rows.min(height), cols.min(width))
    }

    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.row_off + self.rows <= height && self.col_off + self.cols <= width
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoCoordinate {
    pub longitude: f64,
    pub latitude: f64,
}

/// Affine pixel to map transform, GDAL coefficient order:
///
/// ```text
/// x = t[0] + col * t[1] + row * t[2]
/// y = t[3] + col * t[4] + row * t[5]
/// ```
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl Default for GeoTransform {
    fn default() -> Self {
        GeoTransform([0., 1., 0., 0., 0., 1.])
    }
}

impl GeoTransform {
    /// North-up transform from a GeoTIFF tiepoint (`raster
    /// (i, j)` maps to `model (x, y)`) and pixel scale.
    pub fn from_tiepoint(tiepoint: [f64; 4], pixel_scale: [f64; 2]) -> Self {
        let [i, j, x, y] = tiepoint;
        let [sx, sy] = pixel_scale;
        GeoTransform([x - i * sx, sx, 0., y + j * sy, 0., -sy])
    }

    /// Map coordinate of the center of pixel `(row, col)`.
    pub fn pixel_center(&self, row: usize, col: usize) -> GeoCoordinate {
        let t = &self.0;
        let (r, c) = (row as f64 + 0.5, col as f64 + 0.5);
        GeoCoordinate {
            longitude: t[0] + c * t[1] + r * t[2],
            latitude: t[3] + c * t[4] + r * t[5],
        }
    }
}

/// Calibration metadata of one band.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BandMetadata {
    /// Sentinel in raw (uncalibrated) units.
    pub nodata: Option<f64>,
    pub scale: f64,
    pub offset: f64,
}

impl Default for BandMetadata {
    fn default() -> Self {
        BandMetadata {
            nodata: None,
            scale: 1.,
            offset: 0.,
        }
    }
}

impl BandMetadata {
    pub fn with_nodata(nodata: Option<f64>) -> Self {
        BandMetadata {
            nodata,
            ..Default::default()
        }
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }

    pub fn is_identity(&self) -> bool {
        self.scale == 1. && self.offset == 0.
    }
}

/// One band of calibrated samples (`raw * scale + offset`).
///
/// Read-only once built; a band switch builds a new one.
#[derive(Clone, Debug)]
pub struct RasterBand {
    index: usize,
    values: Array2<f64>,
    meta: BandMetadata,
}

impl RasterBand {
    pub fn from_raw(index: usize, raw: Array2<f64>, meta: BandMetadata) -> Self {
        let values = if meta.is_identity() {
            raw
        } else {
            raw.mapv(|v| meta.apply(v))
        };
        RasterBand {
            index,
            values,
            meta,
        }
    }

    /// Band whose samples are already calibrated.
    pub fn from_values(index: usize, values: Array2<f64>, nodata: Option<f64>) -> Self {
        Self::from_raw(index, values, BandMetadata::with_nodata(nodata))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Raw nodata sentinel as declared by the source.
    pub fn nodata(&self) -> Option<f64> {
        self.meta.nodata
    }

    /// Nodata sentinel in the calibrated units of
    /// [`values`](Self::values).
    pub fn calibrated_nodata(&self) -> Option<f64> {
        self.meta.nodata.map(|nd| self.meta.apply(nd))
    }

    pub fn scale(&self) -> f64 {
        self.meta.scale
    }

    pub fn offset(&self) -> f64 {
        self.meta.offset
    }

    pub fn metadata(&self) -> &BandMetadata {
        &self.meta
    }

    /// `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Panics when `(row, col)` is outside the band.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[(row, col)]
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.height() && col < self.width()
    }
}

/// All bands of a raster, as read from the source.
#[derive(Clone, Debug)]
pub struct BandStack {
    raw: Array3<f64>,
    metadata: Vec<BandMetadata>,
}

impl BandStack {
    /// `raw` is indexed `(band, row, col)`.
    pub fn new(raw: Array3<f64>, metadata: Vec<BandMetadata>) -> Result<Self> {
        let count = raw.len_of(Axis(0));
        if count == 0 {
            return Err(RasterError::Empty);
        }
        if metadata.len() != count {
            return Err(RasterError::metadata(format!(
                "{} metadata entries for {} bands",
                metadata.len(),
                count
            )));
        }
        Ok(BandStack { raw, metadata })
    }

    pub fn single(raw: Array2<f64>, meta: BandMetadata) -> Self {
        BandStack {
            raw: raw.insert_axis(Axis(0)),
            metadata: vec![meta],
        }
    }

    /// Read every band of `source` in full.
    pub fn from_source<S: RasterSource + ?Sized>(source: &S) -> Result<Self> {
        let count = source.band_count();
        if count == 0 {
            return Err(RasterError::Empty);
        }
        let (height, width) = (source.height(), source.width());
        let mut raw = Array3::zeros((count, height, width));
        let mut metadata = Vec::with_capacity(count);
        for band in 0..count {
            let values = source.read(band, None)?;
            if values.dim() != (height, width) {
                return Err(RasterError::ShapeMismatch {
                    expected: (height, width),
                    found: values.dim(),
                });
            }
            raw.index_axis_mut(Axis(0), band).assign(&values);
            metadata.push(source.metadata(band));
        }
        BandStack::new(raw, metadata)
    }

    /// Read every band of `source` block-averaged by
    /// `factor`, one strip of `factor` rows at a time, so a
    /// full-resolution band is never held in memory.
    pub fn from_source_downsampled<S: RasterSource + ?Sized>(
        source: &S,
        factor: usize,
    ) -> Result<Self> {
        if factor <= 1 {
            return Self::from_source(source);
        }
        let count = source.band_count();
        if count == 0 {
            return Err(RasterError::Empty);
        }
        let (height, width) = (source.height(), source.width());
        let out_h = (height / factor).max(1);
        let out_w = (width / factor).max(1);
        let mut raw = Array3::zeros((count, out_h, out_w));
        let mut metadata = Vec::with_capacity(count);
        for band in 0..count {
            let meta = source.metadata(band);
            for r in 0..out_h {
                let row_off = r * factor;
                let rows = factor.min(height - row_off);
                let strip = source.read(band, Some(Window::new(row_off, 0, rows, width)))?;
                if strip.dim() != (rows, width) {
                    return Err(RasterError::ShapeMismatch {
                        expected: (rows, width),
                        found: strip.dim(),
                    });
                }
                let strip = strip.view();
                let mut out = raw.slice_mut(s![band, r, ..]);
                for (c, o) in out.iter_mut().enumerate() {
                    *o = block_mean(&strip, 0, c * factor, factor, meta.nodata);
                }
            }
            metadata.push(meta);
        }
        BandStack::new(raw, metadata)
    }

    pub fn band_count(&self) -> usize {
        self.metadata.len()
    }

    pub fn height(&self) -> usize {
        self.raw.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.raw.len_of(Axis(2))
    }

    pub fn metadata(&self, index: usize) -> &BandMetadata {
        &self.metadata[index]
    }

    pub fn raw_band(&self, index: usize) -> ArrayView2<'_, f64> {
        self.assert_band(index);
        self.raw.index_axis(Axis(0), index)
    }

    /// Calibrated copy of band `index`.
    ///
    /// Panics when `index >= band_count()`.
    pub fn band(&self, index: usize) -> RasterBand {
        self.assert_band(index);
        RasterBand::from_raw(
            index,
            self.raw.index_axis(Axis(0), index).to_owned(),
            self.metadata[index],
        )
    }

    /// Block-average every band by `factor`, ignoring
    /// non-finite and nodata samples.
    pub fn downsampled(&self, factor: usize) -> BandStack {
        if factor <= 1 {
            return self.clone();
        }
        let out_h = (self.height() / factor).max(1);
        let out_w = (self.width() / factor).max(1);
        let mut raw = Array3::zeros((self.band_count(), out_h, out_w));
        for (band, mut out) in raw.axis_iter_mut(Axis(0)).enumerate() {
            let src = self.raw.index_axis(Axis(0), band);
            let nodata = self.metadata[band].nodata;
            Zip::indexed(&mut out).par_for_each(|(r, c), o| {
                *o = block_mean(&src, r * factor, c * factor, factor, nodata);
            });
        }
        BandStack {
            raw,
            metadata: self.metadata.clone(),
        }
    }

    fn assert_band(&self, index: usize) {
        assert!(
            index < self.band_count(),
            "band index {} out of range (band count {})",
            index,
            self.band_count()
        );
    }
}

fn block_mean(
    src: &ArrayView2<f64>,
    row: usize,
    col: usize,
    factor: usize,
    nodata: Option<f64>,
) -> f64 {
    let (h, w) = src.dim();
    let block = src.slice(s![row..(row + factor).min(h), col..(col + factor).min(w)]);
    let (sum, count) = block
        .iter()
        .filter(|v| v.is_finite() && !matches_nodata(**v, nodata))
        .fold((0., 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        nodata.unwrap_or(f64::NAN)
    } else {
        sum / count as f64
    }
}

/// Downsampling factor that keeps `width * height * bands`
/// within `max_pixels`.
pub fn downsample_factor(width: usize, height: usize, bands: usize, max_pixels: usize) -> usize {
    let total = width * height * bands;
    if total <= max_pixels {
        1
    } else {
        (total as f64 / max_pixels as f64).sqrt().ceil() as usize
    }
}

/// A reader of raster bands.
pub trait RasterSource {
    fn band_count(&self) -> usize;
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Raw samples of band `band_index`, optionally
    /// restricted to `window`.
    fn read(&self, band_index: usize, window: Option<Window>) -> Result<Array2<f64>>;

    fn nodata(&self) -> Option<f64>;

    fn scale(&self, _band_index: usize) -> f64 {
        1.
    }

    fn offset(&self, _band_index: usize) -> f64 {
        0.
    }

    fn pixel_to_geographic(&self, row: usize, col: usize) -> GeoCoordinate;

    fn metadata(&self, band_index: usize) -> BandMetadata {
        BandMetadata {
            nodata: self.nodata(),
            scale: self.scale(band_index),
            offset: self.offset(band_index),
        }
    }
}

/// Raster held entirely in memory.
#[derive(Clone, Debug)]
pub struct InMemoryRaster {
    data: Array3<f64>,
    nodata: Option<f64>,
    scales: Vec<f64>,
    offsets: Vec<f64>,
    transform: GeoTransform,
}

impl InMemoryRaster {
    /// `data` is indexed `(band, row, col)`.
    pub fn new(data: Array3<f64>) -> Self {
        let count = data.len_of(Axis(0));
        InMemoryRaster {
            data,
            nodata: None,
            scales: vec![1.; count],
            offsets: vec![0.; count],
            transform: GeoTransform::default(),
        }
    }

    pub fn single_band(data: Array2<f64>) -> Self {
        Self::new(data.insert_axis(Axis(0)))
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Panics when `band_index` is out of range.
    pub fn with_calibration(mut self, band_index: usize, scale: f64, offset: f64) -> Self {
        self.scales[band_index] = scale;
        self.offsets[band_index] = offset;
        self
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }
}

impl RasterSource for InMemoryRaster {
    fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    fn read(&self, band_index: usize, window: Option<Window>) -> Result<Array2<f64>> {
        let count = self.band_count();
        if band_index >= count {
            return Err(RasterError::BandOutOfRange {
                index: band_index,
                count,
            });
        }
        let band = self.data.index_axis(Axis(0), band_index);
        match window {
            None => Ok(band.to_owned()),
            Some(w) if w.fits(self.width(), self.height()) => Ok(band
                .slice(s![w.row_off..w.row_off + w.rows, w.col_off..w.col_off + w.cols])
                .to_owned()),
            Some(window) => Err(RasterError::WindowOutOfBounds {
                window,
                width: self.width(),
                height: self.height(),
            }),
        }
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn scale(&self, band_index: usize) -> f64 {
        self.scales[band_index]
    }

    fn offset(&self, band_index: usize) -> f64 {
        self.offsets[band_index]
    }

    fn pixel_to_geographic(&self, row: usize, col: usize) -> GeoCoordinate {
        self.transform.pixel_center(row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn calibration_applied_once() {
        let raw = array![[100., 200.], [300., -9999.]];
        let meta = BandMetadata {
            nodata: Some(-9999.),
            scale: 0.1,
            offset: 273.15,
        };
        let band = RasterBand::from_raw(0, raw, meta);
        assert!((band.get(0, 1) - 293.15).abs() < 1e-9);
        assert_eq!(band.nodata(), Some(-9999.));
        let nd = band.calibrated_nodata().unwrap();
        assert!((band.get(1, 1) - nd).abs() < 1e-9);
    }

    #[test]
    fn stack_from_source() -> Result<()> {
        let data = Array::from_shape_fn((3, 4, 5), |(b, r, c)| (b * 100 + r * 10 + c) as f64);
        let source = InMemoryRaster::new(data)
            .with_nodata(Some(-1.))
            .with_calibration(2, 2., 1.);
        let stack = BandStack::from_source(&source)?;
        assert_eq!(stack.band_count(), 3);
        assert_eq!((stack.height(), stack.width()), (4, 5));
        assert_eq!(stack.band(1).get(2, 3), 123.);
        assert_eq!(stack.band(2).get(0, 1), 403.);
        assert_eq!(stack.metadata(0).nodata, Some(-1.));
        Ok(())
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn band_index_is_a_contract() {
        BandStack::single(Array2::zeros((2, 2)), BandMetadata::default()).band(1);
    }

    #[test]
    fn windowed_reads() {
        let source = InMemoryRaster::single_band(Array::from_shape_fn((6, 6), |(r, c)| {
            (r * 6 + c) as f64
        }));
        let w = source.read(0, Some(Window::new(2, 3, 2, 2))).unwrap();
        assert_eq!(w, array![[15., 16.], [21., 22.]]);
        assert!(source.read(0, Some(Window::new(5, 5, 2, 2))).is_err());
        assert!(source.read(1, None).is_err());
        assert_eq!(Window::top_left(100, 100, 6, 6), Window::new(0, 0, 6, 6));
    }

    #[test]
    fn pixel_centers() {
        let t = GeoTransform::from_tiepoint([0., 0., 10., 50.], [0.5, 0.25]);
        let g = t.pixel_center(0, 0);
        assert_eq!(g.longitude, 10.25);
        assert_eq!(g.latitude, 49.875);
        let g = t.pixel_center(3, 2);
        assert_eq!(g.longitude, 11.25);
        assert_eq!(g.latitude, 49.125);
    }

    #[test]
    fn downsampling_skips_nodata() {
        let mut raw = Array2::from_elem((4, 4), 20.);
        raw[(0, 0)] = -9999.;
        raw[(0, 1)] = f64::NAN;
        raw[(0, 2)] = 24.;
        raw[(2, 2)] = -9999.;
        raw[(2, 3)] = -9999.;
        raw[(3, 2)] = -9999.;
        raw[(3, 3)] = -9999.;
        let stack = BandStack::single(raw, BandMetadata::with_nodata(Some(-9999.)));
        let small = stack.downsampled(2);
        assert_eq!((small.height(), small.width()), (2, 2));
        let band = small.band(0);
        assert_eq!(band.get(0, 0), 20.);
        assert_eq!(band.get(0, 1), 21.);
        assert_eq!(band.get(1, 1), -9999.);
    }

    #[test]
    fn strip_loading_matches_full_downsampling() -> Result<()> {
        let data = Array::from_shape_fn((2, 9, 7), |(b, r, c)| {
            if (r + c) % 5 == 0 {
                -9999.
            } else {
                (b * 100 + r * 7 + c) as f64
            }
        });
        let source = InMemoryRaster::new(data).with_nodata(Some(-9999.));
        let strips = BandStack::from_source_downsampled(&source, 3)?;
        let full = BandStack::from_source(&source)?.downsampled(3);
        assert_eq!((strips.height(), strips.width()), (3, 2));
        for band in 0..2 {
            assert_eq!(strips.raw_band(band), full.raw_band(band));
        }
        Ok(())
    }

    #[test]
    fn downsample_factor_budget() {
        assert_eq!(downsample_factor(1000, 1000, 1, 50_000_000), 1);
        assert_eq!(downsample_factor(10_000, 10_000, 1, 50_000_000), 2);
        assert_eq!(downsample_factor(10_000, 10_000, 11, 50_000_000), 5);
    }
}

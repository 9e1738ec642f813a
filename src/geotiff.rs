//! Reading GeoTIFF rasters into memory.
//!
//! Supports chunky (pixel-interleaved) images of any integer
//! or float sample type, the `GDAL_NODATA` tag, per-band
//! `SCALE` / `OFFSET` items in `GDAL_METADATA`, and the
//! north-up tiepoint + pixel scale georeferencing.

use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use lazy_static::lazy_static;
use ndarray::{Array2, Array3};
use regex::Regex;
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    tags::Tag,
    ColorType,
};

use crate::{
    error,
    raster::{GeoCoordinate, GeoTransform, InMemoryRaster, RasterSource, Window},
};

/// Not named by the `tiff` crate.
const GDAL_METADATA: Tag = Tag::Unknown(42112);

/// A GeoTIFF file, fully decoded.
#[derive(Debug)]
pub struct GeoTiff {
    path: PathBuf,
    raster: InMemoryRaster,
}

impl GeoTiff {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
        let raster = read_raster(BufReader::new(file))
            .with_context(|| format!("could not decode {}", path.display()))?;
        Ok(GeoTiff {
            path: path.to_owned(),
            raster,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raster(&self) -> &InMemoryRaster {
        &self.raster
    }
}

impl RasterSource for GeoTiff {
    fn band_count(&self) -> usize {
        self.raster.band_count()
    }

    fn width(&self) -> usize {
        self.raster.width()
    }

    fn height(&self) -> usize {
        self.raster.height()
    }

    fn read(&self, band_index: usize, window: Option<Window>) -> error::Result<Array2<f64>> {
        self.raster.read(band_index, window)
    }

    fn nodata(&self) -> Option<f64> {
        self.raster.nodata()
    }

    fn scale(&self, band_index: usize) -> f64 {
        self.raster.scale(band_index)
    }

    fn offset(&self, band_index: usize) -> f64 {
        self.raster.offset(band_index)
    }

    fn pixel_to_geographic(&self, row: usize, col: usize) -> GeoCoordinate {
        self.raster.pixel_to_geographic(row, col)
    }
}

/// Decode a GeoTIFF from any seekable reader.
pub fn read_raster<R: Read + Seek>(reader: R) -> Result<InMemoryRaster> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let bands = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) | ColorType::CMYK(_) => 4,
        ColorType::Multiband { num_samples, .. } => num_samples as usize,
        other => bail!("unsupported color type: {:?}", other),
    };

    let nodata = match decoder.get_tag_ascii_string(Tag::GdalNodata) {
        Ok(text) => parse_nodata(&text)?,
        Err(_) => None,
    };
    let calibration = match decoder.get_tag_ascii_string(GDAL_METADATA) {
        Ok(xml) => parse_calibration(&xml),
        Err(_) => vec![],
    };
    let transform = match (
        decoder.get_tag_f64_vec(Tag::ModelTiepointTag),
        decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag),
    ) {
        (Ok(tie), Ok(scale)) if tie.len() >= 6 && scale.len() >= 2 => {
            GeoTransform::from_tiepoint([tie[0], tie[1], tie[3], tie[4]], [scale[0], scale[1]])
        }
        _ => GeoTransform::default(),
    };

    let samples = samples_as_f64(decoder.read_image()?);
    ensure!(
        samples.len() == width * height * bands,
        "expected {} samples, found {}",
        width * height * bands,
        samples.len()
    );

    let data = Array3::from_shape_vec((height, width, bands), samples)?
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .to_owned();

    let mut raster = InMemoryRaster::new(data)
        .with_nodata(nodata)
        .with_transform(transform);
    for (band, item) in calibration {
        ensure!(band < bands, "metadata for band {} of {}", band, bands);
        let (scale, offset) = (raster.scale(band), raster.offset(band));
        raster = match item {
            Calibration::Scale(scale) => raster.with_calibration(band, scale, offset),
            Calibration::Offset(offset) => raster.with_calibration(band, scale, offset),
        };
    }
    Ok(raster)
}

fn samples_as_f64(result: DecodingResult) -> Vec<f64> {
    fn widen<T: Copy + Into<f64>>(v: Vec<T>) -> Vec<f64> {
        v.into_iter().map(Into::into).collect()
    }
    match result {
        DecodingResult::U8(v) => widen(v),
        DecodingResult::U16(v) => widen(v),
        DecodingResult::U32(v) => widen(v),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => widen(v),
        DecodingResult::I16(v) => widen(v),
        DecodingResult::I32(v) => widen(v),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F16(v) => widen(v),
        DecodingResult::F32(v) => widen(v),
        DecodingResult::F64(v) => v,
    }
}

fn parse_nodata(text: &str) -> Result<Option<f64>> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.is_empty() {
        return Ok(None);
    }
    let value = text
        .parse::<f64>()
        .with_context(|| format!("invalid GDAL_NODATA: {:?}", text))?;
    Ok(Some(value))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Calibration {
    Scale(f64),
    Offset(f64),
}

/// `(band, item)` pairs from the `SCALE` / `OFFSET` items of
/// a `GDAL_METADATA` document. Unparseable items are skipped.
fn parse_calibration(xml: &str) -> Vec<(usize, Calibration)> {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            r#"<Item\s+name="(SCALE|OFFSET)"\s+sample="(\d+)"[^>]*>\s*([^<]+?)\s*</Item>"#
        )
        .unwrap();
    }

    RE.captures_iter(xml)
        .filter_map(|caps| {
            let band = caps[2].parse().ok()?;
            let value = caps[3].parse().ok()?;
            let item = match &caps[1] {
                "SCALE" => Calibration::Scale(value),
                _ => Calibration::Offset(value),
            };
            Some((band, item))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::iproduct;
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    #[test]
    fn calibration_items() {
        let xml = r#"<GDALMetadata>
  <Item name="SCALE" sample="0" role="scale">0.01</Item>
  <Item name="OFFSET" sample="0" role="offset">-273.15</Item>
  <Item name="SCALE" sample="2" role="scale"> 0.1 </Item>
  <Item name="STATISTICS_MEAN" sample="0">12</Item>
  <Item name="OFFSET" sample="1" role="offset">bogus</Item>
</GDALMetadata>"#;
        assert_eq!(
            parse_calibration(xml),
            vec![
                (0, Calibration::Scale(0.01)),
                (0, Calibration::Offset(-273.15)),
                (2, Calibration::Scale(0.1)),
            ]
        );
    }

    #[test]
    fn nodata_text() {
        assert_eq!(parse_nodata("-9999\0").unwrap(), Some(-9999.));
        assert_eq!(parse_nodata(" ").unwrap(), None);
        assert!(parse_nodata("nan").unwrap().unwrap().is_nan());
        assert!(parse_nodata("none").is_err());
    }

    #[test]
    fn decode_float_geotiff() -> Result<()> {
        let (width, height) = (4u32, 3u32);
        let data: Vec<f32> = (0..width * height).map(|i| 20. + i as f32).collect();

        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf)?;
            let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;
            image.encoder().write_tag(Tag::GdalNodata, "-9999")?;
            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[0.5f64, 0.25, 0.][..])?;
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &[0f64, 0., 0., 100., 50., 0.][..])?;
            image.write_data(&data)?;
        }
        buf.set_position(0);

        let raster = read_raster(buf)?;
        assert_eq!(raster.band_count(), 1);
        assert_eq!((raster.width(), raster.height()), (4, 3));
        assert_eq!(raster.nodata(), Some(-9999.));
        let band = raster.read(0, None)?;
        assert_eq!(band[(0, 0)], 20.);
        assert_eq!(band[(2, 3)], 31.);

        let c = raster.pixel_to_geographic(1, 2);
        assert!((c.longitude - 101.25).abs() < 1e-9);
        assert!((c.latitude - 49.625).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn decode_interleaved_bands() -> Result<()> {
        let (width, height) = (3u32, 2u32);
        let data: Vec<f32> = iproduct!(0..height, 0..width, 0..3u32)
            .map(|(r, c, b)| (b * 100 + r * 10 + c) as f32)
            .collect();

        let mut buf = Cursor::new(Vec::new());
        TiffEncoder::new(&mut buf)?.write_image::<colortype::RGB32Float>(width, height, &data)?;
        buf.set_position(0);

        let raster = read_raster(buf)?;
        assert_eq!(raster.band_count(), 3);
        assert_eq!((raster.width(), raster.height()), (3, 2));
        for band in 0..3 {
            let values = raster.read(band, None)?;
            assert_eq!(values.dim(), (2, 3));
            assert_eq!(values[(0, 0)], (band * 100) as f64);
            assert_eq!(values[(1, 2)], (band * 100 + 12) as f64);
        }
        Ok(())
    }

    #[test]
    fn missing_file() {
        let err = GeoTiff::open("/nonexistent/scene.tif").unwrap_err();
        assert!(err.to_string().contains("could not open"));
    }
}

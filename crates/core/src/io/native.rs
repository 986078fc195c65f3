//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Bands are read either from successive IFDs or from
//! pixel-interleaved samples of a single IFD; stacks are written as one
//! `Gray64Float` IFD per band carrying the georeferencing tags, the band
//! description (`ImageDescription`) and `GDAL_NODATA`.
//!
//! The page-per-band layout is a multi-page TIFF, not a multi-band one:
//! GDAL opens page 1 as the dataset and the remaining pages as
//! `GTIFF_DIR:<n>:<path>` subdatasets, and does not read `ImageDescription`
//! as a band description. Files written here round-trip through
//! [`read_geotiff_stack`]. External tools must address each statistic page
//! by its directory index. `tiff` fixes the samples per pixel per color type,
//! which rules out an interleaved layout with a runtime band count.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, RasterStack};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// One decoded band before it is placed in a raster
struct DecodedBand {
    values: Vec<f64>,
    nodata: Option<f64>,
    description: Option<String>,
}

/// All full-resolution bands of a TIFF file
struct DecodedTiff {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    bands: Vec<DecodedBand>,
}

/// Read one band (1-based, default 1) of a GeoTIFF into a `Raster`
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let decoded = decode_tiff(BufReader::new(file))?;
    single_band(decoded, band.unwrap_or(1))
}

/// Read every band of a GeoTIFF into a `RasterStack`
pub fn read_geotiff_stack<P: AsRef<Path>>(path: P) -> Result<RasterStack> {
    let file = File::open(path.as_ref())?;
    into_stack(decode_tiff(BufReader::new(file))?)
}

/// Read a GeoTIFF stack from an in-memory buffer
pub fn read_geotiff_stack_from_buffer(data: &[u8]) -> Result<RasterStack> {
    into_stack(decode_tiff(Cursor::new(data))?)
}

/// Write a `RasterStack` as a multi-page GeoTIFF
pub fn write_geotiff_stack<P: AsRef<Path>>(stack: &RasterStack, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_stack(stack, BufWriter::new(file))
}

/// Write a `RasterStack` to an in-memory GeoTIFF buffer
pub fn write_geotiff_stack_to_buffer(stack: &RasterStack) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_stack(stack, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn single_band<T: RasterElement>(decoded: DecodedTiff, band: usize) -> Result<Raster<T>> {
    let count = decoded.bands.len();
    let Some(src) = band.checked_sub(1).and_then(|b| decoded.bands.into_iter().nth(b)) else {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("file has {} bands (1-based)", count),
        });
    };

    let data: Vec<T> = src
        .values
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::fallback()))
        .collect();
    let mut raster = Raster::from_vec(data, decoded.rows, decoded.cols)?;
    raster.set_transform(decoded.transform);
    raster.set_nodata(src.nodata);
    Ok(raster)
}

fn into_stack(decoded: DecodedTiff) -> Result<RasterStack> {
    let DecodedTiff {
        rows,
        cols,
        transform,
        bands,
    } = decoded;

    let values: Vec<f64> = bands.iter().flat_map(|b| b.values.iter().copied()).collect();
    let data = Array3::from_shape_vec((bands.len(), rows, cols), values)
        .map_err(|e| Error::Other(e.to_string()))?;

    let mut stack = RasterStack::from_array(data).with_transform(transform);
    for (b, band) in bands.into_iter().enumerate() {
        stack.set_nodata(b, band.nodata)?;
        if let Some(desc) = band.description {
            stack.set_description(b, desc)?;
        }
    }
    Ok(stack)
}

/// Decode every full-resolution image of a TIFF.
///
/// Pages whose dimensions differ from the first (overviews, masks) are
/// skipped.
fn decode_tiff<R>(reader: R) -> Result<DecodedTiff>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);
    let transform = read_geotransform(&mut decoder).unwrap_or_default();
    let cells = rows * cols;

    let mut bands = Vec::new();
    loop {
        if decoder.dimensions()? == (width, height) {
            let nodata = read_nodata(&mut decoder);
            let description = decoder
                .get_tag_ascii_string(Tag::ImageDescription)
                .ok()
                .map(|s| s.trim_end_matches('\0').to_string())
                .filter(|s| !s.is_empty());

            let samples = decoded_to_f64(decoder.read_image()?)?;
            if cells == 0 || samples.len() % cells != 0 {
                return Err(Error::InvalidDimensions {
                    width: cols,
                    height: rows,
                });
            }

            let per_pixel = samples.len() / cells;
            if per_pixel == 1 {
                bands.push(DecodedBand {
                    values: samples,
                    nodata,
                    description,
                });
            } else {
                for s in 0..per_pixel {
                    bands.push(DecodedBand {
                        values: samples.iter().skip(s).step_by(per_pixel).copied().collect(),
                        nodata,
                        description: None,
                    });
                }
            }
        } else {
            tracing::debug!("skipping reduced-resolution TIFF page");
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    Ok(DecodedTiff {
        rows,
        cols,
        transform,
        bands,
    })
}

fn decoded_to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    let values = match result {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };
    Ok(values)
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(geo_tag(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse().ok())
}

/// Read the GeoTransform from ModelPixelScale + ModelTiepoint
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE))?;
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Tiff("Cannot determine geotransform".into()))
}

fn encode_stack<W>(stack: &RasterStack, writer: W) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (bands, rows, cols) = stack.shape();
    let gt = stack.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    // Version 1.1.0 with two keys: GTModelTypeGeoKey = Projected,
    // GTRasterTypeGeoKey = RasterPixelIsArea
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];

    for b in 0..bands {
        let nodata = stack.nodata(b);
        let data: Vec<f64> = stack
            .band(b)?
            .iter()
            .map(|&v| match nodata {
                Some(nd) if v.is_nan() => nd,
                _ => v,
            })
            .collect();

        let mut image = encoder.new_image::<Gray64Float>(cols as u32, rows as u32)?;
        image
            .encoder()
            .write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])?;
        image
            .encoder()
            .write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])?;
        image
            .encoder()
            .write_tag(geo_tag(GEO_KEY_DIRECTORY), &geokeys[..])?;
        if let Some(desc) = stack.description(b) {
            image.encoder().write_tag(Tag::ImageDescription, desc)?;
        }
        if let Some(nd) = nodata {
            image
                .encoder()
                .write_tag(geo_tag(GDAL_NODATA), nd.to_string().as_str())?;
        }
        image.write_data(&data)?;
    }

    Ok(())
}

//! TIFF volume reading/writing
//!
//! Uses the `tiff` crate. A single-page TIFF is a 2-D volume `[rows, cols]`;
//! a multi-page TIFF is a 3-D volume `[pages, rows, cols]`. Voxel spacing and
//! origin travel in the model pixel-scale and tie-point tags.

use crate::error::{Error, Result};
use crate::volume::{Volume, VolumeElement, VoxelTransform};
use ndarray::{ArrayD, ArrayViewD, Axis};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::Gray32Float;
use tiff::tags::Tag;
use tracing::warn;

// The decoder keys entries by named tag, so `Tag::Unknown(33550)` never
// matches on read.
const PIXEL_SCALE_TAG: Tag = Tag::ModelPixelScaleTag;
const TIEPOINT_TAG: Tag = Tag::ModelTiepointTag;

/// Read a TIFF file into a Volume
pub fn read_volume<T, P>(path: P) -> Result<Volume<T>>
where
    T: VolumeElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_volume(file)
}

/// Read a TIFF from an in-memory buffer into a Volume
pub fn read_volume_from_buffer<T>(data: &[u8]) -> Result<Volume<T>>
where
    T: VolumeElement,
{
    decode_volume(Cursor::new(data))
}

/// Load a volume as `f64` with NaN voxels normalized to zero
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Volume<f64>> {
    let mut volume: Volume<f64> = read_volume(path)?;
    volume.nan_to_zero();
    Ok(volume)
}

/// Load several volumes and stack them along a new leading axis
///
/// Every volume must have the same shape. The result has shape
/// `[paths.len(), ...volume_shape]`.
pub fn load_volumes<P: AsRef<Path>>(paths: &[P]) -> Result<ArrayD<f64>> {
    if paths.is_empty() {
        return Err(Error::EmptyInput { field: "paths" });
    }

    let volumes = paths
        .iter()
        .map(|p| load_volume(p))
        .collect::<Result<Vec<_>>>()?;

    let shape = volumes[0].shape().to_vec();
    if let Some(bad) = volumes.iter().find(|v| v.shape() != shape.as_slice()) {
        return Err(Error::ShapeMismatch {
            expected: shape,
            actual: bad.shape().to_vec(),
        });
    }

    let views: Vec<ArrayViewD<'_, f64>> = volumes.iter().map(|v| v.view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| Error::Other(e.to_string()))
}

/// Internal: decode every page of a TIFF from any `Read + Seek` source
fn decode_volume<T, R>(reader: R) -> Result<Volume<T>>
where
    T: VolumeElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    // Spacing tags are read from the first page only
    let tags = match read_axis_tags(&mut decoder) {
        Ok(tags) => tags,
        Err(e) => {
            warn!("Ignoring voxel spacing tags: {}", e);
            None
        }
    };

    let mut data: Vec<T> = Vec::with_capacity(rows * cols);
    let mut pages = 0;
    loop {
        let (w, h) = decoder
            .dimensions()
            .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
        if (h as usize, w as usize) != (rows, cols) {
            return Err(Error::ShapeMismatch {
                expected: vec![rows, cols],
                actual: vec![h as usize, w as usize],
            });
        }

        let page = decoder
            .read_image()
            .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;
        let before = data.len();
        extend_from_page(&mut data, page)?;
        if data.len() - before != rows * cols {
            return Err(Error::ShapeMismatch {
                expected: vec![rows, cols],
                actual: vec![data.len() - before],
            });
        }
        pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| Error::Other(format!("Cannot advance to next page: {}", e)))?;
    }

    let shape: Vec<usize> = if pages == 1 {
        vec![rows, cols]
    } else {
        vec![pages, rows, cols]
    };

    let mut volume = Volume::from_vec(&shape, data)?;
    if let Some((scale, origin)) = tags {
        volume.set_transform(from_tiff_axes(scale, origin, shape.len()));
    }
    Ok(volume)
}

fn extend_from_page<T: VolumeElement>(data: &mut Vec<T>, page: DecodingResult) -> Result<()> {
    fn cast<S: num_traits::ToPrimitive + Copy, T: VolumeElement>(buf: &[S], out: &mut Vec<T>) {
        out.extend(buf.iter().map(|&v| T::from_f64(v.to_f64().unwrap_or(f64::NAN))));
    }

    match page {
        DecodingResult::F32(buf) => cast(&buf, data),
        DecodingResult::F64(buf) => cast(&buf, data),
        DecodingResult::U8(buf) => cast(&buf, data),
        DecodingResult::U16(buf) => cast(&buf, data),
        DecodingResult::U32(buf) => cast(&buf, data),
        DecodingResult::I8(buf) => cast(&buf, data),
        DecodingResult::I16(buf) => cast(&buf, data),
        DecodingResult::I32(buf) => cast(&buf, data),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF sample format".to_string(),
            ));
        }
    }
    Ok(())
}

/// Read (scale, origin) in TIFF axis order x, y, z
///
/// `None` when the file carries neither tag; an error when the tags are
/// present but unreadable or incomplete.
fn read_axis_tags<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<([f64; 3], [f64; 3])>> {
    let tag_err = |e: tiff::TiffError| Error::Other(format!("Cannot read spacing tags: {}", e));
    let scale = decoder.find_tag(PIXEL_SCALE_TAG).map_err(tag_err)?;
    let tiepoint = decoder.find_tag(TIEPOINT_TAG).map_err(tag_err)?;

    let (scale, tiepoint) = match (scale, tiepoint) {
        (None, None) => return Ok(None),
        (Some(scale), Some(tiepoint)) => (
            scale.into_f64_vec().map_err(tag_err)?,
            tiepoint.into_f64_vec().map_err(tag_err)?,
        ),
        _ => {
            return Err(Error::Other(
                "pixel scale and tiepoint tags must appear together".into(),
            ));
        }
    };

    if scale.len() < 3 || tiepoint.len() < 6 {
        return Err(Error::Other(format!(
            "Cannot determine voxel spacing from {} scale and {} tiepoint values",
            scale.len(),
            tiepoint.len()
        )));
    }

    // tiepoint: [I, J, K, X, Y, Z]
    Ok(Some((
        [scale[0], scale[1], scale[2]],
        [
            tiepoint[3] - tiepoint[0] * scale[0],
            tiepoint[4] - tiepoint[1] * scale[1],
            tiepoint[5] - tiepoint[2] * scale[2],
        ],
    )))
}

/// Array axes run slowest-first (`[z, y, x]`), TIFF tags run `x, y, z`.
fn to_tiff_axes(t: &VoxelTransform, ndim: usize) -> ([f64; 3], [f64; 3]) {
    match ndim {
        3 => (
            [t.spacing[2], t.spacing[1], t.spacing[0]],
            [t.origin[2], t.origin[1], t.origin[0]],
        ),
        _ => (
            [t.spacing[1], t.spacing[0], t.spacing[2]],
            [t.origin[1], t.origin[0], t.origin[2]],
        ),
    }
}

fn from_tiff_axes(scale: [f64; 3], origin: [f64; 3], ndim: usize) -> VoxelTransform {
    match ndim {
        3 => VoxelTransform::new(
            [origin[2], origin[1], origin[0]],
            [scale[2], scale[1], scale[0]],
        ),
        _ => VoxelTransform::new(
            [origin[1], origin[0], origin[2]],
            [scale[1], scale[0], scale[2]],
        ),
    }
}

/// Write a Volume to a TIFF file
///
/// 2-D volumes become a single page, 3-D volumes one page per leading index.
/// Samples are written as 32-bit float.
pub fn write_volume<T, P>(volume: &Volume<T>, path: P) -> Result<()>
where
    T: VolumeElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_volume(volume, file)
}

/// Write a Volume to an in-memory TIFF buffer
pub fn write_volume_to_buffer<T>(volume: &Volume<T>) -> Result<Vec<u8>>
where
    T: VolumeElement,
{
    let mut buf = Vec::new();
    encode_volume(volume, Cursor::new(&mut buf))?;
    Ok(buf)
}

/// Internal: encode a Volume as TIFF pages into any `Write + Seek` sink
fn encode_volume<T, W>(volume: &Volume<T>, writer: W) -> Result<()>
where
    T: VolumeElement,
    W: std::io::Write + std::io::Seek,
{
    let ndim = volume.ndim();
    let pages: Vec<ArrayViewD<'_, T>> = match ndim {
        2 => vec![volume.view()],
        3 => volume.data().axis_iter(Axis(0)).collect(),
        n => return Err(Error::UnsupportedDimensions(n)),
    };

    let shape = volume.shape();
    let rows = shape[ndim - 2];
    let cols = shape[ndim - 1];
    let (scale, origin) = to_tiff_axes(volume.transform(), ndim);
    let scale = vec![scale[0], scale[1], scale[2]];
    let tiepoint = vec![0.0, 0.0, 0.0, origin[0], origin[1], origin[2]];

    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    for page in pages {
        let data: Vec<f32> = page
            .iter()
            .map(|&v| v.to_f64().map_or(f32::NAN, |f| f as f32))
            .collect();

        let mut image = encoder
            .new_image::<Gray32Float>(cols as u32, rows as u32)
            .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

        image
            .encoder()
            .write_tag(PIXEL_SCALE_TAG, scale.as_slice())
            .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;
        image
            .encoder()
            .write_tag(TIEPOINT_TAG, tiepoint.as_slice())
            .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

        image
            .write_data(&data)
            .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    }

    Ok(())
}

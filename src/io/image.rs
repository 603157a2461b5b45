//! Conversion between image files and normalised float buffers

use crate::io::error::{
    Result, ShatterError, computation_error, file_system_error, invalid_parameter,
};
use crate::math::{Image, shape};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};
use ndarray::{Array3, Axis, s};
use std::path::Path;

/// Load an image as floats in [0, 1], RGBA when the file has alpha and RGB otherwise
///
/// # Errors
///
/// Returns `ImageLoad` if the file cannot be opened or decoded
pub fn load_image(path: impl AsRef<Path>) -> Result<Image> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(|source| ShatterError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    from_dynamic(&decoded)
}

/// Convert a decoded image into a float buffer
///
/// # Errors
///
/// Returns an error if the pixel buffer does not match the reported size
pub fn from_dynamic(decoded: &DynamicImage) -> Result<Image> {
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let (channels, raw) = if decoded.color().has_alpha() {
        (4, decoded.to_rgba32f().into_raw())
    } else {
        (3, decoded.to_rgb32f().into_raw())
    };
    Array3::from_shape_vec((height, width, channels), raw)
        .map_err(|e| computation_error("from_dynamic", &e))
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Write a float buffer as an 8-bit image, creating parent directories
///
/// One channel is saved as greyscale, three as RGB and four as RGBA. Values
/// outside [0, 1] are clamped.
///
/// # Errors
///
/// Returns an error if:
/// - The image has a channel count other than 1, 3 or 4
/// - The parent directory cannot be created
/// - The image cannot be encoded or written
pub fn save_image(image: &Image, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let (rows, cols, channels) = shape(image);
    let (width, height) = (cols as u32, rows as u32);
    let bytes: Vec<u8> = image.iter().map(|&v| to_byte(v)).collect();
    let malformed = || computation_error("save_image", &"pixel buffer does not match image size");

    let dynamic = match channels {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, bytes).ok_or_else(malformed)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, bytes).ok_or_else(malformed)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, bytes).ok_or_else(malformed)?),
        other => {
            return Err(invalid_parameter(
                "channels",
                &other,
                &"images are saved with 1, 3 or 4 channels",
            ));
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| file_system_error(parent, "create directory", e))?;
    }

    dynamic
        .save(path)
        .map_err(|source| ShatterError::ImageExport {
            path: path.to_path_buf(),
            source,
        })
}

/// Resample every channel to `rows × cols` with bilinear filtering
///
/// # Errors
///
/// Returns `InvalidDimensions` if either target dimension is zero
pub fn resize_image(image: &Image, rows: usize, cols: usize) -> Result<Image> {
    if rows == 0 || cols == 0 {
        return Err(ShatterError::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    let (source_rows, source_cols, channels) = shape(image);
    if (source_rows, source_cols) == (rows, cols) {
        return Ok(image.clone());
    }

    let mut resized = Image::zeros((rows, cols, channels));
    for (channel, plane) in image.axis_iter(Axis(2)).enumerate() {
        let buffer: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(
            source_cols as u32,
            source_rows as u32,
            plane.iter().copied().collect(),
        )
        .ok_or_else(|| computation_error("resize_image", &"plane does not match image size"))?;
        let scaled = imageops::resize(&buffer, cols as u32, rows as u32, FilterType::Triangle);
        let scaled = Array3::from_shape_vec((rows, cols, 1), scaled.into_raw())
            .map_err(|e| computation_error("resize_image", &e))?;
        resized
            .slice_mut(s![.., .., channel..=channel])
            .assign(&scaled);
    }
    Ok(resized)
}

//! Canvas initialisation and validation

use crate::io::error::{Result, ShatterError, invalid_parameter};
use crate::math::blend::ensure_same_shape;
use crate::math::tone::clamp_unit;
use crate::math::{Image, shape};
use ndarray::{Axis, Zip, s};

/// `count` fully transparent canvases (all ones) shaped like `target`
pub fn blank_canvases(target: &Image, count: usize) -> Vec<Image> {
    (0..count).map(|_| Image::ones(target.raw_dim())).collect()
}

/// Drop the alpha channel of a painted canvas, filling unpainted pixels with `fill`
///
/// Pixels whose alpha is positive keep their colour. A canvas without an alpha
/// channel (`color_channels` channels already) is returned unchanged.
///
/// # Errors
///
/// Returns `InvalidParameter` if the canvas has neither `color_channels` nor
/// `color_channels + 1` channels
pub fn flatten_canvas(canvas: &Image, color_channels: usize, fill: f32) -> Result<Image> {
    let (rows, cols, channels) = shape(canvas);
    if channels == color_channels {
        return Ok(canvas.clone());
    }
    if channels != color_channels + 1 {
        return Err(invalid_parameter(
            "canvas channels",
            &channels,
            &format!("expected {color_channels} or {}", color_channels + 1),
        ));
    }

    let mut flat = Image::from_elem((rows, cols, color_channels), fill);
    Zip::from(flat.lanes_mut(Axis(2)))
        .and(canvas.lanes(Axis(2)))
        .for_each(|mut dst, src| {
            if src.get(color_channels).is_some_and(|&alpha| alpha > 0.0) {
                dst.assign(&src.slice(s![..color_channels]));
            }
        });
    Ok(flat)
}

/// Flatten and clamp externally supplied canvases so they can seed a run against `target`
///
/// # Errors
///
/// Returns an error if a canvas cannot be flattened or differs from `target` in size
pub fn prepare_canvases(target: &Image, canvases: &[Image], fill: f32) -> Result<Vec<Image>> {
    let (_, _, channels) = shape(target);
    canvases
        .iter()
        .map(|canvas| {
            let mut flat = flatten_canvas(canvas, channels, fill)?;
            ensure_same_shape("prepare_canvases", target, &flat)?;
            clamp_unit(&mut flat);
            Ok(flat)
        })
        .collect()
}

/// Fail unless there is at least one canvas and every canvas matches `target`
///
/// # Errors
///
/// Returns `InvalidParameter` for an empty slice or `ShapeMismatch` for a
/// canvas of the wrong shape
pub fn validate_canvases(target: &Image, canvases: &[Image]) -> Result<()> {
    if canvases.is_empty() {
        return Err(invalid_parameter("canvases", &0, &"need at least one canvas"));
    }
    if target.is_empty() {
        let (rows, cols, _) = shape(target);
        return Err(ShatterError::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    canvases
        .iter()
        .try_for_each(|canvas| ensure_same_shape("validate_canvases", target, canvas))
}

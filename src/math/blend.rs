//! Light-transmission combination of stacked canvases
//!
//! Each canvas acts as a coloured filter, so the light passing through a stack
//! is the elementwise product of every layer. Cyan `(0, 1, 1)` over magenta
//! `(1, 0, 1)` transmits only blue `(0, 0, 1)`.

use crate::io::error::{Result, ShatterError, invalid_parameter};
use crate::math::{Image, shape};
use num_traits::Float;

/// Fail unless `actual` has the same (rows, cols, channels) as `expected`
///
/// # Errors
///
/// Returns `ShapeMismatch` naming `operation` when the shapes differ
pub fn ensure_same_shape(operation: &'static str, expected: &Image, actual: &Image) -> Result<()> {
    if expected.dim() == actual.dim() {
        Ok(())
    } else {
        Err(ShatterError::ShapeMismatch {
            operation,
            expected: shape(expected),
            actual: shape(actual),
        })
    }
}

/// Multiply all images together elementwise
///
/// # Errors
///
/// Returns an error if:
/// - `images` is empty
/// - Any image differs in shape from the first
pub fn combine_images(images: &[Image]) -> Result<Image> {
    let (first, rest) = images
        .split_first()
        .ok_or_else(|| invalid_parameter("images", &0, &"no images to combine"))?;

    let mut combined = first.clone();
    for image in rest {
        ensure_same_shape("combine_images", &combined, image)?;
        combined.zip_mut_with(image, |acc, &layer| *acc *= layer);
    }
    Ok(combined)
}

/// Signed residual `target - combined`
///
/// # Errors
///
/// Returns `ShapeMismatch` if the two images differ in shape
pub fn residual(target: &Image, combined: &Image) -> Result<Image> {
    ensure_same_shape("residual", target, combined)?;
    Ok(target - combined)
}

/// Split a residual into its positive part (too dark) and negative part (too bright)
pub fn split_residual(diff: &Image) -> (Image, Image) {
    (diff.mapv(|v| v.max(0.0)), diff.mapv(|v| v.min(0.0)))
}

/// Linear mix of `from` towards `to` by `ratio`
pub fn lerp<T: Float>(from: T, to: T, ratio: T) -> T {
    from * (T::one() - ratio) + to * ratio
}

/// Mean absolute value over every element, zero for empty images
pub fn mean_abs(image: &Image) -> f32 {
    if image.is_empty() {
        return 0.0;
    }
    let total: f64 = image.iter().map(|v| f64::from(v.abs())).sum();
    (total / image.len() as f64) as f32
}

/// Largest absolute value over every element, zero for empty images
pub fn max_abs(image: &Image) -> f32 {
    image.iter().fold(0.0_f32, |acc, v| acc.max(v.abs()))
}

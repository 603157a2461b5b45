/// Multiplicative combination, residuals and linear blending
pub mod blend;
/// Separable Gaussian low-pass filtering
pub mod filter;
/// Clamping and brightness rescaling
pub mod tone;

use ndarray::Array3;

/// Normalised float image indexed by (row, col, channel), values nominally in [0, 1]
pub type Image = Array3<f32>;

/// Shape of an image as (rows, cols, channels)
pub fn shape(image: &Image) -> (usize, usize, usize) {
    image.dim()
}

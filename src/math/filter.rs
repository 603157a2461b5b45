//! Separable Gaussian low-pass filter with mirrored borders

use crate::io::error::{Result, computation_error, invalid_parameter};
use crate::math::Image;
use ndarray::Array3;
use rayon::prelude::*;

/// Normalised 1D Gaussian kernel of odd length `max(3, 2·ceil(2σ) + 1)`
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let half = (2.0 * f64::from(sigma)).ceil().max(0.0) as usize;
    let size = (2 * half + 1).max(3);
    let radius = (size / 2) as f64;
    let denominator = 2.0 * f64::from(sigma) * f64::from(sigma);

    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let offset = i as f64 - radius;
            (-(offset * offset) / denominator).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / total) as f32).collect()
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge
pub fn reflect_101(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * len as isize - 2;
    let folded = index.rem_euclid(period);
    if folded >= len as isize {
        (period - folded) as usize
    } else {
        folded as usize
    }
}

/// Gaussian blur with standard deviation `sigma`; `sigma == 0` returns a copy
///
/// # Errors
///
/// Returns an error if:
/// - `sigma` is negative or not finite
/// - The blurred buffer cannot be reshaped into the source shape
pub fn low_pass_filter(image: &Image, sigma: f32) -> Result<Image> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(invalid_parameter(
            "sigma",
            &sigma,
            &"must be a finite, non-negative number",
        ));
    }
    if sigma == 0.0 || image.is_empty() {
        return Ok(image.clone());
    }

    let (rows, cols, channels) = image.dim();
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let row_stride = cols * channels;
    let input: Vec<f32> = image.iter().copied().collect();

    let mut horizontal = vec![0.0_f32; input.len()];
    horizontal
        .par_chunks_mut(row_stride)
        .enumerate()
        .for_each(|(row, out_row)| {
            let start = row * row_stride;
            let in_row = input.get(start..start + row_stride).unwrap_or(&[]);
            for col in 0..cols {
                for ch in 0..channels {
                    let acc: f32 = kernel
                        .iter()
                        .enumerate()
                        .map(|(k, &weight)| {
                            let src = reflect_101(col as isize + k as isize - radius, cols);
                            weight * in_row.get(src * channels + ch).copied().unwrap_or(0.0)
                        })
                        .sum();
                    if let Some(slot) = out_row.get_mut(col * channels + ch) {
                        *slot = acc;
                    }
                }
            }
        });

    let mut vertical = vec![0.0_f32; input.len()];
    vertical
        .par_chunks_mut(row_stride)
        .enumerate()
        .for_each(|(row, out_row)| {
            for (offset, slot) in out_row.iter_mut().enumerate() {
                *slot = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, &weight)| {
                        let src = reflect_101(row as isize + k as isize - radius, rows);
                        weight
                            * horizontal
                                .get(src * row_stride + offset)
                                .copied()
                                .unwrap_or(0.0)
                    })
                    .sum();
            }
        });

    Array3::from_shape_vec((rows, cols, channels), vertical)
        .map_err(|e| computation_error("low_pass_filter", &e))
}

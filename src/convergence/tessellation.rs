//! Rotated copies of a blob's pixels about its own centroid

use crate::convergence::blob::Blob;
use crate::math::blend::lerp;
use crate::math::tone::clamp_unit;
use crate::math::{Image, shape};
use ndarray::s;

/// One rotated copy of a blob
#[derive(Debug, Clone, PartialEq)]
pub struct Tessellation {
    /// Rotation about the blob centroid, counter-clockwise in degrees
    pub angle_degrees: f64,
    /// Destination pixels as (row, col)
    pub pixels: Vec<(usize, usize)>,
    /// Colour of each destination pixel, `channels` values per pixel
    pub colors: Vec<f32>,
    /// Channels per pixel in `colors`
    pub channels: usize,
}

impl Tessellation {
    /// Destination pixels paired with their colour
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &[f32])> + '_ {
        self.pixels
            .iter()
            .copied()
            .zip(self.colors.chunks_exact(self.channels.max(1)))
    }

    /// Blend this copy into `canvas`, moving each covered pixel `ratio` of the way to its colour
    pub fn blend_into(&self, canvas: &mut Image, ratio: f32) {
        let (rows, cols, _) = shape(canvas);
        for ((row, col), color) in self.iter() {
            if row >= rows || col >= cols {
                continue;
            }
            let mut lane = canvas.slice_mut(s![row, col, ..]);
            for (value, &source) in lane.iter_mut().zip(color) {
                *value = lerp(*value, source, ratio);
            }
        }
        clamp_unit(canvas);
    }
}

/// `count` copies of `blob` taken from `image`, rotated by `j · 360 / count` degrees
///
/// Copy `j = 0` is the blob itself. Rotation uses nearest-neighbour sampling
/// and drops destination pixels that fall outside the image.
pub fn tessellate_blob(blob: &Blob, image: &Image, count: usize) -> Vec<Tessellation> {
    let (rows, cols, channels) = shape(image);
    let (cx, cy) = blob.centroid();
    let bbox = blob.bbox();

    // Distance from centroid to the farthest bbox corner bounds every rotated pixel
    let reach = [
        (bbox.min_col as f64, bbox.min_row as f64),
        (bbox.max_col as f64, bbox.min_row as f64),
        (bbox.min_col as f64, bbox.max_row as f64),
        (bbox.max_col as f64, bbox.max_row as f64),
    ]
    .iter()
    .map(|&(x, y)| (x - cx).hypot(y - cy))
    .fold(0.0_f64, f64::max)
        + 1.0;
    let span = |centre: f64, limit: usize| {
        (centre - reach).floor().max(0.0) as usize..((centre + reach).ceil() as usize + 1).min(limit)
    };
    let row_range = span(cy, rows);
    let col_range = span(cx, cols);

    (0..count)
        .map(|j| {
            let angle_degrees = j as f64 * 360.0 / count as f64;
            let (sin, cos) = angle_degrees.to_radians().sin_cos();
            let mut pixels = Vec::new();
            let mut colors = Vec::new();

            for row in row_range.clone() {
                for col in col_range.clone() {
                    let (dx, dy) = (col as f64 - cx, row as f64 - cy);
                    let source_col = (cx + dx * cos + dy * sin).round();
                    let source_row = (cy - dx * sin + dy * cos).round();
                    if source_col < 0.0 || source_row < 0.0 {
                        continue;
                    }
                    let (source_row, source_col) = (source_row as usize, source_col as usize);
                    if source_row >= rows
                        || source_col >= cols
                        || !blob.contains(source_row, source_col)
                    {
                        continue;
                    }
                    pixels.push((row, col));
                    colors.extend(image.slice(s![source_row, source_col, ..]).iter().copied());
                }
            }

            Tessellation {
                angle_degrees,
                pixels,
                colors,
                channels,
            }
        })
        .collect()
}

//! Extraction of cropped, alpha-masked pieces from an image

use crate::io::error::{Result, ShatterError};
use crate::math::{Image, shape};
use crate::spatial::pattern::{BoundingBox, ShatterPattern};
use ndarray::{Array3, Zip, s};

/// One region of an image, cropped to its bounding box
///
/// The last channel of `data` is an alpha mask: 1.0 where the pixel belongs to
/// the piece, 0.0 elsewhere in the box. A piece need not be contiguous, so the
/// mask rather than the box decides membership.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    data: Array3<f32>,
    bbox: BoundingBox,
    piece_id: u32,
}

impl Piece {
    /// Assemble a piece from colour-plus-alpha data
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `data` is not `bbox.height() × bbox.width()`
    /// or carries no colour channel in front of the alpha channel
    pub fn new(data: Array3<f32>, bbox: BoundingBox, piece_id: u32) -> Result<Self> {
        let (rows, cols, channels) = data.dim();
        if rows != bbox.height() || cols != bbox.width() || channels < 2 {
            return Err(ShatterError::ShapeMismatch {
                operation: "Piece::new",
                expected: (bbox.height(), bbox.width(), channels.max(2)),
                actual: (rows, cols, channels),
            });
        }
        Ok(Self {
            data,
            bbox,
            piece_id,
        })
    }

    /// Colour channels followed by the alpha mask
    pub const fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Region of the source image the piece was cut from
    pub const fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Region id in the originating pattern
    pub const fn piece_id(&self) -> u32 {
        self.piece_id
    }

    /// Number of colour channels, excluding alpha
    pub fn color_channels(&self) -> usize {
        self.data.dim().2 - 1
    }

    /// Check if the piece owns the given image pixel
    pub fn covers(&self, row: usize, col: usize) -> bool {
        self.bbox.contains(row, col)
            && self
                .data
                .get((
                    row - self.bbox.min_row,
                    col - self.bbox.min_col,
                    self.color_channels(),
                ))
                .is_some_and(|&alpha| alpha > 0.0)
    }

    /// Number of pixels the piece owns
    pub fn pixel_count(&self) -> usize {
        let alpha = self.color_channels();
        self.data
            .slice(s![.., .., alpha])
            .iter()
            .filter(|&&a| a > 0.0)
            .count()
    }
}

/// Cut `target` into one piece per region of `pattern`, in ascending id order
///
/// Regions that own no pixels are skipped, as is `background_id` when given.
///
/// # Errors
///
/// Returns `PatternDimensionMismatch` if the pattern was built for a different size
pub fn apply_shatter_pattern(
    target: &Image,
    pattern: &ShatterPattern,
    background_id: Option<u32>,
) -> Result<Vec<Piece>> {
    let (rows, cols, channels) = shape(target);
    pattern.ensure_matches(cols, rows)?;

    let region_map = pattern.region_map();
    let mut pieces = Vec::new();

    for (id, bbox) in pattern.bounding_boxes().into_iter().enumerate() {
        let id = id as u32;
        let Some(bbox) = bbox else {
            continue;
        };
        if background_id == Some(id) {
            continue;
        }

        let rows_range = bbox.min_row..bbox.max_row;
        let cols_range = bbox.min_col..bbox.max_col;
        let mut data = Array3::zeros((bbox.height(), bbox.width(), channels + 1));

        data.slice_mut(s![.., .., ..channels])
            .assign(&target.slice(s![rows_range.clone(), cols_range.clone(), ..]));
        Zip::from(data.slice_mut(s![.., .., channels]))
            .and(region_map.slice(s![rows_range, cols_range]))
            .for_each(|alpha, &region| *alpha = if region == id { 1.0 } else { 0.0 });

        pieces.push(Piece::new(data, bbox, id)?);
    }

    Ok(pieces)
}

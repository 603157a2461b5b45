//! Immutable shatter pattern: a piece id for every pixel of a fixed-size image

use crate::io::error::{Result, ShatterError, invalid_parameter};
use ndarray::Array2;

/// Axis-aligned pixel rectangle, half-open on the max side
///
/// `min_row..max_row` and `min_col..max_col` are the covered ranges, so an
/// empty box cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// First covered row
    pub min_row: usize,
    /// First covered column
    pub min_col: usize,
    /// One past the last covered row
    pub max_row: usize,
    /// One past the last covered column
    pub max_col: usize,
}

impl BoundingBox {
    /// Box covering exactly one pixel
    pub const fn from_pixel(row: usize, col: usize) -> Self {
        Self {
            min_row: row,
            min_col: col,
            max_row: row + 1,
            max_col: col + 1,
        }
    }

    /// Grow the box so it also covers (`row`, `col`)
    pub fn include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row + 1);
        self.max_col = self.max_col.max(col + 1);
    }

    /// Number of covered rows
    pub const fn height(&self) -> usize {
        self.max_row - self.min_row
    }

    /// Number of covered columns
    pub const fn width(&self) -> usize {
        self.max_col - self.min_col
    }

    /// Check if a pixel lies inside the box
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.min_row && row < self.max_row && col >= self.min_col && col < self.max_col
    }
}

/// Deterministic assignment of every pixel to one of `num_pieces` regions
///
/// Patterns are produced once per (width, height, piece count, seed) and are
/// never mutated afterwards. Ids range over `0..num_pieces`; an id may own no
/// pixels when its seed point fell far outside the image, in which case the
/// piece simply vanishes from extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShatterPattern {
    region_map: Array2<u32>,
    num_pieces: usize,
    width: usize,
    height: usize,
}

impl ShatterPattern {
    /// Wrap a region map indexed by (row, col)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The map has a zero dimension
    /// - `num_pieces` is zero or does not fit in a `u32`
    /// - Any id in the map is `>= num_pieces`
    pub fn new(region_map: Array2<u32>, num_pieces: usize) -> Result<Self> {
        let (height, width) = region_map.dim();
        if width == 0 || height == 0 {
            return Err(ShatterError::InvalidDimensions { width, height });
        }
        if num_pieces == 0 || u32::try_from(num_pieces).is_err() {
            return Err(ShatterError::InvalidPieceCount { num_pieces });
        }
        if let Some(&bad) = region_map.iter().find(|&&id| id as usize >= num_pieces) {
            return Err(invalid_parameter(
                "region_map",
                &bad,
                &format!("piece id must be below {num_pieces}"),
            ));
        }

        Ok(Self {
            region_map,
            num_pieces,
            width,
            height,
        })
    }

    /// Piece ids indexed by (row, col)
    pub const fn region_map(&self) -> &Array2<u32> {
        &self.region_map
    }

    /// Number of regions the pattern was built for
    pub const fn num_pieces(&self) -> usize {
        self.num_pieces
    }

    /// Width in pixels
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Piece id at a pixel, `None` outside the image
    pub fn piece_at(&self, row: usize, col: usize) -> Option<u32> {
        self.region_map.get((row, col)).copied()
    }

    /// Pixel count for every piece id
    pub fn pixel_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_pieces];
        for &id in &self.region_map {
            if let Some(count) = counts.get_mut(id as usize) {
                *count += 1;
            }
        }
        counts
    }

    /// Ids that own no pixel at all
    pub fn vanished_pieces(&self) -> Vec<u32> {
        self.pixel_counts()
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(id, _)| id as u32)
            .collect()
    }

    /// Bounding box of every piece id, `None` for vanished pieces
    pub fn bounding_boxes(&self) -> Vec<Option<BoundingBox>> {
        let mut boxes: Vec<Option<BoundingBox>> = vec![None; self.num_pieces];
        for ((row, col), &id) in self.region_map.indexed_iter() {
            if let Some(slot) = boxes.get_mut(id as usize) {
                match slot {
                    Some(bbox) => bbox.include(row, col),
                    None => *slot = Some(BoundingBox::from_pixel(row, col)),
                }
            }
        }
        boxes
    }

    /// Fail unless the pattern was built for an image of this size
    ///
    /// # Errors
    ///
    /// Returns `PatternDimensionMismatch` when either dimension differs
    pub const fn ensure_matches(&self, width: usize, height: usize) -> Result<()> {
        if self.width == width && self.height == height {
            Ok(())
        } else {
            Err(ShatterError::PatternDimensionMismatch {
                pattern: (self.width, self.height),
                image: (width, height),
            })
        }
    }
}

//! Round-robin distribution of pieces and reassembly into full-size composites

use crate::io::error::{Result, ShatterError, invalid_parameter};
use crate::math::{Image, shape};
use crate::shatter::cache::PatternSource;
use crate::shatter::pieces::{Piece, apply_shatter_pattern};
use crate::spatial::pattern::ShatterPattern;
use bitvec::prelude::{BitVec, bitvec};
use ndarray::{Axis, Zip, s};

/// Deal pieces into `num_outputs` groups, piece `i` (by ascending id) going to group `i % num_outputs`
///
/// Every group is returned even when it receives no piece.
///
/// # Errors
///
/// Returns `InvalidParameter` if `num_outputs` is zero
pub fn distribute(mut pieces: Vec<Piece>, num_outputs: usize) -> Result<Vec<Vec<Piece>>> {
    if num_outputs == 0 {
        return Err(invalid_parameter(
            "num_outputs",
            &num_outputs,
            &"must be at least 1",
        ));
    }

    pieces.sort_by_key(Piece::piece_id);
    let mut groups: Vec<Vec<Piece>> = (0..num_outputs).map(|_| Vec::new()).collect();
    for (index, piece) in pieces.into_iter().enumerate() {
        if let Some(group) = groups.get_mut(index % num_outputs) {
            group.push(piece);
        }
    }
    Ok(groups)
}

/// Paint pieces over a `target_shape` buffer filled with `background`
///
/// Pixels where a piece's alpha is positive take the piece's colour; all other
/// pixels keep the background. Pieces of one group never overlap, so order
/// does not matter.
///
/// # Errors
///
/// Returns `ShapeMismatch` if a piece has a different channel count or
/// extends past the target shape
pub fn construct_image_from_pieces(
    pieces: &[Piece],
    target_shape: (usize, usize, usize),
    background: f32,
) -> Result<Image> {
    let (rows, cols, channels) = target_shape;
    let mut result = Image::from_elem(target_shape, background);

    for piece in pieces {
        let bbox = piece.bbox();
        if piece.color_channels() != channels || bbox.max_row > rows || bbox.max_col > cols {
            return Err(ShatterError::ShapeMismatch {
                operation: "construct_image_from_pieces",
                expected: target_shape,
                actual: (bbox.max_row, bbox.max_col, piece.color_channels()),
            });
        }

        let mut window =
            result.slice_mut(s![bbox.min_row..bbox.max_row, bbox.min_col..bbox.max_col, ..]);
        Zip::from(window.lanes_mut(Axis(2)))
            .and(piece.data().lanes(Axis(2)))
            .for_each(|mut dst, src| {
                if src.get(channels).is_some_and(|&alpha| alpha > 0.0) {
                    dst.assign(&src.slice(s![..channels]));
                }
            });
    }

    Ok(result)
}

/// Row-major bit mask of every pixel some piece paints
pub fn painted_mask(pieces: &[Piece], rows: usize, cols: usize) -> BitVec {
    let mut mask = bitvec![0; rows * cols];
    for piece in pieces {
        let bbox = piece.bbox();
        let alpha = piece.data().slice(s![.., .., piece.color_channels()]);
        for ((row, col), &a) in alpha.indexed_iter() {
            let (image_row, image_col) = (bbox.min_row + row, bbox.min_col + col);
            if a <= 0.0 || image_row >= rows || image_col >= cols {
                continue;
            }
            if let Some(mut bit) = mask.get_mut(image_row * cols + image_col) {
                *bit = true;
            }
        }
    }
    mask
}

/// Shatter `target` with `pattern` and composite the pieces into `num_outputs` images
///
/// # Errors
///
/// Returns an error if:
/// - The pattern does not match the target's size
/// - `num_outputs` is zero
pub fn shatter_image(
    target: &Image,
    pattern: &ShatterPattern,
    num_outputs: usize,
    background: f32,
) -> Result<Vec<Image>> {
    let target_shape = shape(target);
    let pieces = apply_shatter_pattern(target, pattern, None)?;

    distribute(pieces, num_outputs)?
        .iter()
        .map(|group| construct_image_from_pieces(group, target_shape, background))
        .collect()
}

/// Like [`shatter_image`], fetching the pattern for the target's size from `source`
///
/// # Errors
///
/// Returns an error if the pattern cannot be produced or the shatter fails
pub fn shatter_image_with_source<P: PatternSource + ?Sized>(
    target: &Image,
    source: &mut P,
    num_pieces: usize,
    num_outputs: usize,
    seed: Option<u64>,
    background: f32,
) -> Result<Vec<Image>> {
    let (rows, cols, _) = shape(target);
    let pattern = source.pattern(cols, rows, num_pieces, seed)?;
    shatter_image(target, &pattern, num_outputs, background)
}

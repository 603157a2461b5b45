//! Voronoi-style "shattered windshield" partitioning
//!
//! A quarter of the seed points cluster around the image centre like an impact
//! site, the rest scatter uniformly. Every pixel then belongs to its nearest
//! seed point. The same (width, height, piece count, seed) always yields a
//! byte-identical region map, which the pattern cache relies on.

use crate::io::configuration::{IMPACT_POINT_DIVISOR, IMPACT_SPREAD, PARTITION_CHUNK_SIZE};
use crate::io::error::{Result, ShatterError, computation_error};
use crate::spatial::kdtree::KdTree;
use crate::spatial::pattern::ShatterPattern;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

/// Number of seed points drawn around the image centre
pub const fn impact_point_count(num_pieces: usize) -> usize {
    num_pieces.div_ceil(IMPACT_POINT_DIVISOR)
}

/// Draw `num_pieces` seed points as (x, y) coordinates
///
/// Impact points follow a normal distribution around the centre with a spread
/// of a tenth of each dimension and are not clamped, so some can land outside
/// the image. Scatter points are uniform over `[0, width) × [0, height)`.
pub fn generate_seed_points<R: Rng>(
    width: usize,
    height: usize,
    num_pieces: usize,
    rng: &mut R,
) -> Vec<[f64; 2]> {
    let center_x = (width / 2) as f64;
    let center_y = (height / 2) as f64;
    let impact_count = impact_point_count(num_pieces);

    let mut points = Vec::with_capacity(num_pieces);
    for _ in 0..impact_count {
        let dx: f64 = rng.sample(StandardNormal);
        let dy: f64 = rng.sample(StandardNormal);
        points.push([
            dx.mul_add(width as f64 * IMPACT_SPREAD, center_x),
            dy.mul_add(height as f64 * IMPACT_SPREAD, center_y),
        ]);
    }
    for _ in impact_count..num_pieces {
        points.push([
            rng.random_range(0.0..width as f64),
            rng.random_range(0.0..height as f64),
        ]);
    }

    points.truncate(num_pieces);
    points
}

/// Assign every pixel to its nearest seed point
///
/// Pixels are resolved in bounded chunks, each chunk in parallel, so memory
/// stays proportional to the output map rather than to pixel-seed pairs.
///
/// # Errors
///
/// Returns an error if the resolved ids cannot be shaped into a
/// `height × width` map
pub fn assign_regions(tree: &KdTree, width: usize, height: usize) -> Result<Array2<u32>> {
    let mut flat = vec![0_u32; width * height];

    for (chunk_index, chunk) in flat.chunks_mut(PARTITION_CHUNK_SIZE).enumerate() {
        let chunk_start = chunk_index * PARTITION_CHUNK_SIZE;
        chunk.par_iter_mut().enumerate().for_each(|(offset, slot)| {
            let index = chunk_start + offset;
            let (row, col) = (index / width, index % width);
            *slot = tree.nearest([col as f64, row as f64]).unwrap_or(0) as u32;
        });
    }

    Array2::from_shape_vec((height, width), flat)
        .map_err(|e| computation_error("assign_regions", &e))
}

/// Build a shatter pattern for an image of the given size
///
/// With `seed == None` the pattern is drawn from OS entropy and is therefore
/// not reproducible; such patterns must never be cached.
///
/// # Errors
///
/// Returns an error if:
/// - `width` or `height` is zero
/// - `num_pieces` is zero or does not fit in a `u32`
pub fn create_shatter_pattern(
    width: usize,
    height: usize,
    num_pieces: usize,
    seed: Option<u64>,
) -> Result<ShatterPattern> {
    if width == 0 || height == 0 {
        return Err(ShatterError::InvalidDimensions { width, height });
    }
    if num_pieces == 0 || u32::try_from(num_pieces).is_err() {
        return Err(ShatterError::InvalidPieceCount { num_pieces });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(rand::random));
    let points = generate_seed_points(width, height, num_pieces, &mut rng);
    let tree = KdTree::build(points);
    let region_map = assign_regions(&tree, width, height)?;

    tracing::debug!(width, height, num_pieces, ?seed, "shatter pattern generated");
    ShatterPattern::new(region_map, num_pieces)
}

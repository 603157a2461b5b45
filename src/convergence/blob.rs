//! Colour-and-position blob detection by seeded k-means
//!
//! Pixels are clustered on `[channels…, 0.5·x/width, 0.5·y/height]`. Clusters
//! smaller than `min_blob_size` are folded into the large cluster whose
//! centroid is nearest, so every surviving blob is big enough to tessellate.

use crate::io::configuration::{
    DEFAULT_KMEANS_EPSILON, DEFAULT_KMEANS_ITERATIONS, DEFAULT_MIN_BLOB_SIZE,
    DEFAULT_NUM_CLUSTERS, DEFAULT_SEED, SPATIAL_FEATURE_WEIGHT, ZERO_PIXEL_THRESHOLD,
};
use crate::io::error::{Result, ShatterError, computation_error, invalid_parameter};
use crate::math::{Image, shape};
use crate::spatial::pattern::BoundingBox;
use bitvec::prelude::{BitVec, bitvec};
use ndarray::{Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::{IntoParallelIterator, ParallelIterator};

/// Blob detection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BlobConfig {
    /// Requested k-means clusters, reduced to the pixel count when larger
    pub num_clusters: usize,
    /// Upper bound on k-means refinement passes
    pub max_iterations: usize,
    /// Clusters with fewer pixels are merged away
    pub min_blob_size: usize,
    /// Largest centre movement that still counts as converged
    pub epsilon: f64,
    /// Leave near-zero pixels out of the clustering
    pub exclude_zero_pixels: bool,
    /// Seed for the initial centres
    pub seed: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            num_clusters: DEFAULT_NUM_CLUSTERS,
            max_iterations: DEFAULT_KMEANS_ITERATIONS,
            min_blob_size: DEFAULT_MIN_BLOB_SIZE,
            epsilon: DEFAULT_KMEANS_EPSILON,
            exclude_zero_pixels: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl BlobConfig {
    /// Check every field is usable
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.num_clusters == 0 {
            return Err(invalid_parameter("num_clusters", &0, &"must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(invalid_parameter("max_iterations", &0, &"must be at least 1"));
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(invalid_parameter("epsilon", &self.epsilon, &"must be non-negative"));
        }
        Ok(())
    }
}

/// Connected-or-not group of pixels with a shared colour
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    id: usize,
    size: usize,
    centroid: (f64, f64),
    bbox: BoundingBox,
    mean_color: Vec<f32>,
    mask: BitVec,
    width: usize,
}

impl Blob {
    /// Build a blob from a row-major pixel mask over an image `width` pixels wide
    ///
    /// # Errors
    ///
    /// Returns an error if `width` is zero, the mask length is not a multiple
    /// of `width`, or the mask selects no pixel
    pub fn new(id: usize, mask: BitVec, width: usize, mean_color: Vec<f32>) -> Result<Self> {
        if width == 0 || mask.len() % width != 0 {
            return Err(invalid_parameter(
                "blob mask",
                &mask.len(),
                &format!("length must be a multiple of width {width}"),
            ));
        }
        let (size, centroid, bbox) = mask_statistics(&mask, width)
            .ok_or_else(|| invalid_parameter("blob mask", &id, &"selects no pixel"))?;
        Ok(Self {
            id,
            size,
            centroid,
            bbox,
            mean_color,
            mask,
            width,
        })
    }

    /// Cluster id the blob grew from
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Pixel count
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Mean pixel position as (x, y)
    pub const fn centroid(&self) -> (f64, f64) {
        self.centroid
    }

    /// Tight half-open bounds of the mask
    pub const fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Cluster centre colour
    pub fn mean_color(&self) -> &[f32] {
        &self.mean_color
    }

    /// Row-major membership mask
    pub const fn mask(&self) -> &BitVec {
        &self.mask
    }

    /// Width of the image the mask covers
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Check if the blob owns the given pixel
    pub fn contains(&self, row: usize, col: usize) -> bool {
        col < self.width && self.mask.get(row * self.width + col).is_some_and(|bit| *bit)
    }

    /// Owned pixels as (row, col), row-major
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mask
            .iter_ones()
            .map(|index| (index / self.width, index % self.width))
    }

    /// Fold another blob's pixels into this one, keeping this blob's id and colour
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the masks cover different image sizes
    pub fn absorb(&mut self, other: &Self) -> Result<()> {
        if other.mask.len() != self.mask.len() || other.width != self.width {
            let rows = |blob: &Self| blob.mask.len() / blob.width.max(1);
            return Err(ShatterError::ShapeMismatch {
                operation: "Blob::absorb",
                expected: (rows(self), self.width, 1),
                actual: (rows(other), other.width, 1),
            });
        }
        self.mask |= other.mask.as_bitslice();
        if let Some((size, centroid, bbox)) = mask_statistics(&self.mask, self.width) {
            self.size = size;
            self.centroid = centroid;
            self.bbox = bbox;
        }
        Ok(())
    }
}

fn mask_statistics(mask: &BitVec, width: usize) -> Option<(usize, (f64, f64), BoundingBox)> {
    let mut pixels = mask.iter_ones().map(|index| (index / width, index % width));
    let (first_row, first_col) = pixels.next()?;
    let mut bbox = BoundingBox::from_pixel(first_row, first_col);
    let (mut sum_x, mut sum_y) = (first_col as f64, first_row as f64);
    let mut size = 1;
    for (row, col) in pixels {
        bbox.include(row, col);
        sum_x += col as f64;
        sum_y += row as f64;
        size += 1;
    }
    Some((size, (sum_x / size as f64, sum_y / size as f64), bbox))
}

/// Per-pixel cluster labels plus the surviving blobs
#[derive(Debug, Clone)]
pub struct BlobDetection {
    /// Blob id per pixel, `None` for excluded pixels or merged-away clusters
    pub labels: Array2<Option<usize>>,
    /// Blobs at or above the minimum size, with small clusters merged in
    pub blobs: Vec<Blob>,
}

fn is_zero_pixel(pixel: ArrayView1<'_, f32>) -> bool {
    pixel.iter().all(|v| v.abs() <= ZERO_PIXEL_THRESHOLD)
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_center(point: ArrayView1<'_, f64>, centers: &Array2<f64>) -> usize {
    let mut best = (0, f64::INFINITY);
    for (index, center) in centers.outer_iter().enumerate() {
        let distance = squared_distance(point, center);
        if distance < best.1 {
            best = (index, distance);
        }
    }
    best.0
}

fn assign(features: &Array2<f64>, centers: &Array2<f64>) -> Vec<usize> {
    (0..features.nrows())
        .into_par_iter()
        .map(|index| nearest_center(features.row(index), centers))
        .collect()
}

/// Cluster `features` rows into `k` groups
///
/// Initial centres are `k` distinct rows drawn with `seed`. A centre that
/// loses every member keeps its previous position.
///
/// # Errors
///
/// Returns `InvalidParameter` if `k` is zero or exceeds the number of rows
pub fn kmeans(
    features: &Array2<f64>,
    k: usize,
    max_iterations: usize,
    epsilon: f64,
    seed: u64,
) -> Result<(Vec<usize>, Array2<f64>)> {
    let (count, dim) = features.dim();
    if k == 0 || k > count {
        return Err(invalid_parameter("k", &k, &format!("must lie in 1..={count}")));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let picks: Vec<usize> = rand::seq::index::sample(&mut rng, count, k).into_vec();
    let mut centers = features.select(Axis(0), &picks);

    for _ in 0..max_iterations {
        let labels = assign(features, &centers);
        let mut sums = Array2::<f64>::zeros((k, dim));
        let mut counts = vec![0_usize; k];
        for (row, &label) in features.outer_iter().zip(&labels) {
            let mut sum = sums.row_mut(label);
            sum += &row;
            if let Some(c) = counts.get_mut(label) {
                *c += 1;
            }
        }

        let mut shift = 0.0_f64;
        for ((mut center, sum), &members) in centers
            .outer_iter_mut()
            .zip(sums.outer_iter())
            .zip(&counts)
        {
            if members == 0 {
                continue;
            }
            let updated = sum.mapv(|v| v / members as f64);
            shift = shift.max(squared_distance(center.view(), updated.view()).sqrt());
            center.assign(&updated);
        }
        if shift <= epsilon {
            break;
        }
    }

    let labels = assign(features, &centers);
    Ok((labels, centers))
}

/// Cluster `image` into blobs of similar colour and position
///
/// # Errors
///
/// Returns an error if the configuration is invalid or clustering fails
pub fn detect_blobs(image: &Image, config: &BlobConfig) -> Result<BlobDetection> {
    config.validate()?;
    let (rows, cols, channels) = shape(image);
    let mut labels = Array2::from_elem((rows, cols), None);
    if rows == 0 || cols == 0 {
        return Ok(BlobDetection {
            labels,
            blobs: Vec::new(),
        });
    }

    let positions: Vec<(usize, usize)> = image
        .lanes(Axis(2))
        .into_iter()
        .enumerate()
        .filter(|(_, pixel)| !(config.exclude_zero_pixels && is_zero_pixel(pixel.view())))
        .map(|(index, _)| (index / cols, index % cols))
        .collect();
    if positions.is_empty() {
        return Ok(BlobDetection {
            labels,
            blobs: Vec::new(),
        });
    }

    let dim = channels + 2;
    let mut features = Array2::<f64>::zeros((positions.len(), dim));
    for (mut feature, &(row, col)) in features.outer_iter_mut().zip(&positions) {
        for (slot, channel) in feature.iter_mut().zip(0..channels) {
            *slot = f64::from(image.get((row, col, channel)).copied().unwrap_or(0.0));
        }
        if let Some(x) = feature.get_mut(channels) {
            *x = SPATIAL_FEATURE_WEIGHT * col as f64 / cols as f64;
        }
        if let Some(y) = feature.get_mut(channels + 1) {
            *y = SPATIAL_FEATURE_WEIGHT * row as f64 / rows as f64;
        }
    }

    let k = config.num_clusters.min(positions.len());
    let (assignments, centers) =
        kmeans(&features, k, config.max_iterations, config.epsilon, config.seed)?;

    let mut masks = vec![bitvec![0; rows * cols]; k];
    for (&(row, col), &label) in positions.iter().zip(&assignments) {
        if let Some(mut bit) = masks.get_mut(label).and_then(|m| m.get_mut(row * cols + col)) {
            *bit = true;
        }
    }

    let mut large = Vec::new();
    let mut small = Vec::new();
    for (id, (mask, center)) in masks.into_iter().zip(centers.outer_iter()).enumerate() {
        if mask.not_any() {
            continue;
        }
        let color = center.iter().take(channels).map(|&v| v as f32).collect();
        let blob = Blob::new(id, mask, cols, color)?;
        if blob.size() < config.min_blob_size {
            small.push(blob);
        } else {
            large.push(blob);
        }
    }

    for fragment in &small {
        let (fx, fy) = fragment.centroid();
        let nearest = large.iter_mut().min_by(|a, b| {
            let distance = |blob: &Blob| {
                let (x, y) = blob.centroid();
                (x - fx).hypot(y - fy)
            };
            distance(a).total_cmp(&distance(b))
        });
        if let Some(target) = nearest {
            target.absorb(fragment)?;
        }
    }

    for blob in &large {
        for (row, col) in blob.pixels() {
            let slot = labels
                .get_mut((row, col))
                .ok_or_else(|| computation_error("detect_blobs", &"blob pixel outside image"))?;
            *slot = Some(blob.id());
        }
    }

    tracing::debug!(
        clusters = k,
        blobs = large.len(),
        merged = small.len(),
        "blob detection finished"
    );
    Ok(BlobDetection {
        labels,
        blobs: large,
    })
}

//! Algorithm constants and runtime configuration defaults

// Partitioning
/// Fraction of seed points clustered around the image centre (1 in 4)
pub const IMPACT_POINT_DIVISOR: usize = 4;
/// Standard deviation of impact points as a fraction of each dimension
pub const IMPACT_SPREAD: f64 = 0.1;
/// Maximum pixel coordinates resolved per nearest-seed chunk
pub const PARTITION_CHUNK_SIZE: usize = 1_000_000;

// Shattering
/// Default number of pieces in a shatter pattern
pub const DEFAULT_NUM_PIECES: usize = 15;
/// Default number of output images pieces are distributed across
pub const DEFAULT_NUM_OUTPUTS: usize = 2;
/// Fill value for pixels no piece covers
pub const DEFAULT_BACKGROUND: f32 = 0.6;
/// Fixed seed for reproducible generation
pub const DEFAULT_SEED: u64 = 42;

// Pattern cache
/// Directory used when no cache directory is given
pub const DEFAULT_CACHE_DIR: &str = ".cache";
/// File extension of stored patterns
pub const CACHE_FILE_EXTENSION: &str = "pattern";

// Fragment convergence
/// Per-pixel residual ignored by the correction step
pub const DEFAULT_TOLERANCE: f32 = 0.05;
/// Smallest step applied to a pixel that needs correcting
pub const DEFAULT_MIN_INCREMENT: f32 = 0.01;
/// Identical trailing indicators that count as a stall
pub const DEFAULT_STALL_WINDOW: usize = 11;
/// Hard iteration ceiling per fragment batch
pub const DEFAULT_ITERATION_CEILING: usize = 100;
/// Iterations sharing one pattern seed before reseeding
pub const DEFAULT_RESEED_PERIOD: usize = 5;
/// Multiplier separating negative-diff seeds from positive-diff seeds
pub const NEGATIVE_SEED_MULTIPLIER: u64 = 100;
/// Default piece count for diff fragments
pub const DEFAULT_FRAGMENT_PIECES: usize = 500;

// Brightness ceiling
/// Percentage by which references are darkened after an overflow
pub const DARKEN_STEP_PERCENT: f32 = 10.0;
/// Factor applied to the brightness accounting after an overflow
pub const BRIGHTNESS_DECAY: f32 = 0.9;
/// Darkenings in one run after which a warning is logged
pub const DARKENING_WARNING_THRESHOLD: usize = 10;

// Pyramid convergence
/// Blur ladder applied to the target, coarse to fine
pub const DEFAULT_SIGMA_LADDER: [f32; 10] = [80.0, 40.0, 20.0, 15.0, 10.0, 6.0, 4.0, 2.0, 1.0, 0.0];
/// Rotated duplicates generated per blob
pub const DEFAULT_TESSELLATION_COUNT: usize = 2;
/// Blend ratio of the first (unrotated) duplicate
pub const PRIMARY_BLEND_RATIO: f32 = 0.6;
/// Blend ratio of every further duplicate
pub const SECONDARY_BLEND_RATIO: f32 = 0.1;
/// Fraction of the residual pushed into a canvas per correction step
pub const DEFAULT_CORRECTION_GAIN: f32 = 0.3;
/// Max-abs residual below which a blob's correction loop stops
pub const DEFAULT_PYRAMID_THRESHOLD: f32 = 0.01;
/// Stall window used by the per-blob correction loop
pub const DEFAULT_PYRAMID_STALL_WINDOW: usize = 6;

// Blob detection
/// Number of k-means clusters
pub const DEFAULT_NUM_CLUSTERS: usize = 200;
/// Maximum k-means refinement passes
pub const DEFAULT_KMEANS_ITERATIONS: usize = 20;
/// Clusters smaller than this are merged into their nearest large neighbour
pub const DEFAULT_MIN_BLOB_SIZE: usize = 1000;
/// Centroid movement below which k-means stops early
pub const DEFAULT_KMEANS_EPSILON: f64 = 1e-3;
/// Weight applied to normalised coordinates in the clustering features
pub const SPATIAL_FEATURE_WEIGHT: f64 = 0.5;
/// Channel magnitude treated as zero when excluding empty pixels
pub const ZERO_PIXEL_THRESHOLD: f32 = 0.001;

// Output settings
/// Suffix of shattered piece images
pub const SHARD_SUFFIX: &str = "_shard";
/// Suffix of converged canvas images
pub const CANVAS_SUFFIX: &str = "_canvas";
/// Suffix of the combined reconstruction
pub const COMBINED_SUFFIX: &str = "_combined";

// Canvas preparation
/// Canvases created when none are supplied to the fragment loop
pub const DEFAULT_CONVERGE_CANVASES: usize = 4;
/// Canvases created for a pyramid run
pub const DEFAULT_PYRAMID_CANVASES: usize = 3;
/// Value given to unpainted canvas pixels, fully transmissive
pub const TRANSPARENT_FILL: f32 = 1.0;

//! Command-line interface for shattering images and converging canvas stacks

use crate::convergence::blob::BlobConfig;
use crate::convergence::canvas::{blank_canvases, prepare_canvases};
use crate::convergence::fragment::{FragmentConfig, converge_fragments};
use crate::convergence::pyramid::{PyramidConfig, run_pyramid};
use crate::convergence::state::OverflowPolicy;
use crate::io::configuration::{
    CANVAS_SUFFIX, COMBINED_SUFFIX, DEFAULT_BACKGROUND, DEFAULT_CACHE_DIR,
    DEFAULT_CONVERGE_CANVASES, DEFAULT_FRAGMENT_PIECES, DEFAULT_ITERATION_CEILING,
    DEFAULT_MIN_BLOB_SIZE, DEFAULT_MIN_INCREMENT, DEFAULT_NUM_CLUSTERS, DEFAULT_NUM_OUTPUTS,
    DEFAULT_NUM_PIECES, DEFAULT_PYRAMID_CANVASES, DEFAULT_SEED, DEFAULT_SIGMA_LADDER,
    DEFAULT_STALL_WINDOW, DEFAULT_TOLERANCE, SHARD_SUFFIX, TRANSPARENT_FILL,
};
use crate::io::error::Result;
use crate::io::events::{CancelToken, Guarded, ProgressSink, TracingSink};
use crate::io::image::{load_image, resize_image, save_image};
use crate::io::progress::ProgressManager;
use crate::math::blend::combine_images;
use crate::math::tone::{adjust_image_brightness, brighten_image};
use crate::math::{Image, shape};
use crate::shatter::cache::{CachePolicy, DirectPatterns, PatternCache, PatternSource};
use crate::shatter::composite::shatter_image_with_source;
use clap::{ArgAction, Args, Parser, Subcommand};
use ndarray::s;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shatterstack")]
#[command(
    author,
    version,
    about = "Shatter images into pieces and converge stacked canvases towards a target"
)]
/// Command-line arguments shared by every subcommand
// Independent switches for output control
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Operation to run
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding cached shatter patterns
    #[arg(long, global = true, default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Always recompute patterns instead of using the cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Suppress progress output and lower logging to warnings
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Stop convergence after this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Resize inputs to this width in pixels (implies square if height not specified)
    #[arg(short = 'w', long, global = true)]
    pub width: Option<usize>,

    /// Resize inputs to this height in pixels
    #[arg(short = 'H', long, global = true)]
    pub height: Option<usize>,

    /// Directory for outputs, defaults to the target's directory
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,
}

/// Available operations
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split an image into pieces distributed over several output images
    Shatter(ShatterArgs),
    /// Converge canvases towards a target with shattered residual fragments
    Converge(ConvergeArgs),
    /// Converge fresh canvases coarse-to-fine with blob tessellation
    Pyramid(PyramidArgs),
}

/// Arguments of `shatter`
#[derive(Args, Debug)]
pub struct ShatterArgs {
    /// Image to shatter
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Number of pieces
    #[arg(short = 'n', long, default_value_t = DEFAULT_NUM_PIECES)]
    pub pieces: usize,

    /// Number of output images
    #[arg(short = 'i', long, default_value_t = DEFAULT_NUM_OUTPUTS)]
    pub images: usize,

    /// Partition seed, omit with --random for an unrepeatable pattern
    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Draw the partition from OS entropy; never cached
    #[arg(long)]
    pub random: bool,

    /// Fill value for pixels outside an output's pieces
    #[arg(short, long, default_value_t = DEFAULT_BACKGROUND)]
    pub background: f32,
}

/// Arguments of `converge`
#[derive(Args, Debug)]
pub struct ConvergeArgs {
    /// Image the combined canvases should reproduce
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Starting canvases; transparent pixels count as unpainted
    #[arg(value_name = "CANVAS")]
    pub canvases: Vec<PathBuf>,

    /// Blank canvases to create when none are given
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONVERGE_CANVASES)]
    pub blank: usize,

    /// Pieces per residual partition
    #[arg(short = 'n', long, default_value_t = DEFAULT_FRAGMENT_PIECES)]
    pub pieces: usize,

    /// Residual ignored per pixel
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f32,

    /// Smallest per-pixel correction
    #[arg(long, default_value_t = DEFAULT_MIN_INCREMENT)]
    pub min_increment: f32,

    /// Identical indicators that end the run as stalled
    #[arg(long, default_value_t = DEFAULT_STALL_WINDOW)]
    pub stall_window: usize,

    /// Hard cap on iterations
    #[arg(short = 'i', long, default_value_t = DEFAULT_ITERATION_CEILING)]
    pub iterations: usize,

    /// Rescale the target into [MIN, MAX] before converging
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub target_range: Option<Vec<f32>>,

    /// Rescale each supplied canvas into [FLOOR, 1] before converging
    #[arg(long, value_name = "FLOOR")]
    pub canvas_floor: Option<f32>,

    /// Only clip overflowing canvases instead of darkening the target
    #[arg(long)]
    pub clip: bool,
}

/// Arguments of `pyramid`
#[derive(Args, Debug)]
pub struct PyramidArgs {
    /// Image the combined canvases should reproduce
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Number of canvases
    #[arg(short = 'c', long, default_value_t = DEFAULT_PYRAMID_CANVASES)]
    pub canvases: usize,

    /// Blur sigmas, coarsest first
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SIGMA_LADDER.to_vec())]
    pub sigmas: Vec<f32>,

    /// Clusters requested from blob detection
    #[arg(long, default_value_t = DEFAULT_NUM_CLUSTERS)]
    pub clusters: usize,

    /// Smallest blob kept before merging
    #[arg(long, default_value_t = DEFAULT_MIN_BLOB_SIZE)]
    pub min_blob_size: usize,

    /// Leave near-zero residual pixels out of blob detection
    #[arg(long)]
    pub exclude_zero: bool,

    /// Correction steps per blob
    #[arg(short = 'i', long, default_value_t = DEFAULT_ITERATION_CEILING)]
    pub iterations: usize,

    /// Blob detection seed
    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

impl Cli {
    /// Check if progress should be displayed
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Requested (rows, cols) for resizing inputs
    pub const fn bounds(&self) -> Option<(usize, usize)> {
        match (self.height, self.width) {
            (Some(h), Some(w)) => Some((h, w)),
            (Some(h), None) => Some((h, h)),
            (None, Some(w)) => Some((w, w)),
            (None, None) => None,
        }
    }

    /// Log filter implied by `--quiet` and `-v`
    pub const fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

/// Install the global `tracing` subscriber, preferring `RUST_LOG` when set
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Runs the parsed command against the filesystem
pub struct CommandRunner {
    cli: Cli,
    progress_manager: Option<ProgressManager>,
}

impl CommandRunner {
    /// Create a new runner for the given CLI arguments
    pub fn new(cli: Cli) -> Self {
        let progress_manager = cli.should_show_progress().then(ProgressManager::new);
        Self {
            cli,
            progress_manager,
        }
    }

    /// Execute the selected subcommand
    ///
    /// # Errors
    ///
    /// Returns an error if an input cannot be loaded, the operation fails or
    /// an output cannot be written
    pub fn run(&mut self) -> Result<()> {
        let result = match &self.cli.command {
            Command::Shatter(args) => self.shatter(args),
            Command::Converge(args) => self.converge(args),
            Command::Pyramid(args) => self.pyramid(args),
        };
        if let Some(pm) = &self.progress_manager {
            pm.finish();
        }
        result
    }

    fn patterns(&self) -> Result<Box<dyn PatternSource>> {
        if self.cli.no_cache {
            Ok(Box::new(DirectPatterns))
        } else {
            Ok(Box::new(PatternCache::open(
                &self.cli.cache_dir,
                CachePolicy::default(),
            )?))
        }
    }

    fn sink(&self, label: &str, levels: Option<usize>, ceiling: usize) -> Guarded<Box<dyn ProgressSink>> {
        let inner: Box<dyn ProgressSink> = match (&self.progress_manager, levels) {
            (Some(pm), Some(count)) => Box::new(pm.levels(label, count, ceiling)),
            (Some(pm), None) => Box::new(pm.iterations(label, ceiling)),
            (None, _) => Box::new(TracingSink),
        };
        let guarded = Guarded::new(inner, CancelToken::new());
        match self.cli.timeout {
            Some(seconds) => guarded.with_timeout(Duration::from_secs(seconds)),
            None => guarded,
        }
    }

    fn load_target(&self, path: &Path) -> Result<Image> {
        let image = load_image(path)?;
        let image = match self.cli.bounds() {
            Some((rows, cols)) => resize_image(&image, rows, cols)?,
            None => image,
        };
        // Targets are opaque; alpha only matters on canvases
        Ok(match shape(&image) {
            (_, _, 4) => image.slice(s![.., .., ..3]).to_owned(),
            _ => image,
        })
    }

    fn output_path(&self, target: &Path, suffix: &str, index: Option<usize>) -> PathBuf {
        let stem = target.file_stem().unwrap_or_default().to_string_lossy();
        let name = match index {
            Some(i) => format!("{stem}{suffix}_{i:02}.png"),
            None => format!("{stem}{suffix}.png"),
        };
        let directory = self
            .cli
            .output_dir
            .clone()
            .or_else(|| target.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        directory.join(name)
    }

    fn save_canvases(&self, target: &Path, canvases: &[Image]) -> Result<()> {
        for (index, canvas) in canvases.iter().enumerate() {
            save_image(canvas, self.output_path(target, CANVAS_SUFFIX, Some(index)))?;
        }
        save_image(
            &combine_images(canvases)?,
            self.output_path(target, COMBINED_SUFFIX, None),
        )
    }

    fn shatter(&self, args: &ShatterArgs) -> Result<()> {
        let target = self.load_target(&args.target)?;
        let mut patterns = self.patterns()?;
        let seed = (!args.random).then_some(args.seed);
        let shards = shatter_image_with_source(
            &target,
            patterns.as_mut(),
            args.pieces,
            args.images,
            seed,
            args.background,
        )?;
        for (index, shard) in shards.iter().enumerate() {
            save_image(shard, self.output_path(&args.target, SHARD_SUFFIX, Some(index)))?;
        }
        tracing::info!(path = %args.target.display(), shards = shards.len(), ?seed, "shattered");
        Ok(())
    }

    fn converge(&self, args: &ConvergeArgs) -> Result<()> {
        let mut target = self.load_target(&args.target)?;
        if let Some([min, max]) = args.target_range.as_deref().and_then(|r| <[f32; 2]>::try_from(r).ok()) {
            target = adjust_image_brightness(&target, min, max);
        }
        let (rows, cols, _) = shape(&target);

        let mut canvases = if args.canvases.is_empty() {
            blank_canvases(&target, args.blank)
        } else {
            let loaded = args
                .canvases
                .iter()
                .map(|path| {
                    let canvas = resize_image(&load_image(path)?, rows, cols)?;
                    Ok(match args.canvas_floor {
                        Some(floor) => brighten_image(&canvas, floor),
                        None => canvas,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            prepare_canvases(&target, &loaded, TRANSPARENT_FILL)?
        };

        let config = FragmentConfig {
            num_pieces: args.pieces,
            tolerance: args.tolerance,
            min_increment: args.min_increment,
            stall_window: args.stall_window,
            iteration_ceiling: args.iterations,
            overflow: if args.clip {
                OverflowPolicy::Clip
            } else {
                OverflowPolicy::Darken
            },
            ..FragmentConfig::default()
        };
        let mut patterns = self.patterns()?;
        let label = args.target.display().to_string();
        let mut sink = self.sink(&label, None, args.iterations);

        let report = converge_fragments(&target, &mut canvases, &config, patterns.as_mut(), &mut sink)?;
        tracing::info!(
            outcome = ?report.outcome,
            iterations = report.iterations,
            indicator = ?report.final_indicator,
            darkenings = report.darkenings,
            "convergence finished"
        );
        self.save_canvases(&args.target, &canvases)
    }

    fn pyramid(&self, args: &PyramidArgs) -> Result<()> {
        let target = self.load_target(&args.target)?;
        let mut canvases = blank_canvases(&target, args.canvases);
        let config = PyramidConfig {
            sigmas: args.sigmas.clone(),
            iteration_ceiling: args.iterations,
            blob: BlobConfig {
                num_clusters: args.clusters,
                min_blob_size: args.min_blob_size,
                exclude_zero_pixels: args.exclude_zero,
                seed: args.seed,
                ..BlobConfig::default()
            },
            ..PyramidConfig::default()
        };
        let label = args.target.display().to_string();
        let mut sink = self.sink(&label, Some(config.sigmas.len()), args.iterations);

        let report = run_pyramid(&target, &mut canvases, &config, &mut sink)?;
        tracing::info!(
            levels = report.levels.len(),
            cancelled = report.cancelled,
            max_brightness = report.max_brightness,
            "pyramid finished"
        );
        self.save_canvases(&args.target, &canvases)
    }
}

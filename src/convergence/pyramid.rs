//! Coarse-to-fine convergence driven by blob tessellation
//!
//! Each level blurs the target with a smaller sigma, finds colour blobs in what
//! the canvases still miss, and for every blob:
//!
//! 1. copies the blob from the blurred target into the incremental target
//! 2. blends rotated duplicates of the blob into every canvas
//! 3. corrects one canvas at a time, round-robin, skipping the banned canvas,
//!    until the incremental target is matched
//!
//! Overflow above 1.0 darkens the target, the blurred target and the
//! incremental target together, so every later level aims for the same
//! reduced brightness.

use crate::convergence::blob::{Blob, BlobConfig, detect_blobs};
use crate::convergence::canvas::validate_canvases;
use crate::convergence::state::{ConvergenceState, IndicatorKind, Outcome, OverflowPolicy};
use crate::convergence::tessellation::tessellate_blob;
use crate::io::configuration::{
    DARKEN_STEP_PERCENT, DEFAULT_CORRECTION_GAIN, DEFAULT_ITERATION_CEILING,
    DEFAULT_PYRAMID_STALL_WINDOW, DEFAULT_PYRAMID_THRESHOLD, DEFAULT_SIGMA_LADDER,
    DEFAULT_TESSELLATION_COUNT, PRIMARY_BLEND_RATIO, SECONDARY_BLEND_RATIO,
};
use crate::io::error::{Result, computation_error, invalid_parameter};
use crate::io::events::{ProgressEvent, ProgressSink, Stage};
use crate::math::Image;
use crate::math::blend::{combine_images, residual};
use crate::math::filter::low_pass_filter;
use crate::math::tone::{clamp_unit, darken_image_pct, max_value};
use ndarray::Zip;

/// Parameters of the pyramid convergence run
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidConfig {
    /// Gaussian sigmas, coarsest first; zero means unblurred
    pub sigmas: Vec<f32>,
    /// Rotated duplicates blended per blob
    pub tessellation_count: usize,
    /// Mix ratio of the unrotated duplicate
    pub primary_blend: f32,
    /// Mix ratio of every rotated duplicate
    pub secondary_blend: f32,
    /// Fraction of the residual added to the corrected canvas per step
    pub correction_gain: f32,
    /// Rounded indicator below which a blob counts as matched
    pub threshold: f32,
    /// Identical indicators in a row that count as a stall
    pub stall_window: usize,
    /// Correction steps allowed per blob
    pub iteration_ceiling: usize,
    /// Residual summary used for the history
    pub indicator: IndicatorKind,
    /// Reaction to a canvas exceeding 1.0
    pub overflow: OverflowPolicy,
    /// Blob detection parameters; the seed is offset by the level index
    pub blob: BlobConfig,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            sigmas: DEFAULT_SIGMA_LADDER.to_vec(),
            tessellation_count: DEFAULT_TESSELLATION_COUNT,
            primary_blend: PRIMARY_BLEND_RATIO,
            secondary_blend: SECONDARY_BLEND_RATIO,
            correction_gain: DEFAULT_CORRECTION_GAIN,
            threshold: DEFAULT_PYRAMID_THRESHOLD,
            stall_window: DEFAULT_PYRAMID_STALL_WINDOW,
            iteration_ceiling: DEFAULT_ITERATION_CEILING,
            indicator: IndicatorKind::Max,
            overflow: OverflowPolicy::Darken,
            blob: BlobConfig::default(),
        }
    }
}

impl PyramidConfig {
    /// Check every field is usable
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if let Some(sigma) = self.sigmas.iter().find(|s| s.is_nan() || **s < 0.0) {
            return Err(invalid_parameter("sigmas", sigma, &"must be non-negative"));
        }
        if self.tessellation_count == 0 {
            return Err(invalid_parameter("tessellation_count", &0, &"must be at least 1"));
        }
        for (name, ratio) in [
            ("primary_blend", self.primary_blend),
            ("secondary_blend", self.secondary_blend),
            ("correction_gain", self.correction_gain),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(invalid_parameter(name, &ratio, &"must lie in [0, 1]"));
            }
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(invalid_parameter("threshold", &self.threshold, &"must be non-negative"));
        }
        if self.stall_window == 0 {
            return Err(invalid_parameter("stall_window", &0, &"must be at least 1"));
        }
        if self.iteration_ceiling == 0 {
            return Err(invalid_parameter("iteration_ceiling", &0, &"must be at least 1"));
        }
        self.blob.validate()
    }

    /// Mix ratio of duplicate `index`
    pub fn blend_ratio(&self, index: usize) -> f32 {
        if index == 0 {
            self.primary_blend
        } else {
            self.secondary_blend
        }
    }
}

/// What one pyramid level did
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    /// Blur applied to the target
    pub sigma: f32,
    /// Outcome of the correction loop of each processed blob
    pub outcomes: Vec<Outcome>,
    /// Correction steps over all blobs
    pub steps: usize,
}

/// Result of a full pyramid run
#[derive(Debug, Clone)]
pub struct PyramidReport {
    /// One entry per level started
    pub levels: Vec<LevelReport>,
    /// Whether the sink cancelled the run
    pub cancelled: bool,
    /// Cumulative brightness factor at the end of the run
    pub max_brightness: f32,
    /// Overflows that darkened the references
    pub darkenings: usize,
    /// Target after any darkening
    pub target: Image,
}

struct References {
    target: Image,
    blurred: Image,
    incremental: Image,
}

impl References {
    fn darken(&mut self) {
        self.target = darken_image_pct(&self.target, DARKEN_STEP_PERCENT);
        self.blurred = darken_image_pct(&self.blurred, DARKEN_STEP_PERCENT);
        self.incremental = darken_image_pct(&self.incremental, DARKEN_STEP_PERCENT);
    }
}

struct PyramidRun<'c, 's, S: ProgressSink + ?Sized> {
    config: &'c PyramidConfig,
    canvases: &'c mut [Image],
    sink: &'s mut S,
    state: ConvergenceState,
    references: References,
}

impl<S: ProgressSink + ?Sized> PyramidRun<'_, '_, S> {
    fn level(&mut self, level: usize, sigma: f32) -> Result<LevelReport> {
        self.references.blurred = low_pass_filter(&self.references.target, sigma)?;
        let combined = combine_images(self.canvases)?;
        let diff = residual(&self.references.blurred, &combined)?;
        self.references.incremental = combined;
        self.state.banned_canvas = 0;
        self.sink
            .emit(&ProgressEvent::new(Stage::LevelStarted, level));

        let blob_config = BlobConfig {
            seed: self.config.blob.seed.wrapping_add(level as u64),
            ..self.config.blob.clone()
        };
        let detection = detect_blobs(&diff, &blob_config)?;
        tracing::info!(level, sigma, blobs = detection.blobs.len(), "pyramid level started");

        let mut report = LevelReport {
            sigma,
            outcomes: Vec::with_capacity(detection.blobs.len()),
            steps: 0,
        };
        for (index, blob) in detection.blobs.iter().enumerate() {
            if self.sink.is_cancelled() {
                report.outcomes.push(Outcome::Cancelled);
                break;
            }
            let (outcome, steps) = self.blob(blob)?;
            report.outcomes.push(outcome);
            report.steps += steps;
            self.sink.emit(
                &ProgressEvent::new(Stage::BlobProcessed, index)
                    .with_indicator(self.state.history.latest().unwrap_or(0.0)),
            );
            if outcome == Outcome::Cancelled {
                break;
            }
        }
        Ok(report)
    }

    fn blob(&mut self, blob: &Blob) -> Result<(Outcome, usize)> {
        let blurred = &self.references.blurred;
        Zip::indexed(&mut self.references.incremental).for_each(|(row, col, channel), value| {
            if let Some(&source) = blurred
                .get((row, col, channel))
                .filter(|_| blob.contains(row, col))
            {
                *value = source;
            }
        });

        let tessellations = tessellate_blob(blob, &self.references.blurred, self.config.tessellation_count);
        for (index, tessellation) in tessellations.iter().enumerate() {
            let ratio = self.config.blend_ratio(index);
            for canvas in self.canvases.iter_mut() {
                tessellation.blend_into(canvas, ratio);
            }
        }

        self.state.advance_banned(self.canvases.len());
        self.correct()
    }

    fn correct(&mut self) -> Result<(Outcome, usize)> {
        let num_canvases = self.canvases.len();
        self.state.history.clear();
        let mut cursor = 0;
        let mut steps = 0;

        let outcome = loop {
            if self.sink.is_cancelled() {
                break Outcome::Cancelled;
            }
            if steps >= self.config.iteration_ceiling {
                break Outcome::IterationCeiling;
            }
            steps += 1;
            self.state.iteration += 1;

            let combined = combine_images(self.canvases)?;
            let diff = residual(&self.references.incremental, &combined)?;
            cursor = self
                .state
                .next_canvas(cursor, num_canvases)
                .ok_or_else(|| computation_error("pyramid correction", &"no canvas to correct"))?;
            let canvas = self
                .canvases
                .get_mut(cursor)
                .ok_or_else(|| computation_error("pyramid correction", &"canvas index out of range"))?;

            let gain = self.config.correction_gain;
            Zip::from(&mut *canvas)
                .and(&diff)
                .for_each(|value, &delta| *value += delta * gain);
            let overflowed = max_value(canvas) > 1.0;
            clamp_unit(canvas);
            self.sink.emit(
                &ProgressEvent::new(Stage::CanvasUpdated, self.state.iteration)
                    .with_canvas(cursor, canvas),
            );

            if overflowed && self.config.overflow == OverflowPolicy::Darken {
                self.state.record_overflow();
                self.references.darken();
                tracing::debug!(max_brightness = self.state.max_brightness, "canvas overflow, darkened references");
                self.sink
                    .emit(&ProgressEvent::new(Stage::TargetDarkened, self.state.iteration));
                continue;
            }

            let indicator = self.state.history.push(self.config.indicator.measure(&diff));
            if indicator < self.config.threshold {
                break Outcome::Converged;
            }
            if self.state.history.is_stalled() {
                break Outcome::Stalled;
            }
        };
        Ok((outcome, steps))
    }
}

/// Run the blob-tessellation pyramid over every sigma in `config`
///
/// Canvases are clamped to [0, 1] on entry and after every mutation. The
/// brightness factor carries across levels; the banned canvas resets at the
/// start of each level.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - There are no canvases or their shapes differ from the target
/// - Filtering or blob detection fails
pub fn run_pyramid<S: ProgressSink + ?Sized>(
    target: &Image,
    canvases: &mut [Image],
    config: &PyramidConfig,
    sink: &mut S,
) -> Result<PyramidReport> {
    config.validate()?;
    validate_canvases(target, canvases)?;
    canvases.iter_mut().for_each(clamp_unit);

    let mut run = PyramidRun {
        config,
        canvases,
        sink,
        state: ConvergenceState::new(config.stall_window),
        references: References {
            target: target.clone(),
            blurred: target.clone(),
            incremental: target.clone(),
        },
    };

    let mut levels = Vec::with_capacity(config.sigmas.len());
    let mut cancelled = false;
    for (level, &sigma) in config.sigmas.iter().enumerate() {
        if run.sink.is_cancelled() {
            cancelled = true;
            break;
        }
        let report = run.level(level, sigma)?;
        cancelled = report.outcomes.contains(&Outcome::Cancelled);
        levels.push(report);
        if cancelled {
            break;
        }
    }

    let mut finished = ProgressEvent::new(Stage::ConvergenceFinished, run.state.iteration);
    if let Some(indicator) = run.state.history.latest() {
        finished = finished.with_indicator(indicator);
    }
    run.sink.emit(&finished);
    tracing::info!(
        levels = levels.len(),
        cancelled,
        max_brightness = run.state.max_brightness,
        "pyramid convergence finished"
    );

    Ok(PyramidReport {
        levels,
        cancelled,
        max_brightness: run.state.max_brightness,
        darkenings: run.state.darkenings,
        target: run.references.target,
    })
}

//! Fragment-driven convergence of stacked canvases towards a target
//!
//! Each pass shatters the positive and negative residuals into one fragment
//! per canvas and nudges every canvas by its own fragments. Responsibility for
//! a region moves between canvases as the partition seed changes every
//! `reseed_period` passes.

use crate::convergence::canvas::validate_canvases;
use crate::convergence::state::{
    ConvergenceReport, ConvergenceState, IndicatorKind, Outcome, OverflowPolicy,
};
use crate::io::configuration::{
    DARKEN_STEP_PERCENT, DEFAULT_FRAGMENT_PIECES, DEFAULT_ITERATION_CEILING,
    DEFAULT_MIN_INCREMENT, DEFAULT_RESEED_PERIOD, DEFAULT_STALL_WINDOW, DEFAULT_TOLERANCE,
    NEGATIVE_SEED_MULTIPLIER,
};
use crate::io::error::{Result, invalid_parameter};
use crate::io::events::{ProgressEvent, ProgressSink, Stage};
use crate::math::blend::{combine_images, residual, split_residual};
use crate::math::tone::{clamp_unit, darken_image_pct, max_value};
use crate::math::{Image, shape};
use crate::shatter::cache::PatternSource;
use crate::shatter::composite::shatter_image;
use ndarray::Zip;

/// Parameters of the fragment convergence loop
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentConfig {
    /// Regions per residual partition
    pub num_pieces: usize,
    /// Residual magnitude below which a pixel is left alone
    pub tolerance: f32,
    /// Smallest step applied to a pixel that needs correcting
    pub min_increment: f32,
    /// Identical indicators in a row that count as a stall
    pub stall_window: usize,
    /// Hard cap on passes
    pub iteration_ceiling: usize,
    /// Passes that share one partition seed
    pub reseed_period: usize,
    /// Residual summary used for the history
    pub indicator: IndicatorKind,
    /// Reaction to a canvas exceeding 1.0
    pub overflow: OverflowPolicy,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            num_pieces: DEFAULT_FRAGMENT_PIECES,
            tolerance: DEFAULT_TOLERANCE,
            min_increment: DEFAULT_MIN_INCREMENT,
            stall_window: DEFAULT_STALL_WINDOW,
            iteration_ceiling: DEFAULT_ITERATION_CEILING,
            reseed_period: DEFAULT_RESEED_PERIOD,
            indicator: IndicatorKind::Mean,
            overflow: OverflowPolicy::Darken,
        }
    }
}

impl FragmentConfig {
    /// Check every field is usable
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.num_pieces == 0 {
            return Err(invalid_parameter("num_pieces", &self.num_pieces, &"must be at least 1"));
        }
        if !(self.tolerance >= 0.0 && self.tolerance < 1.0) {
            return Err(invalid_parameter("tolerance", &self.tolerance, &"must lie in [0, 1)"));
        }
        if !(self.min_increment > 0.0 && self.min_increment <= 1.0) {
            return Err(invalid_parameter(
                "min_increment",
                &self.min_increment,
                &"must lie in (0, 1]",
            ));
        }
        if self.stall_window == 0 {
            return Err(invalid_parameter("stall_window", &0, &"must be at least 1"));
        }
        if self.iteration_ceiling == 0 {
            return Err(invalid_parameter("iteration_ceiling", &0, &"must be at least 1"));
        }
        if self.reseed_period == 0 {
            return Err(invalid_parameter("reseed_period", &0, &"must be at least 1"));
        }
        Ok(())
    }

    /// Partition seeds for the positive and negative residuals of `iteration`
    pub const fn seeds(&self, iteration: usize) -> (u64, u64) {
        let epoch = (iteration / self.reseed_period) as u64;
        (epoch, epoch.wrapping_mul(NEGATIVE_SEED_MULTIPLIER))
    }
}

/// Pixels nudged by one canvas correction
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    /// Pixels brightened
    pub raised: usize,
    /// Pixels darkened
    pub lowered: usize,
    /// Whether any value went above 1.0 before clamping
    pub overflowed: bool,
}

impl Correction {
    /// Whether anything changed
    pub const fn adjusted(&self) -> bool {
        self.raised > 0 || self.lowered > 0
    }
}

/// Nudge `canvas` by its positive and negative fragments, then clamp it
///
/// Positive fragment values above `tolerance` raise the pixel, negative values
/// below `-tolerance` lower it, each by `max(min_increment, |value| / 2)`.
pub fn apply_fragments(
    canvas: &mut Image,
    positive: &Image,
    negative: &Image,
    tolerance: f32,
    min_increment: f32,
) -> Correction {
    let mut correction = Correction::default();
    Zip::from(&mut *canvas)
        .and(positive)
        .and(negative)
        .for_each(|value, &pos, &neg| {
            if pos > tolerance {
                *value += min_increment.max(pos.abs() / 2.0);
                correction.raised += 1;
            }
            if neg < -tolerance {
                *value -= min_increment.max(neg.abs() / 2.0);
                correction.lowered += 1;
            }
        });
    correction.overflowed = max_value(canvas) > 1.0;
    clamp_unit(canvas);
    correction
}

/// Drive `canvases` until their product approximates `target`
///
/// Canvases are clamped to [0, 1] on entry and after every correction. The
/// run ends when a full pass adjusts nothing, the indicator stalls, the
/// iteration ceiling is reached or the sink asks to cancel; all four are
/// reported through [`ConvergenceReport::outcome`] rather than as errors.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - There are no canvases or their shapes differ from the target
/// - A residual pattern cannot be produced
pub fn converge_fragments<P, S>(
    target: &Image,
    canvases: &mut [Image],
    config: &FragmentConfig,
    patterns: &mut P,
    sink: &mut S,
) -> Result<ConvergenceReport>
where
    P: PatternSource + ?Sized,
    S: ProgressSink + ?Sized,
{
    config.validate()?;
    validate_canvases(target, canvases)?;

    let (rows, cols, _) = shape(target);
    let num_canvases = canvases.len();
    let mut reference = target.clone();
    let mut state = ConvergenceState::new(config.stall_window);
    canvases.iter_mut().for_each(clamp_unit);

    let outcome = loop {
        if sink.is_cancelled() {
            break Outcome::Cancelled;
        }
        if state.iteration >= config.iteration_ceiling {
            break Outcome::IterationCeiling;
        }
        state.iteration += 1;

        let combined = combine_images(canvases)?;
        let diff = residual(&reference, &combined)?;
        let indicator = state.history.push(config.indicator.measure(&diff));
        if state.history.is_stalled() {
            tracing::debug!(iteration = state.iteration, indicator, "indicator stalled");
            break Outcome::Stalled;
        }

        let (diff_pos, diff_neg) = split_residual(&diff);
        let (seed_pos, seed_neg) = config.seeds(state.iteration);
        let pattern_pos = patterns.pattern(cols, rows, config.num_pieces, Some(seed_pos))?;
        let pattern_neg = patterns.pattern(cols, rows, config.num_pieces, Some(seed_neg))?;
        sink.emit(&ProgressEvent::new(Stage::PatternBuilt, state.iteration));

        let fragments_pos = shatter_image(&diff_pos, &pattern_pos, num_canvases, 0.0)?;
        let fragments_neg = shatter_image(&diff_neg, &pattern_neg, num_canvases, 1.0)?;

        let mut needs_iteration = false;
        let mut overflowed = false;
        for (index, ((canvas, pos), neg)) in canvases
            .iter_mut()
            .zip(&fragments_pos)
            .zip(&fragments_neg)
            .enumerate()
        {
            let correction =
                apply_fragments(canvas, pos, neg, config.tolerance, config.min_increment);
            needs_iteration |= correction.adjusted();
            overflowed |= correction.overflowed;
            sink.emit(
                &ProgressEvent::new(Stage::CanvasUpdated, state.iteration)
                    .with_indicator(indicator)
                    .with_canvas(index, canvas),
            );
        }

        if overflowed && config.overflow == OverflowPolicy::Darken {
            state.record_overflow();
            reference = darken_image_pct(&reference, DARKEN_STEP_PERCENT);
            tracing::debug!(
                iteration = state.iteration,
                max_brightness = state.max_brightness,
                "canvas overflow, darkened target"
            );
            sink.emit(&ProgressEvent::new(Stage::TargetDarkened, state.iteration));
        }

        sink.emit(
            &ProgressEvent::new(Stage::IterationFinished, state.iteration)
                .with_indicator(indicator),
        );
        if !needs_iteration {
            break Outcome::Converged;
        }
    };

    let final_indicator = state.history.latest();
    let mut finished = ProgressEvent::new(Stage::ConvergenceFinished, state.iteration);
    if let Some(value) = final_indicator {
        finished = finished.with_indicator(value);
    }
    sink.emit(&finished);
    tracing::info!(?outcome, iterations = state.iteration, ?final_indicator, "fragment convergence finished");

    Ok(ConvergenceReport {
        outcome,
        iterations: state.iteration,
        final_indicator,
        max_brightness: state.max_brightness,
        darkenings: state.darkenings,
        target: reference,
    })
}

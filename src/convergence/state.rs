//! Run-scoped convergence state: indicator history, brightness accounting, canvas rotation

use crate::io::configuration::{BRIGHTNESS_DECAY, DARKENING_WARNING_THRESHOLD};
use crate::math::Image;
use crate::math::blend::{max_abs, mean_abs};
use std::collections::VecDeque;

/// Scalar summary used to detect convergence and stalls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    /// Mean absolute residual
    Mean,
    /// Largest absolute residual
    Max,
}

impl IndicatorKind {
    /// Summarise a residual image
    pub fn measure(self, diff: &Image) -> f32 {
        match self {
            Self::Mean => mean_abs(diff),
            Self::Max => max_abs(diff),
        }
    }
}

/// What to do when a correction pushes a canvas above 1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Clip the canvas and darken every reference image by one step
    Darken,
    /// Clip the canvas only
    Clip,
}

/// Terminal state of a convergence run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A pass made no adjustment, or the residual fell below threshold
    Converged,
    /// The indicator repeated for the whole stall window
    Stalled,
    /// The hard iteration ceiling was reached
    IterationCeiling,
    /// The progress sink requested cancellation
    Cancelled,
}

impl Outcome {
    /// Check if this is the success path
    pub const fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Round to three decimals, stored as whole thousandths so equality is exact
pub fn to_thousandths(value: f32) -> u32 {
    (value.abs() * 1000.0).round() as u32
}

/// Bounded history of rounded diff indicators
#[derive(Debug, Clone)]
pub struct DiffHistory {
    values: VecDeque<u32>,
    window: usize,
}

impl DiffHistory {
    /// History that reports a stall after `window` identical values
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            values: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Record an indicator, returning it rounded to three decimals
    pub fn push(&mut self, indicator: f32) -> f32 {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        let rounded = to_thousandths(indicator);
        self.values.push_back(rounded);
        rounded as f32 / 1000.0
    }

    /// Most recent rounded indicator
    pub fn latest(&self) -> Option<f32> {
        self.values.back().map(|&v| v as f32 / 1000.0)
    }

    /// Whether the last `window` indicators are all identical
    pub fn is_stalled(&self) -> bool {
        self.values.len() == self.window
            && self
                .values
                .front()
                .is_some_and(|first| self.values.iter().all(|v| v == first))
    }

    /// Number of retained values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forget every recorded value
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Mutable state threaded through one convergence run
#[derive(Debug, Clone)]
pub struct ConvergenceState {
    /// Iterations started so far
    pub iteration: usize,
    /// Rounded indicators for stall detection
    pub history: DiffHistory,
    /// Cumulative brightness factor, multiplied down on every overflow
    pub max_brightness: f32,
    /// Overflows that darkened the references
    pub darkenings: usize,
    /// Canvas excluded from the next correction
    pub banned_canvas: usize,
}

impl ConvergenceState {
    /// Fresh state with full brightness and the given stall window
    pub fn new(stall_window: usize) -> Self {
        Self {
            iteration: 0,
            history: DiffHistory::new(stall_window),
            max_brightness: 1.0,
            darkenings: 0,
            banned_canvas: 0,
        }
    }

    /// Account for one brightness overflow
    ///
    /// Logs a warning once the run has darkened its references
    /// [`DARKENING_WARNING_THRESHOLD`] times, which usually means some pixel
    /// cannot be reached by any canvas.
    pub fn record_overflow(&mut self) {
        self.max_brightness *= BRIGHTNESS_DECAY;
        self.darkenings += 1;
        if self.darkenings == DARKENING_WARNING_THRESHOLD {
            tracing::warn!(
                darkenings = self.darkenings,
                max_brightness = self.max_brightness,
                "references darkened repeatedly, some pixels may be unreachable"
            );
        }
    }

    /// Move the banned index to the next canvas, wrapping around
    pub const fn advance_banned(&mut self, num_canvases: usize) {
        self.banned_canvas = if self.banned_canvas + 1 < num_canvases {
            self.banned_canvas + 1
        } else {
            0
        };
    }

    /// Next canvas after `cursor` in round-robin order, skipping the banned one
    ///
    /// A lone canvas is never skipped. Returns `None` only when there are no canvases.
    pub fn next_canvas(&self, cursor: usize, num_canvases: usize) -> Option<usize> {
        (1..=num_canvases)
            .map(|step| (cursor + step) % num_canvases)
            .find(|&index| num_canvases == 1 || index != self.banned_canvas)
    }
}

/// Final result of a convergence run
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    /// How the run ended
    pub outcome: Outcome,
    /// Iterations started
    pub iterations: usize,
    /// Last rounded diff indicator, if any was measured
    pub final_indicator: Option<f32>,
    /// Cumulative brightness factor at the end of the run
    pub max_brightness: f32,
    /// Overflows that darkened the references
    pub darkenings: usize,
    /// Reference image the canvases were driven towards, after any darkening
    pub target: Image,
}

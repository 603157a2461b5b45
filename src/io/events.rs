//! Stage checkpoints emitted by long-running operations
//!
//! Convergence runs report through a [`ProgressSink`] after every major stage
//! and poll it for cancellation at each iteration boundary.

use crate::math::Image;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Major stage of a shatter or convergence run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// A shatter pattern was produced or fetched from the cache
    PatternBuilt,
    /// A pyramid level started blurring the target
    LevelStarted,
    /// A blob was tessellated into the canvases and corrected
    BlobProcessed,
    /// A canvas received a correction
    CanvasUpdated,
    /// A full correction pass finished
    IterationFinished,
    /// A brightness overflow darkened the reference images
    TargetDarkened,
    /// A run reached a terminal state
    ConvergenceFinished,
}

impl Stage {
    /// Stable lowercase name for logs and transports
    pub const fn name(self) -> &'static str {
        match self {
            Self::PatternBuilt => "pattern_built",
            Self::LevelStarted => "level_started",
            Self::BlobProcessed => "blob_processed",
            Self::CanvasUpdated => "canvas_updated",
            Self::IterationFinished => "iteration_finished",
            Self::TargetDarkened => "target_darkened",
            Self::ConvergenceFinished => "convergence_finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Checkpoint carrying the stage and, where relevant, a canvas snapshot
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    /// Stage that just completed
    pub stage: Stage,
    /// Iteration (or level/blob index) the stage belongs to
    pub iteration: usize,
    /// Diff indicator at this point, when one was computed
    pub indicator: Option<f32>,
    /// Index and current contents of the canvas concerned
    pub canvas: Option<(usize, &'a Image)>,
}

impl<'a> ProgressEvent<'a> {
    /// Event with no indicator or snapshot
    pub const fn new(stage: Stage, iteration: usize) -> Self {
        Self {
            stage,
            iteration,
            indicator: None,
            canvas: None,
        }
    }

    /// Attach the current diff indicator
    pub const fn with_indicator(mut self, indicator: f32) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Attach a canvas snapshot
    pub const fn with_canvas(mut self, index: usize, canvas: &'a Image) -> Self {
        self.canvas = Some((index, canvas));
        self
    }
}

/// Receiver of progress checkpoints and source of cooperative cancellation
pub trait ProgressSink {
    /// Record a checkpoint
    fn emit(&mut self, event: &ProgressEvent<'_>);

    /// Whether the run should stop at the next iteration boundary
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that ignores every event and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: &ProgressEvent<'_>) {}
}

/// Sink that forwards checkpoints to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&mut self, event: &ProgressEvent<'_>) {
        let canvas = event.canvas.map(|(index, _)| index);
        match event.stage {
            Stage::ConvergenceFinished | Stage::TargetDarkened | Stage::LevelStarted => {
                tracing::info!(stage = %event.stage, iteration = event.iteration, indicator = ?event.indicator, ?canvas);
            }
            _ => {
                tracing::debug!(stage = %event.stage, iteration = event.iteration, indicator = ?event.indicator, ?canvas);
            }
        }
    }
}

/// Shared flag that asks a running operation to stop
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wraps a sink and cancels once a token fires or a deadline passes
#[derive(Debug)]
pub struct Guarded<S> {
    inner: S,
    token: CancelToken,
    deadline: Option<Instant>,
}

impl<S: ProgressSink> Guarded<S> {
    /// Guard `inner` with `token`
    pub const fn new(inner: S, token: CancelToken) -> Self {
        Self {
            inner,
            token,
            deadline: None,
        }
    }

    /// Also cancel once `timeout` has elapsed from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Recover the wrapped sink
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ProgressSink> ProgressSink for Guarded<S> {
    fn emit(&mut self, event: &ProgressEvent<'_>) {
        self.inner.emit(event);
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
            || self.inner.is_cancelled()
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn emit(&mut self, event: &ProgressEvent<'_>) {
        (**self).emit(event);
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
    fn emit(&mut self, event: &ProgressEvent<'_>) {
        (**self).emit(event);
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

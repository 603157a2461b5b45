//! Terminal progress bars for shatter and convergence runs

use crate::io::events::{ProgressEvent, ProgressSink, Stage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::LazyLock;

static ITERATION_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
});

static LEVEL_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] Levels: [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
});

/// Owns the terminal area shared by every bar of one command
pub struct ProgressManager {
    multi_progress: MultiProgress,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
        }
    }

    /// Bar counting fragment iterations up to `ceiling`
    pub fn iterations(&self, label: &str, ceiling: usize) -> BarSink {
        let bar = self.multi_progress.add(ProgressBar::new(ceiling as u64));
        bar.set_style(ITERATION_STYLE.clone());
        bar.set_prefix(label.to_string());
        BarSink { bar, levels: None }
    }

    /// Bar counting pyramid levels, with a nested bar for correction steps
    pub fn levels(&self, label: &str, levels: usize, ceiling: usize) -> BarSink {
        let level_bar = self.multi_progress.add(ProgressBar::new(levels as u64));
        level_bar.set_style(LEVEL_STYLE.clone());
        let mut sink = self.iterations(label, ceiling);
        sink.levels = Some(level_bar);
        sink
    }

    /// Clean up all progress displays
    pub fn finish(&self) {
        let _ = self.multi_progress.clear();
    }
}

/// Progress sink that drives indicatif bars
pub struct BarSink {
    bar: ProgressBar,
    levels: Option<ProgressBar>,
}

impl ProgressSink for BarSink {
    fn emit(&mut self, event: &ProgressEvent<'_>) {
        match event.stage {
            Stage::IterationFinished => {
                self.bar.set_position(event.iteration as u64);
                if let Some(indicator) = event.indicator {
                    self.bar.set_message(format!("diff {indicator:.3}"));
                }
            }
            Stage::CanvasUpdated if self.levels.is_some() => self.bar.inc(1),
            Stage::BlobProcessed => {
                self.bar.set_position(0);
                if let Some(levels) = &self.levels {
                    levels.set_message(format!("blob {}", event.iteration + 1));
                }
            }
            Stage::LevelStarted => {
                if let Some(levels) = &self.levels {
                    levels.set_position(event.iteration as u64);
                }
            }
            Stage::TargetDarkened => self.bar.set_message("darkened target"),
            Stage::ConvergenceFinished => {
                self.bar.finish();
                if let Some(levels) = &self.levels {
                    levels.finish();
                }
            }
            Stage::PatternBuilt | Stage::CanvasUpdated => {}
        }
    }
}

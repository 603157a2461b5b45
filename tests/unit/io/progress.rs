//! Tests for terminal progress bars driven by convergence events

#[cfg(test)]
mod tests {
    use shatterstack::io::events::{ProgressEvent, ProgressSink, Stage};
    use shatterstack::io::progress::ProgressManager;
    use shatterstack::math::Image;

    // Tests an iteration bar accepts a full fragment run
    // Verified by finishing the bar before the last update
    #[test]
    fn test_iteration_bar_events() {
        let manager = ProgressManager::new();
        let mut sink = manager.iterations("target.png", 10);
        let canvas = Image::zeros((1, 1, 1));

        sink.emit(&ProgressEvent::new(Stage::PatternBuilt, 1));
        sink.emit(&ProgressEvent::new(Stage::CanvasUpdated, 1).with_canvas(0, &canvas));
        sink.emit(&ProgressEvent::new(Stage::IterationFinished, 1).with_indicator(0.2));
        sink.emit(&ProgressEvent::new(Stage::TargetDarkened, 1));
        sink.emit(&ProgressEvent::new(Stage::ConvergenceFinished, 1));

        assert!(!sink.is_cancelled());
        manager.finish();
    }

    // Tests a level bar accepts a full pyramid run
    // Verified by leaving the nested bar unset
    #[test]
    fn test_level_bar_events() {
        let manager = ProgressManager::default();
        let mut sink = manager.levels("target.png", 2, 50);

        for level in 0..2 {
            sink.emit(&ProgressEvent::new(Stage::LevelStarted, level));
            for step in 0..3 {
                sink.emit(&ProgressEvent::new(Stage::CanvasUpdated, step));
            }
            sink.emit(&ProgressEvent::new(Stage::BlobProcessed, 0).with_indicator(0.004));
        }
        sink.emit(&ProgressEvent::new(Stage::ConvergenceFinished, 6));

        manager.finish();
    }
}

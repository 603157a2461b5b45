//! Tests for the blob-tessellation pyramid loop

#[cfg(test)]
mod tests {
    use shatterstack::convergence::blob::BlobConfig;
    use shatterstack::convergence::canvas::blank_canvases;
    use shatterstack::convergence::pyramid::{PyramidConfig, run_pyramid};
    use shatterstack::convergence::state::Outcome;
    use shatterstack::io::events::{
        CancelToken, Guarded, NullSink, ProgressEvent, ProgressSink, Stage,
    };
    use shatterstack::math::Image;

    #[derive(Default)]
    struct Recorder {
        stages: Vec<Stage>,
    }

    impl ProgressSink for Recorder {
        fn emit(&mut self, event: &ProgressEvent<'_>) {
            self.stages.push(event.stage);
        }
    }

    fn config(num_clusters: usize) -> PyramidConfig {
        PyramidConfig {
            sigmas: vec![0.0],
            blob: BlobConfig {
                num_clusters,
                min_blob_size: 1,
                ..BlobConfig::default()
            },
            ..PyramidConfig::default()
        }
    }

    // Tests the first duplicate uses the primary ratio and the rest the secondary
    // Verified by using the primary ratio for every duplicate
    #[test]
    fn test_blend_ratio() {
        let config = PyramidConfig::default();
        assert_eq!(config.blend_ratio(0), 0.6);
        assert_eq!(config.blend_ratio(1), 0.1);
        assert_eq!(config.blend_ratio(5), 0.1);
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        assert!(PyramidConfig::default().validate().is_ok());
        for config in [
            PyramidConfig {
                sigmas: vec![1.0, -2.0],
                ..PyramidConfig::default()
            },
            PyramidConfig {
                tessellation_count: 0,
                ..PyramidConfig::default()
            },
            PyramidConfig {
                correction_gain: 1.5,
                ..PyramidConfig::default()
            },
            PyramidConfig {
                iteration_ceiling: 0,
                ..PyramidConfig::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }

    // Tests a target already matched by the canvases needs one step per blob
    // Verified by blending the target colour into the canvases twice
    #[test]
    fn test_matched_target() {
        let target = Image::ones((6, 6, 3));
        let mut canvases = blank_canvases(&target, 3);
        let mut recorder = Recorder::default();

        let report = run_pyramid(&target, &mut canvases, &config(3), &mut recorder).unwrap();

        assert_eq!(report.levels.len(), 1);
        let level = &report.levels[0];
        assert!(!level.outcomes.is_empty());
        assert!(level.outcomes.iter().all(|o| *o == Outcome::Converged));
        assert_eq!(level.steps, level.outcomes.len());
        assert_eq!(report.darkenings, 0);
        assert!(!report.cancelled);
        assert!(canvases.iter().flat_map(|c| c.iter()).all(|&v| v == 1.0));

        let count = |stage: Stage| recorder.stages.iter().filter(|s| **s == stage).count();
        assert_eq!(count(Stage::LevelStarted), 1);
        assert_eq!(count(Stage::BlobProcessed), level.outcomes.len());
        assert_eq!(recorder.stages.last(), Some(&Stage::ConvergenceFinished));
    }

    // Tests canvases stay in range and brightness accounting follows darkenings
    // Verified by clamping only at the end of a level
    #[test]
    fn test_grey_target_invariants() {
        let target = Image::from_elem((6, 6, 1), 0.5);
        let mut canvases = blank_canvases(&target, 3);

        let report = run_pyramid(&target, &mut canvases, &config(1), &mut NullSink).unwrap();

        assert_eq!(report.levels.len(), 1);
        assert_eq!(report.levels[0].outcomes.len(), 1);
        assert_ne!(report.levels[0].outcomes[0], Outcome::Cancelled);
        assert!(canvases.iter().flat_map(|c| c.iter()).all(|&v| (0.0..=1.0).contains(&v)));
        let expected = 0.9_f32.powi(report.darkenings as i32);
        assert!((report.max_brightness - expected).abs() < 1e-4);
        assert!(report.target.iter().all(|&v| v <= 0.5 + 1e-6));
    }

    // Tests a cancelled sink stops before the first level
    // Verified by checking cancellation only between blobs
    #[test]
    fn test_cancelled_before_start() {
        let target = Image::from_elem((4, 4, 3), 0.5);
        let mut canvases = blank_canvases(&target, 2);
        let token = CancelToken::new();
        token.cancel();
        let mut sink = Guarded::new(NullSink, token);

        let report = run_pyramid(&target, &mut canvases, &config(2), &mut sink).unwrap();

        assert!(report.cancelled);
        assert!(report.levels.is_empty());
        assert!(canvases.iter().flat_map(|c| c.iter()).all(|&v| v == 1.0));
    }

    #[test]
    fn test_empty_canvas_stack_rejected() {
        let target = Image::ones((2, 2, 3));
        assert!(run_pyramid(&target, &mut [], &config(1), &mut NullSink).is_err());
    }
}

//! Tests for algorithm constants and their relationships

#[cfg(test)]
mod tests {
    use shatterstack::io::configuration::{
        BRIGHTNESS_DECAY, DARKEN_STEP_PERCENT, DEFAULT_ITERATION_CEILING, DEFAULT_MIN_INCREMENT,
        DEFAULT_PYRAMID_STALL_WINDOW, DEFAULT_SIGMA_LADDER, DEFAULT_STALL_WINDOW,
        DEFAULT_TOLERANCE, IMPACT_POINT_DIVISOR, NEGATIVE_SEED_MULTIPLIER, PRIMARY_BLEND_RATIO,
        SECONDARY_BLEND_RATIO, TRANSPARENT_FILL,
    };

    // Tests the darken step and brightness decay describe the same factor
    // Verified by changing the darken percentage alone
    #[test]
    fn test_darkening_consistent() {
        assert!((1.0 - DARKEN_STEP_PERCENT / 100.0 - BRIGHTNESS_DECAY).abs() < 1e-6);
    }

    // Tests the sigma ladder runs coarse to fine and ends unblurred
    // Verified by reversing the ladder
    #[test]
    fn test_sigma_ladder_descending() {
        assert!(DEFAULT_SIGMA_LADDER.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(DEFAULT_SIGMA_LADDER.last(), Some(&0.0));
    }

    // Tests the increment floor sits below the tolerance
    // Verified by raising the increment above tolerance
    #[test]
    fn test_fragment_defaults() {
        assert!(DEFAULT_MIN_INCREMENT < DEFAULT_TOLERANCE);
        assert!(DEFAULT_STALL_WINDOW < DEFAULT_ITERATION_CEILING);
        assert!(DEFAULT_PYRAMID_STALL_WINDOW < DEFAULT_STALL_WINDOW);
        assert_eq!(NEGATIVE_SEED_MULTIPLIER, 100);
        assert_eq!(IMPACT_POINT_DIVISOR, 4);
    }

    #[test]
    fn test_blend_ratios() {
        assert!(PRIMARY_BLEND_RATIO > SECONDARY_BLEND_RATIO);
        assert!(PRIMARY_BLEND_RATIO <= 1.0);
        assert_eq!(TRANSPARENT_FILL, 1.0);
    }
}

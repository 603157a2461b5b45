//! Tests for round-robin distribution and compositing

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};
    use shatterstack::ShatterError;
    use shatterstack::math::Image;
    use shatterstack::shatter::composite::{painted_mask, shatter_image_with_source};
    use shatterstack::shatter::{
        DirectPatterns, Piece, apply_shatter_pattern, construct_image_from_pieces, distribute,
        shatter_image,
    };
    use shatterstack::spatial::ShatterPattern;

    fn target() -> Image {
        Array3::from_shape_fn((2, 3, 1), |(r, c, _)| 0.1 * (r * 3 + c + 1) as f32)
    }

    fn stripes() -> ShatterPattern {
        ShatterPattern::new(array![[0_u32, 1, 2], [0, 1, 2]], 3).unwrap()
    }

    // Tests piece i lands in group i mod n, in ascending id order
    // Verified by dealing pieces in reverse
    #[test]
    fn test_distribute_round_robin() {
        let mut pieces = apply_shatter_pattern(&target(), &stripes(), None).unwrap();
        pieces.reverse();

        let groups = distribute(pieces, 2).unwrap();
        let ids: Vec<Vec<u32>> = groups
            .iter()
            .map(|g| g.iter().map(Piece::piece_id).collect())
            .collect();

        assert_eq!(ids, vec![vec![0, 2], vec![1]]);
    }

    // Tests surplus groups are returned empty
    // Verified by truncating to the piece count
    #[test]
    fn test_distribute_more_groups_than_pieces() {
        let pieces = apply_shatter_pattern(&target(), &stripes(), None).unwrap();
        let groups = distribute(pieces, 5).unwrap();

        assert_eq!(groups.len(), 5);
        assert!(groups[3].is_empty() && groups[4].is_empty());
    }

    #[test]
    fn test_distribute_zero_outputs() {
        assert!(matches!(
            distribute(Vec::new(), 0),
            Err(ShatterError::InvalidParameter { .. })
        ));
    }

    // Tests painted pixels copy the target and the rest keep the background
    // Verified by painting the whole bounding box
    #[test]
    fn test_shatter_image_layers() {
        let target = target();
        let outputs = shatter_image(&target, &stripes(), 2, 0.6).unwrap();

        assert_eq!(outputs.len(), 2);
        let first = &outputs[0];
        assert_eq!(first[[0, 0, 0]], target[[0, 0, 0]]);
        assert_eq!(first[[1, 2, 0]], target[[1, 2, 0]]);
        assert_eq!(first[[0, 1, 0]], 0.6);
        assert_eq!(outputs[1][[1, 1, 0]], target[[1, 1, 0]]);
        assert_eq!(outputs[1][[1, 0, 0]], 0.6);
    }

    // Tests an empty group composites to pure background
    // Verified by returning a zeroed image
    #[test]
    fn test_empty_group_is_background() {
        let image = construct_image_from_pieces(&[], (2, 2, 3), 0.25).unwrap();
        assert!(image.iter().all(|&v| v == 0.25));
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let pieces = apply_shatter_pattern(&target(), &stripes(), None).unwrap();
        assert!(matches!(
            construct_image_from_pieces(&pieces, (2, 3, 3), 0.0),
            Err(ShatterError::ShapeMismatch { .. })
        ));
    }

    // Tests the union of every group covers each pixel exactly once
    // Verified by dropping the last group
    #[test]
    fn test_groups_cover_every_pixel() {
        let pieces = apply_shatter_pattern(&target(), &stripes(), None).unwrap();
        let groups = distribute(pieces, 2).unwrap();

        let first = painted_mask(&groups[0], 2, 3);
        let second = painted_mask(&groups[1], 2, 3);

        assert_eq!(first.count_ones() + second.count_ones(), 6);
        assert!(!first.iter().zip(second.iter()).any(|(a, b)| *a && *b));
    }

    #[test]
    fn test_shatter_with_source() {
        let target = target();
        let mut source = DirectPatterns;
        let outputs = shatter_image_with_source(&target, &mut source, 3, 2, Some(5), 1.0).unwrap();

        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().all(|o| o.dim() == target.dim()));
    }
}

//! Tests for cutting images into alpha-masked pieces

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};
    use shatterstack::ShatterError;
    use shatterstack::math::Image;
    use shatterstack::shatter::{Piece, apply_shatter_pattern};
    use shatterstack::spatial::{BoundingBox, ShatterPattern};

    fn gradient(rows: usize, cols: usize) -> Image {
        Array3::from_shape_fn((rows, cols, 3), |(r, c, ch)| {
            (r * cols + c) as f32 / (rows * cols) as f32 + ch as f32 * 0.01
        })
    }

    // Tests each piece is cropped to its box with a membership mask
    // Verified by leaving the alpha channel at one for the whole box
    #[test]
    fn test_pieces_crop_and_mask() {
        let target = gradient(2, 3);
        let pattern = ShatterPattern::new(array![[0_u32, 1, 1], [0, 0, 1]], 2).unwrap();

        let pieces = apply_shatter_pattern(&target, &pattern, None).unwrap();

        assert_eq!(pieces.len(), 2);
        let first = &pieces[0];
        assert_eq!(first.piece_id(), 0);
        assert_eq!(first.data().dim(), (2, 2, 4));
        assert_eq!(first.data()[[0, 0, 3]], 1.0);
        assert_eq!(first.data()[[0, 1, 3]], 0.0);
        assert_eq!(first.data()[[1, 1, 3]], 1.0);
        assert_eq!(first.data()[[1, 1, 0]], target[[1, 1, 0]]);
        assert_eq!(first.pixel_count(), 3);
        assert!(first.covers(1, 1));
        assert!(!first.covers(0, 1));

        let second = &pieces[1];
        assert_eq!(
            second.bbox(),
            BoundingBox {
                min_row: 0,
                min_col: 1,
                max_row: 2,
                max_col: 3,
            }
        );
        assert_eq!(second.color_channels(), 3);
    }

    // Tests regions with no pixels produce no piece
    // Verified by emitting empty pieces for vanished ids
    #[test]
    fn test_vanished_regions_skipped() {
        let target = gradient(2, 2);
        let pattern = ShatterPattern::new(array![[0_u32, 3], [3, 0]], 5).unwrap();

        let ids: Vec<u32> = apply_shatter_pattern(&target, &pattern, None)
            .unwrap()
            .iter()
            .map(Piece::piece_id)
            .collect();

        assert_eq!(ids, vec![0, 3]);
    }

    #[test]
    fn test_background_id_skipped() {
        let target = gradient(2, 2);
        let pattern = ShatterPattern::new(array![[0_u32, 1], [1, 2]], 3).unwrap();

        let pieces = apply_shatter_pattern(&target, &pattern, Some(1)).unwrap();
        assert!(pieces.iter().all(|p| p.piece_id() != 1));
        assert_eq!(pieces.len(), 2);
    }

    // Tests patterns are never resized to fit
    // Verified by cropping the pattern to the image
    #[test]
    fn test_dimension_mismatch() {
        let target = gradient(3, 3);
        let pattern = ShatterPattern::new(ndarray::Array2::zeros((3, 4)), 1).unwrap();

        assert!(matches!(
            apply_shatter_pattern(&target, &pattern, None),
            Err(ShatterError::PatternDimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_piece_shape_checked() {
        let bbox = BoundingBox::from_pixel(0, 0);
        assert!(Piece::new(Array3::zeros((1, 1, 4)), bbox, 0).is_ok());
        assert!(Piece::new(Array3::zeros((2, 1, 4)), bbox, 0).is_err());
        assert!(Piece::new(Array3::zeros((1, 1, 1)), bbox, 0).is_err());
    }
}

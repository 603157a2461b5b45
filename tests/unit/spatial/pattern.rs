//! Tests for shatter pattern construction and region statistics

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use shatterstack::ShatterError;
    use shatterstack::spatial::{BoundingBox, ShatterPattern};

    // Tests bounding boxes are half-open on the max side
    // Verified by storing inclusive maxima
    #[test]
    fn test_bounding_box_growth() {
        let mut bbox = BoundingBox::from_pixel(2, 3);
        assert_eq!((bbox.height(), bbox.width()), (1, 1));

        bbox.include(4, 1);
        assert_eq!(
            bbox,
            BoundingBox {
                min_row: 2,
                min_col: 1,
                max_row: 5,
                max_col: 4,
            }
        );
        assert!(bbox.contains(4, 3));
        assert!(!bbox.contains(5, 3));
        assert!(!bbox.contains(2, 4));
    }

    // Tests pixel counts, vanished ids and boxes per region
    // Verified by counting vanished ids as empty boxes at the origin
    #[test]
    fn test_region_statistics() {
        let map = array![[0_u32, 0, 2], [0, 2, 2]];
        let pattern = ShatterPattern::new(map, 4).unwrap();

        assert_eq!((pattern.width(), pattern.height()), (3, 2));
        assert_eq!(pattern.pixel_counts(), vec![3, 0, 3, 0]);
        assert_eq!(pattern.vanished_pieces(), vec![1, 3]);

        let boxes = pattern.bounding_boxes();
        assert_eq!(boxes.len(), 4);
        assert_eq!(
            boxes[0],
            Some(BoundingBox {
                min_row: 0,
                min_col: 0,
                max_row: 2,
                max_col: 2,
            })
        );
        assert!(boxes[1].is_none());
        assert_eq!(
            boxes[2],
            Some(BoundingBox {
                min_row: 0,
                min_col: 1,
                max_row: 2,
                max_col: 3,
            })
        );
        assert_eq!(pattern.piece_at(1, 0), Some(0));
        assert_eq!(pattern.piece_at(2, 0), None);
    }

    // Tests ids outside the piece range are rejected
    // Verified by accepting ids equal to num_pieces
    #[test]
    fn test_out_of_range_id_rejected() {
        let map = array![[0_u32, 2]];
        assert!(matches!(
            ShatterPattern::new(map, 2),
            Err(ShatterError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        assert!(matches!(
            ShatterPattern::new(Array2::zeros((0, 3)), 1),
            Err(ShatterError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            ShatterPattern::new(Array2::zeros((2, 2)), 0),
            Err(ShatterError::InvalidPieceCount { num_pieces: 0 })
        ));
    }

    // Tests size checks report width before height
    // Verified by swapping the reported dimensions
    #[test]
    fn test_ensure_matches() {
        let pattern = ShatterPattern::new(Array2::zeros((2, 5)), 1).unwrap();

        assert!(pattern.ensure_matches(5, 2).is_ok());
        match pattern.ensure_matches(2, 5) {
            Err(ShatterError::PatternDimensionMismatch { pattern, image }) => {
                assert_eq!(pattern, (5, 2));
                assert_eq!(image, (2, 5));
            }
            other => panic!("expected PatternDimensionMismatch, got {other:?}"),
        }
    }
}

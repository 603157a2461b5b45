//! Tests for rotated blob copies

#[cfg(test)]
mod tests {
    use bitvec::prelude::bitvec;
    use ndarray::Array3;
    use shatterstack::convergence::blob::Blob;
    use shatterstack::convergence::tessellation::tessellate_blob;
    use shatterstack::math::Image;

    // Horizontal bar at row 1, columns 1..=3 of a 3 × 5 image
    fn bar() -> Blob {
        let mut mask = bitvec![0; 15];
        for col in 1..=3 {
            mask.set(5 + col, true);
        }
        Blob::new(0, mask, 5, vec![0.0]).unwrap()
    }

    fn ramp() -> Image {
        Array3::from_shape_fn((3, 5, 1), |(r, c, _)| (r * 5 + c) as f32 / 15.0)
    }

    // Tests the first copy is the blob itself
    // Verified by starting the angles at one step
    #[test]
    fn test_identity_copy() {
        let image = ramp();
        let copies = tessellate_blob(&bar(), &image, 1);

        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].angle_degrees, 0.0);
        assert_eq!(copies[0].pixels, vec![(1, 1), (1, 2), (1, 3)]);
        assert_eq!(copies[0].colors, vec![image[[1, 1, 0]], image[[1, 2, 0]], image[[1, 3, 0]]]);
    }

    // Tests a half turn about the centroid mirrors the bar
    // Verified by rotating about the image origin
    #[test]
    fn test_half_turn() {
        let image = ramp();
        let copies = tessellate_blob(&bar(), &image, 2);

        assert_eq!(copies[1].angle_degrees, 180.0);
        assert_eq!(copies[1].pixels, vec![(1, 1), (1, 2), (1, 3)]);
        assert_eq!(copies[1].colors, vec![image[[1, 3, 0]], image[[1, 2, 0]], image[[1, 1, 0]]]);
    }

    // Tests blending moves covered pixels by the ratio and leaves others alone
    // Verified by applying the ratio to the source colour
    #[test]
    fn test_blend_into() {
        let image = Image::zeros((3, 5, 1));
        let copies = tessellate_blob(&bar(), &image, 1);
        let mut canvas = Image::ones((3, 5, 1));

        copies[0].blend_into(&mut canvas, 0.6);

        assert!((canvas[[1, 2, 0]] - 0.4).abs() < 1e-6);
        assert_eq!(canvas[[0, 2, 0]], 1.0);
        assert_eq!(canvas[[1, 4, 0]], 1.0);
    }

    // Tests copies that rotate off the image lose those pixels
    // Verified by wrapping coordinates around the image
    #[test]
    fn test_quarter_turn_clipped() {
        let copies = tessellate_blob(&bar(), &ramp(), 4);

        // A vertical bar through (1, 2) spans rows 0..=2
        assert_eq!(copies[1].angle_degrees, 90.0);
        let mut pixels = copies[1].pixels.clone();
        pixels.sort_unstable();
        assert_eq!(pixels, vec![(0, 2), (1, 2), (2, 2)]);
        assert_eq!(copies[1].iter().count(), 3);
    }
}

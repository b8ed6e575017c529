use glam::{Mat4, Vec4};

use crate::render::TargetSize;

/// Maps normalized device coordinates onto the pixel rectangle of `size`.
///
/// x and y go from [-1, 1] to [0, width] and [0, height] (origin bottom-left), depth
/// from [-1, 1] to [0, 1]. An empty size gives a singular matrix.
pub fn viewport_matrix(size: TargetSize) -> Mat4 {
    let half_w = size.width as f32 * 0.5;
    let half_h = size.height as f32 * 0.5;
    Mat4::from_cols(
        Vec4::new(half_w, 0.0, 0.0, 0.0),
        Vec4::new(0.0, half_h, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 0.0),
        Vec4::new(half_w, half_h, 0.5, 1.0),
    )
}

/// Inverse of `m`, or `None` if `m` is singular or the result is not finite.
pub fn try_inverse(m: Mat4) -> Option<Mat4> {
    let det = m.determinant();
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let inverse = m.inverse();
    inverse.is_finite().then_some(inverse)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn viewport_maps_ndc_corners_to_pixels() {
        let m = viewport_matrix(TargetSize::new(800, 600));
        let bottom_left = m.transform_point3(Vec3::new(-1.0, -1.0, -1.0));
        let top_right = m.transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!(bottom_left.abs_diff_eq(Vec3::new(0.0, 0.0, 0.0), 1e-6));
        assert!(top_right.abs_diff_eq(Vec3::new(800.0, 600.0, 1.0), 1e-6));
    }

    #[test]
    fn empty_viewport_is_singular() {
        assert!(try_inverse(viewport_matrix(TargetSize::new(0, 600))).is_none());
    }

    #[test]
    fn inverse_of_regular_matrix() {
        let m = viewport_matrix(TargetSize::new(4, 2));
        let inverse = try_inverse(m).unwrap();
        assert!((m * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn non_finite_matrix_has_no_inverse() {
        let mut m = Mat4::IDENTITY;
        m.x_axis.x = f32::NAN;
        assert!(try_inverse(m).is_none());
    }
}

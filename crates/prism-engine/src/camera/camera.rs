use glam::{Mat4, Quat, Vec3};

use super::projection::Lens;

/// Source of the camera transform consumed by the render engine.
pub trait TransformProvider {
    /// Current composed transform.
    fn transform(&self) -> Mat4;

    /// Counter bumped on every change. Consumers compare it to skip redundant work.
    fn revision(&self) -> u64;
}

/// Lens plus object transform, with the composed matrix kept up to date.
///
/// Setters recompute the composed transform eagerly and bump [`revision`](Self::revision)
/// when a value actually changed.
#[derive(Debug, Clone)]
pub struct Camera {
    lens: Lens,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,

    transform: Mat4,
    revision: u64,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Lens::default())
    }
}

impl Camera {
    pub fn new(lens: Lens) -> Self {
        let mut camera = Self {
            lens,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            transform: Mat4::IDENTITY,
            revision: 0,
        };
        camera.transform = camera.compose();
        camera
    }

    #[inline]
    pub fn lens(&self) -> &Lens {
        &self.lens
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_lens(&mut self, lens: Lens) {
        if self.lens != lens {
            self.lens = lens;
            self.invalidate();
        }
    }

    /// Forwards to [`Lens::set_aspect`].
    pub fn set_aspect(&mut self, aspect: f32) {
        if self.lens.set_aspect(aspect) {
            self.invalidate();
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        if self.position != position {
            self.position = position;
            self.invalidate();
        }
    }

    /// Sets the rotation. Non-unit quaternions are normalized; a zero-length or
    /// non-finite one is rejected and `false` is returned.
    pub fn set_rotation(&mut self, rotation: Quat) -> bool {
        let length = rotation.length();
        if !length.is_finite() || length == 0.0 {
            return false;
        }
        let rotation = rotation / length;
        if self.rotation != rotation {
            self.rotation = rotation;
            self.invalidate();
        }
        true
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        if self.scale != scale {
            self.scale = scale;
            self.invalidate();
        }
    }

    fn invalidate(&mut self) {
        self.transform = self.compose();
        self.revision = self.revision.wrapping_add(1);
    }

    // Scale first, then rotation, then translation, then projection.
    fn compose(&self) -> Mat4 {
        self.lens.matrix()
            * Mat4::from_scale(self.scale)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_translation(self.position)
    }
}

impl TransformProvider for Camera {
    #[inline]
    fn transform(&self) -> Mat4 {
        self.transform
    }

    #[inline]
    fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::Vec4;

    use super::*;
    use crate::camera::{Projection, ProjectionKind};

    fn ortho_camera() -> Camera {
        Camera::new(Lens {
            projection: Projection::Orthographic {
                left: -10.0,
                right: 10.0,
                bottom: -10.0,
                top: 10.0,
            },
            near: -10.0,
            far: 10.0,
        })
    }

    #[test]
    fn default_camera_is_bare_projection() {
        let camera = Camera::default();
        assert_eq!(camera.transform(), Lens::default().matrix());
        assert_eq!(camera.revision(), 0);
    }

    #[test]
    fn composition_order_is_projection_scale_rotation_translation() {
        let mut camera = ortho_camera();
        camera.set_position(Vec3::new(1.0, 0.0, 0.0));
        camera.set_rotation(Quat::from_rotation_z(FRAC_PI_2));
        camera.set_scale(Vec3::new(2.0, 3.0, 1.0));

        let expected = camera.lens().matrix()
            * Mat4::from_scale(Vec3::new(2.0, 3.0, 1.0))
            * Mat4::from_quat(Quat::from_rotation_z(FRAC_PI_2))
            * Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        assert!(camera.transform().abs_diff_eq(expected, 1e-6));

        // Origin: translated to (1,0,0), rotated to (0,1,0), scaled to (0,3,0).
        let clip = camera.transform() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let projected = camera.lens().matrix() * Vec4::new(0.0, 3.0, 0.0, 1.0);
        assert!(clip.abs_diff_eq(projected, 1e-5));
    }

    #[test]
    fn setters_bump_revision_only_on_change() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::ZERO);
        camera.set_scale(Vec3::ONE);
        assert_eq!(camera.revision(), 0);

        camera.set_position(Vec3::X);
        camera.set_aspect(1.5);
        camera.set_lens(Lens {
            projection: Projection::with_kind(ProjectionKind::Frustum),
            ..Lens::default()
        });
        assert_eq!(camera.revision(), 3);
    }

    #[test]
    fn rotation_is_normalized() {
        let mut camera = Camera::default();
        assert!(camera.set_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 2.0)));
        assert!(camera.rotation().is_normalized());
        assert_eq!(camera.revision(), 0);
    }

    #[test]
    fn degenerate_rotation_is_rejected() {
        let mut camera = Camera::default();
        assert!(!camera.set_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)));
        assert!(!camera.set_rotation(Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0)));
        assert_eq!(camera.rotation(), Quat::IDENTITY);
    }

    #[test]
    fn zero_scale_makes_transform_singular() {
        let mut camera = Camera::default();
        camera.set_scale(Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(camera.transform().determinant(), 0.0);
    }
}

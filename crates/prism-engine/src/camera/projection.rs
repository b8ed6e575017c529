use glam::{Mat4, Vec4};

/// Projection selector without parameters.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProjectionKind {
    Perspective,
    Orthographic,
    Frustum,
}

/// Projection shape of a lens. Near/far planes live on [`Lens`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    /// Symmetric perspective; `fov_y_degrees` is the vertical field of view.
    Perspective { fov_y_degrees: f32, aspect: f32 },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
    },
    /// Off-axis perspective given by the near-plane rectangle.
    Frustum {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
    },
}

impl Projection {
    pub const DEFAULT_FOV_Y_DEGREES: f32 = 90.0;
    pub const DEFAULT_ASPECT: f32 = 1.0;
    pub const DEFAULT_HALF_EXTENT: f32 = 0.5;

    /// Projection of `kind` with default parameters.
    pub fn with_kind(kind: ProjectionKind) -> Self {
        let h = Self::DEFAULT_HALF_EXTENT;
        match kind {
            ProjectionKind::Perspective => Self::Perspective {
                fov_y_degrees: Self::DEFAULT_FOV_Y_DEGREES,
                aspect: Self::DEFAULT_ASPECT,
            },
            ProjectionKind::Orthographic => Self::Orthographic {
                left: -h,
                right: h,
                bottom: -h,
                top: h,
            },
            ProjectionKind::Frustum => Self::Frustum {
                left: -h,
                right: h,
                bottom: -h,
                top: h,
            },
        }
    }

    pub fn kind(&self) -> ProjectionKind {
        match self {
            Self::Perspective { .. } => ProjectionKind::Perspective,
            Self::Orthographic { .. } => ProjectionKind::Orthographic,
            Self::Frustum { .. } => ProjectionKind::Frustum,
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::with_kind(ProjectionKind::Perspective)
    }
}

/// Projection plus clip planes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Lens {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            projection: Projection::default(),
            near: 0.01,
            far: 100.0,
        }
    }
}

impl Lens {
    /// Projection matrix (OpenGL clip space).
    ///
    /// Degenerate parameters (zero-width bounds, `near == far`, zero aspect or field
    /// of view) yield the identity, leaving the camera usable instead of producing
    /// non-finite values.
    pub fn matrix(&self) -> Mat4 {
        let (near, far) = (self.near, self.far);
        if near == far {
            return Mat4::IDENTITY;
        }
        match self.projection {
            Projection::Perspective {
                fov_y_degrees,
                aspect,
            } => {
                let half = (fov_y_degrees * 0.5).to_radians();
                if aspect == 0.0 || half.sin() == 0.0 {
                    return Mat4::IDENTITY;
                }
                Mat4::perspective_rh_gl(fov_y_degrees.to_radians(), aspect, near, far)
            }
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
            } => {
                if left == right || bottom == top {
                    return Mat4::IDENTITY;
                }
                Mat4::orthographic_rh_gl(left, right, bottom, top, near, far)
            }
            Projection::Frustum {
                left,
                right,
                bottom,
                top,
            } => {
                if left == right || bottom == top {
                    return Mat4::IDENTITY;
                }
                frustum(left, right, bottom, top, near, far)
            }
        }
    }

    /// Updates the aspect ratio of a perspective lens. Other projections ignore it.
    ///
    /// Returns whether anything changed.
    pub fn set_aspect(&mut self, new_aspect: f32) -> bool {
        match &mut self.projection {
            Projection::Perspective { aspect, .. } if *aspect != new_aspect => {
                *aspect = new_aspect;
                true
            }
            _ => false,
        }
    }

    /// Vertical field of view in degrees, if the lens is a perspective one.
    pub fn fov_y_degrees(&self) -> Option<f32> {
        match self.projection {
            Projection::Perspective { fov_y_degrees, .. } => Some(fov_y_degrees),
            _ => None,
        }
    }
}

// glFrustum
fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 * near / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / height, 0.0, 0.0),
        Vec4::new(
            (right + left) / width,
            (top + bottom) / height,
            -(far + near) / depth,
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * near * far / depth, 0.0),
    )
}

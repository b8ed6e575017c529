//! Camera model.
//!
//! A camera is a lens (projection) plus an object transform (position, rotation,
//! scale). The only value consumers care about is the composed 4x4 transform; raw
//! fields are stored and the composed matrix is recomputed whenever one changes.
//!
//! Conventions: column vectors, right-to-left application, OpenGL clip space
//! (depth in [-1, 1]).

mod camera;
mod projection;
mod viewport;

pub use camera::{Camera, TransformProvider};
pub use projection::{Lens, Projection, ProjectionKind};
pub use viewport::{try_inverse, viewport_matrix};

//! Demo scene format: a flat array of spheres.
//!
//! Each sphere is four little-endian `f32`: center x, y, z and radius. Trailing bytes
//! that do not make a whole sphere are ignored.

use bytemuck::{Pod, Zeroable};

pub const SPHERE_BYTES: usize = 4 * std::mem::size_of::<f32>();

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Sphere {
    pub center: [f32; 3],
    pub radius: f32,
}

/// Decodes spheres from scene bytes.
///
/// Spheres with a non-finite component or a non-positive radius are dropped.
pub fn parse_spheres(bytes: &[u8]) -> Vec<Sphere> {
    let chunks = bytes.chunks_exact(SPHERE_BYTES);
    if !chunks.remainder().is_empty() {
        log::warn!(
            "scene has {} trailing bytes after {} spheres",
            chunks.remainder().len(),
            bytes.len() / SPHERE_BYTES
        );
    }
    chunks
        .map(|chunk| {
            let mut v = [0.0f32; 4];
            for (dst, src) in v.iter_mut().zip(chunk.chunks_exact(4)) {
                *dst = f32::from_le_bytes([src[0], src[1], src[2], src[3]]);
            }
            Sphere {
                center: [v[0], v[1], v[2]],
                radius: v[3],
            }
        })
        .filter(|s| s.center.iter().all(|c| c.is_finite()) && s.radius.is_finite() && s.radius > 0.0)
        .collect()
}

// Re-export glam for convenience
pub use glam::*;

// Lux math types
mod aabb;
mod interval;
pub mod warp;

pub use aabb::Aabb;
pub use interval::Interval;

/// Linear RGB color with double precision channels.
pub type Color = DVec3;

/// Index of the largest component of `v` (0=X, 1=Y, 2=Z).
#[inline]
pub fn max_dimension(v: DVec3) -> usize {
    if v.x > v.y && v.x > v.z {
        0
    } else if v.y > v.z {
        1
    } else {
        2
    }
}

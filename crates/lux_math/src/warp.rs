//! Mappings from the unit square `[0,1)^2` to disks, spheres and hemispheres.
//!
//! Hemisphere warps are expressed in a local frame whose pole is `+Z`;
//! [`Frame`] rotates them around an arbitrary normal.

use crate::{DVec2, DVec3};
use std::f64::consts::{FRAC_1_PI, PI};

/// Identity map onto the square. Kept for symmetry with the other warps.
#[inline]
pub fn uniform_square(s: f64, t: f64) -> DVec2 {
    DVec2::new(s, t)
}

/// Uniform point on the unit disk.
#[inline]
pub fn uniform_disk(s: f64, t: f64) -> DVec2 {
    let r = s.sqrt();
    let phi = 2.0 * PI * t;
    DVec2::new(r * phi.cos(), r * phi.sin())
}

#[inline]
pub fn uniform_disk_pdf() -> f64 {
    FRAC_1_PI
}

/// Uniform point on the side of the unit cylinder spanning `z` in `[-1, 1]`.
#[inline]
pub fn uniform_cylinder(s: f64, t: f64) -> DVec3 {
    let phi = 2.0 * PI * s;
    DVec3::new(phi.sin(), phi.cos(), 2.0 * t - 1.0)
}

/// Uniform direction on the unit sphere.
///
/// Samples the enclosing cylinder and projects radially (Archimedes).
#[inline]
pub fn uniform_sphere(s: f64, t: f64) -> DVec3 {
    let v = uniform_cylinder(s, t);
    let a = (1.0 - v.z * v.z).max(0.0).sqrt();
    DVec3::new(v.x * a, v.y * a, v.z)
}

#[inline]
pub fn uniform_sphere_pdf() -> f64 {
    1.0 / (4.0 * PI)
}

/// Uniform direction on the `+Z` hemisphere.
#[inline]
pub fn uniform_hemisphere(s: f64, t: f64) -> DVec3 {
    let phi = 2.0 * PI * s;
    let a = (1.0 - t * t).max(0.0).sqrt();
    DVec3::new(phi.sin() * a, phi.cos() * a, t)
}

#[inline]
pub fn uniform_hemisphere_pdf() -> f64 {
    1.0 / (2.0 * PI)
}

/// Cosine-weighted direction on the `+Z` hemisphere (Malley's method).
#[inline]
pub fn cosine_hemisphere(s: f64, t: f64) -> DVec3 {
    let d = uniform_disk(s, t);
    let z = (1.0 - d.x * d.x - d.y * d.y).max(0.0).sqrt();
    DVec3::new(d.x, d.y, z)
}

#[inline]
pub fn cosine_hemisphere_pdf(v: DVec3) -> f64 {
    FRAC_1_PI * v.z.abs()
}

/// Uniform point on the triangle `abc`.
#[inline]
pub fn uniform_triangle(a: DVec3, b: DVec3, c: DVec3, s: f64, t: f64) -> DVec3 {
    let sq = s.sqrt();
    (1.0 - sq) * a + sq * (1.0 - t) * b + sq * t * c
}

/// Orthonormal basis with `n` as its third axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub s: DVec3,
    pub t: DVec3,
    pub n: DVec3,
}

impl Frame {
    /// Build a frame around the unit vector `n`.
    pub fn from_normal(n: DVec3) -> Self {
        let (s, t) = n.any_orthonormal_pair();
        Self { s, t, n }
    }

    /// Map a local direction (pole `+Z`) into world space.
    #[inline]
    pub fn to_world(&self, v: DVec3) -> DVec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    /// Map a world-space direction into the local frame.
    #[inline]
    pub fn to_local(&self, v: DVec3) -> DVec3 {
        DVec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }
}

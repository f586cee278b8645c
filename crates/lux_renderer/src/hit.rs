//! Hittable trait and HitInfo for ray-object intersection.

use crate::Ray;
use lux_math::{Aabb, DVec2, DVec3};

/// Index of a shape in its owning [`Scene`](crate::Scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(pub usize);

/// Index of a surface shader in its owning [`Scene`](crate::Scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub usize);

/// Record of a ray-object intersection.
///
/// `shape` and `shader` are handles into the scene that produced the hit and
/// are only meaningful against that scene.
#[derive(Debug, Clone, PartialEq)]
pub struct HitInfo {
    /// Shape at the hit point
    pub shape: Option<ShapeId>,
    /// Surface shader at the hit point
    pub shader: Option<ShaderId>,
    /// Hit distance along the ray
    pub t: f64,
    /// Incident direction (unit, pointing towards the surface)
    pub incident: DVec3,
    /// Hit point
    pub p: DVec3,
    /// Origin of the ray that produced this hit
    pub origin: DVec3,
    /// Shading normal (unit)
    pub n: DVec3,
    /// Geometric normal (unit)
    pub ng: DVec3,
    /// Surface parameterisation (barycentrics for triangles)
    pub uv: DVec2,
    /// Texture coordinates
    pub st: DVec2,
    /// Index of the triangle hit, for meshes
    pub primitive: u32,
    pub dp_du: DVec3,
    pub dp_dv: DVec3,
    pub dn_du: DVec3,
    pub dn_dv: DVec3,
}

impl Default for HitInfo {
    fn default() -> Self {
        Self {
            shape: None,
            shader: None,
            t: 0.0,
            incident: DVec3::ZERO,
            p: DVec3::ZERO,
            origin: DVec3::ZERO,
            n: DVec3::Y,
            ng: DVec3::Y,
            uv: DVec2::ZERO,
            st: DVec2::ZERO,
            primitive: 0,
            dp_du: DVec3::ZERO,
            dp_dv: DVec3::ZERO,
            dn_du: DVec3::ZERO,
            dn_dv: DVec3::ZERO,
        }
    }
}

impl HitInfo {
    /// Shading normal flipped, if needed, to face against the incident
    /// direction.
    #[inline]
    pub fn facing_normal(&self) -> DVec3 {
        if self.n.dot(self.incident) > 0.0 {
            -self.n
        } else {
            self.n
        }
    }
}

/// Trait for objects that can be hit by rays.
///
/// `intersect` only records what it needs to identify the closest hit
/// (distance, primitive, geometric normal) and tightens `ray.t_max`.
/// `fill_hit_info` completes the record for the winning shape.
pub trait Hittable: Send + Sync {
    /// Test `ray` against this object within `[ray.t_min, ray.t_max]`.
    ///
    /// On a closer hit, updates `ray.hit`, tightens `ray.t_max` and returns
    /// true. A miss leaves the hit distance and `t_max` untouched.
    fn intersect(&self, ray: &mut Ray) -> bool;

    /// Populate the shading fields of `ray.hit` after this object won the
    /// closest-hit test.
    fn fill_hit_info(&self, ray: &mut Ray);

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_normal() {
        let mut hit = HitInfo {
            n: DVec3::Z,
            incident: -DVec3::Z,
            ..Default::default()
        };
        assert_eq!(hit.facing_normal(), DVec3::Z);

        hit.incident = DVec3::Z;
        assert_eq!(hit.facing_normal(), -DVec3::Z);
    }
}

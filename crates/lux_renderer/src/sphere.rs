//! Sphere primitive.

use crate::{hit::Hittable, Ray};
use lux_math::{Aabb, DVec2, DVec3};
use std::f64::consts::PI;

/// Offset subtracted from `t_max` after a sphere hit to avoid reporting the
/// same surface again.
const SELF_HIT_EPSILON: f64 = 1e-4;

/// A sphere primitive.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: DVec3,
    radius: f64,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere.
    pub fn new(center: DVec3, radius: f64) -> Self {
        let radius = radius.max(0.0);
        let rvec = DVec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            bbox,
        }
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Get the UV coordinates for a point on the unit sphere.
    fn get_sphere_uv(p: DVec3) -> DVec2 {
        // theta: angle down from +Z
        // phi: angle around Z axis from +X
        let theta = p.z.clamp(-1.0, 1.0).acos();
        let phi = p.y.atan2(p.x) + PI;

        DVec2::new(phi / (2.0 * PI), theta / PI)
    }
}

impl Hittable for Sphere {
    /// Geometric ray-sphere test.
    ///
    /// Takes the nearer root; if it lies before `t_min` (origin inside or
    /// past the front surface) the farther root is used instead.
    fn intersect(&self, ray: &mut Ray) -> bool {
        let oc = self.center - ray.origin;
        let r2 = self.radius * self.radius;

        // Distance along the ray to the point closest to the center
        let dk = oc.dot(ray.direction);
        let d2 = oc.length_squared() - dk * dk;
        if d2 > r2 {
            return false;
        }

        let f = (r2 - d2).sqrt();
        let mut t = dk - f;
        if t < ray.t_min {
            t = dk + f;
        }

        if t < ray.t_min || t > ray.t_max {
            return false;
        }

        ray.hit.t = t;
        self.fill_hit_info(ray);
        true
    }

    fn fill_hit_info(&self, ray: &mut Ray) {
        let t = ray.hit.t;
        let p = ray.at(t);
        let n = (p - self.center).normalize();

        ray.t_max = t - SELF_HIT_EPSILON;
        ray.hit.p = p;
        ray.hit.origin = ray.origin;
        ray.hit.incident = (p - ray.origin).normalize();
        ray.hit.n = n;
        ray.hit.ng = n;
        ray.hit.uv = Self::get_sphere_uv(n);
        ray.hit.st = ray.hit.uv;
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}

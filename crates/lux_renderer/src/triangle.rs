//! Ray-triangle intersection.
//!
//! Uses the Möller-Trumbore algorithm.

use lux_math::{DVec2, DVec3};

/// Result of a successful ray-triangle test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Distance along the ray
    pub t: f64,
    /// Barycentric coordinates of the hit relative to `v1` and `v2`
    pub uv: DVec2,
    /// Unnormalized geometric normal `(v1 - v0) x (v2 - v0)`
    pub ng: DVec3,
}

/// Determinants smaller than this are treated as a ray parallel to the plane.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Möller-Trumbore ray-triangle intersection within `[t_min, t_max]`.
#[inline]
pub fn intersect_triangle(
    origin: DVec3,
    direction: DVec3,
    v0: DVec3,
    v1: DVec3,
    v2: DVec3,
    t_min: f64,
    t_max: f64,
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < PARALLEL_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(h);

    // Check if intersection is outside triangle (u parameter)
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * direction.dot(q);

    // Check if intersection is outside triangle (v parameter)
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if !(t >= t_min && t <= t_max) {
        return None;
    }

    Some(TriangleHit {
        t,
        uv: DVec2::new(u, v),
        ng: edge1.cross(edge2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> [DVec3; 3] {
        // Triangle in XY plane at z=-1
        [
            DVec3::new(-1.0, -1.0, -1.0),
            DVec3::new(1.0, -1.0, -1.0),
            DVec3::new(0.0, 1.0, -1.0),
        ]
    }

    fn cast(origin: DVec3, direction: DVec3) -> Option<TriangleHit> {
        let [v0, v1, v2] = triangle();
        intersect_triangle(origin, direction, v0, v1, v2, 1e-6, f64::INFINITY)
    }

    #[test]
    fn test_triangle_hit_through_centroid() {
        let [v0, v1, v2] = triangle();
        let centroid = (v0 + v1 + v2) / 3.0;
        let origin = DVec3::new(centroid.x, centroid.y, 0.0);

        let hit = cast(origin, -DVec3::Z).expect("centroid ray must hit");
        assert!((hit.t - 1.0).abs() < 1e-12);
        assert!(hit.uv.x >= 0.0 && hit.uv.y >= 0.0);
        assert!(hit.uv.x + hit.uv.y <= 1.0);
        assert!((hit.uv.x - 1.0 / 3.0).abs() < 1e-12);
        assert!(hit.ng.normalize().abs_diff_eq(DVec3::Z, 1e-12));
    }

    #[test]
    fn test_triangle_miss_outside_edge() {
        // Just below the bottom edge y = -1
        assert!(cast(DVec3::new(0.0, -1.0 - 1e-6, 0.0), -DVec3::Z).is_none());
        // Just right of the edge from (1,-1) to (0,1) at y=0 (x = 0.5)
        assert!(cast(DVec3::new(0.5 + 1e-6, 0.0, 0.0), -DVec3::Z).is_none());
    }

    #[test]
    fn test_triangle_miss_pointing_away() {
        assert!(cast(DVec3::ZERO, DVec3::Z).is_none());
    }

    #[test]
    fn test_triangle_parallel_ray() {
        // In the plane of the triangle and parallel to it
        assert!(cast(DVec3::new(-5.0, 0.0, -1.0), DVec3::X).is_none());
        assert!(cast(DVec3::new(-5.0, 0.0, 0.0), DVec3::X).is_none());
    }

    #[test]
    fn test_triangle_respects_interval() {
        let [v0, v1, v2] = triangle();
        assert!(intersect_triangle(DVec3::ZERO, -DVec3::Z, v0, v1, v2, 1e-6, 0.5).is_none());
        assert!(intersect_triangle(DVec3::ZERO, -DVec3::Z, v0, v1, v2, 1.5, 10.0).is_none());
    }
}

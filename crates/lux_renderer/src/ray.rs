//! Ray type for photon tracing and rendering.
//!
//! A ray carries its valid parametric interval and the record of the closest
//! hit found so far. Intersection routines tighten `t_max` as they accept
//! hits, so later tests only consider closer surfaces.

use crate::hit::HitInfo;
use lux_math::{DVec3, Interval};

/// Default lower bound of the hit interval.
pub const RAY_T_MIN: f64 = 1e-6;

/// A ray with origin, unit direction, hit interval and hit record.
#[derive(Debug, Clone)]
pub struct Ray {
    /// Origin point of the ray
    pub origin: DVec3,
    /// Unit direction vector
    pub direction: DVec3,
    /// Smallest accepted hit distance
    pub t_min: f64,
    /// Largest accepted hit distance, tightened by every accepted hit
    pub t_max: f64,
    /// Closest hit found so far
    pub hit: HitInfo,
}

impl Ray {
    /// Create a new ray. `direction` is normalized.
    #[inline]
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            t_min: RAY_T_MIN,
            t_max: f64::INFINITY,
            hit: HitInfo::default(),
        }
    }

    /// Create a ray restricted to `[t_min, t_max]`.
    #[inline]
    pub fn with_interval(origin: DVec3, direction: DVec3, t_min: f64, t_max: f64) -> Self {
        Self {
            t_min,
            t_max,
            ..Self::new(origin, direction)
        }
    }

    /// Compute a point along the ray at parameter t.
    /// P(t) = origin + t * direction
    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + t * self.direction
    }

    /// The current hit interval.
    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.t_min, self.t_max)
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(DVec3::ZERO, DVec3::Z)
    }
}

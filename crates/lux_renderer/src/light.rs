//! Emitters used for direct lighting.

use std::f64::consts::PI;

use lux_core::Mesh;
use lux_math::{Color, DVec2, DVec3};

/// Scale `color` so its channels sum to one and multiply by `power`.
///
/// Photon sources spread their power over the channels this way; a black
/// source emits nothing.
pub fn normalized_flux(color: Color, power: f64) -> Color {
    let total = color.x + color.y + color.z;
    if total > 0.0 {
        color * (power / total)
    } else {
        Color::ZERO
    }
}

/// A rectangle emitting diffusely from the side its normal points to.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareArea {
    pub lower: DVec3,
    /// Full edge vectors from `lower`
    pub dx: DVec3,
    pub dy: DVec3,
    pub normal: DVec3,
    pub color: Color,
    pub power: f64,
}

impl SquareArea {
    /// A `width` x `height` rectangle spanned from `lower` along the
    /// directions `dx` and `dy`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lower: DVec3,
        dx: DVec3,
        dy: DVec3,
        width: f64,
        height: f64,
        normal: DVec3,
        color: Color,
        power: f64,
    ) -> Self {
        Self {
            lower,
            dx: dx.normalize_or_zero() * width,
            dy: dy.normalize_or_zero() * height,
            normal: normal.normalize_or_zero(),
            color,
            power,
        }
    }

    pub fn area(&self) -> f64 {
        self.dx.cross(self.dy).length()
    }

    /// Point at parametric coordinates `uv` in `[0,1]^2`.
    #[inline]
    pub fn point(&self, uv: DVec2) -> DVec3 {
        self.lower + uv.x * self.dx + uv.y * self.dy
    }

    /// Emitted radiance, constant over the surface.
    pub fn radiance(&self) -> Color {
        let area = self.area();
        if area > 0.0 {
            normalized_flux(self.color, self.power) / (PI * area)
        } else {
            Color::ZERO
        }
    }

    /// The visible quad.
    pub fn mesh(&self) -> Mesh {
        let [a, b, c, d] = [
            self.lower,
            self.lower + self.dx,
            self.lower + self.dx + self.dy,
            self.lower + self.dy,
        ];
        let mut mesh = Mesh::quad(a, b, c, d);
        if self.dx.cross(self.dy).dot(self.normal) < 0.0 {
            mesh.reverse_orientation();
        }
        mesh
    }
}

/// A point on a light as seen from a receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    pub position: DVec3,
    /// Unit direction from the receiver to `position`
    pub direction: DVec3,
    pub distance: f64,
    /// Irradiance at the receiver on a surface facing the light
    pub intensity: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    Point { position: DVec3, color: Color, power: f64 },
    SquareArea(SquareArea),
}

impl Light {
    pub fn is_area(&self) -> bool {
        matches!(self, Light::SquareArea(_))
    }

    /// Map a unit-square sample to a point on the light.
    pub fn warp(&self, sample: DVec2) -> DVec3 {
        match self {
            Light::Point { position, .. } => *position,
            Light::SquareArea(area) => area.point(sample),
        }
    }

    /// Incident light at `x` from the point of the light picked by `sample`.
    ///
    /// Returns `None` if `x` coincides with the light or lies behind an area
    /// light.
    pub fn sample(&self, x: DVec3, sample: DVec2) -> Option<LightSample> {
        let position = self.warp(sample);
        let d = position - x;
        let d2 = d.length_squared();
        if d2 <= 0.0 {
            return None;
        }
        let distance = d2.sqrt();
        let direction = d / distance;

        let intensity = match self {
            Light::Point { color, power, .. } => *color * (*power / (4.0 * PI * d2)),
            Light::SquareArea(area) => {
                let cos_light = -direction.dot(area.normal);
                if cos_light <= 0.0 {
                    return None;
                }
                area.radiance() * (cos_light * area.area() / d2)
            }
        };

        Some(LightSample {
            position,
            direction,
            distance,
            intensity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_area() -> SquareArea {
        SquareArea::new(
            DVec3::new(-0.5, -0.5, 2.0),
            DVec3::X,
            DVec3::Y,
            1.0,
            1.0,
            -DVec3::Z,
            Color::ONE,
            3.0,
        )
    }

    #[test]
    fn test_normalized_flux() {
        assert_eq!(normalized_flux(Color::ONE, 3.0), Color::ONE);
        assert_eq!(normalized_flux(Color::new(1.0, 0.0, 0.0), 5.0), Color::new(5.0, 0.0, 0.0));
        assert_eq!(normalized_flux(Color::ZERO, 5.0), Color::ZERO);
    }

    #[test]
    fn test_point_light_inverse_square() {
        let light = Light::Point {
            position: DVec3::new(0.0, 0.0, 2.0),
            color: Color::ONE,
            power: 4.0 * PI,
        };
        let s = light.sample(DVec3::ZERO, DVec2::ZERO).unwrap();
        assert!((s.intensity.x - 0.25).abs() < 1e-12);
        assert!((s.distance - 2.0).abs() < 1e-12);
        assert!(s.direction.abs_diff_eq(DVec3::Z, 1e-12));
        assert!(light.sample(DVec3::new(0.0, 0.0, 2.0), DVec2::ZERO).is_none());
    }

    #[test]
    fn test_area_light_one_sided() {
        let light = Light::SquareArea(unit_area());
        let below = light.sample(DVec3::ZERO, DVec2::splat(0.5)).unwrap();
        // radiance 1/pi, cos 1, area 1, distance 2
        assert!((below.intensity.x - 1.0 / (4.0 * PI)).abs() < 1e-12);
        assert!(light.sample(DVec3::new(0.0, 0.0, 4.0), DVec2::splat(0.5)).is_none());
    }

    #[test]
    fn test_area_light_mesh_faces_normal() {
        let area = unit_area();
        let mesh = area.mesh();
        assert_eq!(mesh.triangle_count(), 2);
        for i in 0..2 {
            assert!(mesh.face_normal(i).normalize().abs_diff_eq(-DVec3::Z, 1e-12));
        }
        assert!((area.area() - 1.0).abs() < 1e-12);
    }
}

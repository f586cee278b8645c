//! Emitters traced in the photon pass.

use lux_math::warp::{self, Frame};
use lux_math::{Color, DVec3};
use rand::seq::SliceRandom;
use rand::RngCore;

use crate::light::{normalized_flux, SquareArea};
use crate::sampling;

/// Offset along the emitter normal so area-light photons leave the quad.
const SURFACE_OFFSET: f64 = 1e-3;

/// A photon in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmittedPhoton {
    pub position: DVec3,
    pub power: Color,
    pub direction: DVec3,
    /// Reached its current segment through a mirror or dielectric before
    /// any diffuse bounce
    pub specular_bounce: bool,
    /// Has been diffusely reflected at least once
    pub indirect: bool,
}

impl EmittedPhoton {
    pub fn new(position: DVec3, power: Color, direction: DVec3) -> Self {
        Self {
            position,
            power,
            direction,
            specular_bounce: false,
            indirect: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhotonSource {
    /// Emits uniformly over the sphere of directions.
    IsotropicPoint {
        position: DVec3,
        color: Color,
        power: f64,
        photons: usize,
    },
    /// Emits from a rectangle with a cosine distribution around its normal.
    DiffuseSquareArea { area: SquareArea, photons: usize },
}

impl PhotonSource {
    /// Requested photon count. Area sources round it up to a perfect square.
    pub fn photon_count(&self) -> usize {
        match self {
            PhotonSource::IsotropicPoint { photons, .. } => *photons,
            PhotonSource::DiffuseSquareArea { photons, .. } => *photons,
        }
    }

    /// Channel-normalised total power.
    pub fn flux(&self) -> Color {
        match self {
            PhotonSource::IsotropicPoint { color, power, .. } => normalized_flux(*color, *power),
            PhotonSource::DiffuseSquareArea { area, .. } => normalized_flux(area.color, area.power),
        }
    }

    /// Append this source's photons to `out`. The total power of the
    /// appended photons equals [`PhotonSource::flux`].
    pub fn emit(&self, rng: &mut dyn RngCore, out: &mut Vec<EmittedPhoton>) {
        match self {
            PhotonSource::IsotropicPoint {
                position, photons, ..
            } => {
                let samples = sampling::random(*photons, rng);
                if samples.is_empty() {
                    return;
                }
                let power = self.flux() / samples.len() as f64;
                out.reserve(samples.len());
                out.extend(samples.iter().map(|s| {
                    EmittedPhoton::new(*position, power, warp::uniform_sphere(s.x, s.y))
                }));
            }
            PhotonSource::DiffuseSquareArea { area, photons } => {
                let positions = sampling::stratified_jittered(*photons, rng);
                let mut directions = sampling::stratified_jittered(*photons, rng);
                // Decorrelate position and direction strata
                directions.shuffle(rng);
                if positions.is_empty() {
                    return;
                }

                let power = self.flux() / positions.len() as f64;
                let frame = Frame::from_normal(area.normal);
                out.reserve(positions.len());
                out.extend(positions.iter().zip(&directions).map(|(uv, st)| {
                    let origin = area.point(*uv) + SURFACE_OFFSET * area.normal;
                    let direction = frame.to_world(warp::cosine_hemisphere(st.x, st.y));
                    EmittedPhoton::new(origin, power, direction)
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn total(photons: &[EmittedPhoton]) -> Color {
        photons.iter().map(|p| p.power).sum()
    }

    #[test]
    fn test_point_source_power_and_directions() {
        let source = PhotonSource::IsotropicPoint {
            position: DVec3::new(1.0, 2.0, 3.0),
            color: Color::new(1.0, 1.0, 2.0),
            power: 100.0,
            photons: 1000,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mut photons = Vec::new();
        source.emit(&mut rng, &mut photons);

        assert_eq!(photons.len(), 1000);
        assert!((total(&photons) - Color::new(25.0, 25.0, 50.0)).length() < 1e-9);

        let mean: DVec3 = photons.iter().map(|p| p.direction).sum::<DVec3>() / 1000.0;
        assert!(mean.length() < 0.1);
        for p in &photons {
            assert_eq!(p.position, DVec3::new(1.0, 2.0, 3.0));
            assert!((p.direction.length() - 1.0).abs() < 1e-9);
            assert!(!p.specular_bounce && !p.indirect);
        }
    }

    #[test]
    fn test_area_source_rounds_to_square() {
        let area = SquareArea::new(
            DVec3::ZERO,
            DVec3::X,
            DVec3::Y,
            2.0,
            1.0,
            -DVec3::Z,
            Color::ONE,
            30.0,
        );
        let source = PhotonSource::DiffuseSquareArea { area, photons: 10 };
        let mut rng = StdRng::seed_from_u64(4);
        let mut photons = Vec::new();
        source.emit(&mut rng, &mut photons);

        // 10 rounds up to 16 and the power is shared over all of them
        assert_eq!(photons.len(), 16);
        assert!((total(&photons) - Color::splat(10.0)).length() < 1e-9);
        for p in &photons {
            assert!(p.direction.z < 0.0);
            assert!(p.position.z < 0.0);
            assert!(p.position.x >= 0.0 && p.position.x <= 2.0);
            assert!(p.position.y >= 0.0 && p.position.y <= 1.0);
        }
    }

    #[test]
    fn test_zero_photons_emits_nothing() {
        let source = PhotonSource::IsotropicPoint {
            position: DVec3::ZERO,
            color: Color::ONE,
            power: 1.0,
            photons: 0,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut photons = Vec::new();
        source.emit(&mut rng, &mut photons);
        assert!(photons.is_empty());
    }
}

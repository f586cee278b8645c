//! Surface shaders.
//!
//! Each shader answers two questions about a surface hit: what radiance
//! leaves it towards the camera ray ([`SurfaceShader::shade`]) and what
//! happens to a photon landing on it ([`SurfaceShader::process_photon`]).

use std::f64::consts::{FRAC_1_PI, PI};

use lux_math::warp::{self, Frame};
use lux_math::{Color, DVec2, DVec3};
use rand::RngCore;

use crate::hit::{HitInfo, Hittable};
use crate::integrator::Integrator;
use crate::photon_pass::PhotonPass;
use crate::photon_source::EmittedPhoton;
use crate::scene::Scene;
use crate::{gen_f64, Ray};

/// Offset applied along the normal to secondary ray origins.
pub const SURFACE_OFFSET: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceShader {
    /// Ideal diffuse reflector with albedo `kd`. Photons are absorbed with
    /// probability `absorption`.
    Lambert { kd: Color, absorption: f64 },
    /// Perfect mirror. Photons are absorbed with probability `absorption`.
    SpecularMirror { absorption: f64 },
    /// Smooth interface between vacuum and a medium of index `ior`.
    SpecularDielectric { ior: f64 },
    /// Black, and swallows photons. Used for the visible quad of area lights.
    Empty,
}

impl SurfaceShader {
    /// Outgoing radiance at `hit` along the reversed incident direction.
    ///
    /// With `gather` set a Lambert surface samples the hemisphere and adds
    /// direct light and caustics; otherwise it only looks up the global
    /// photon map. Specular shaders pass `gather` on unchanged.
    pub fn shade(
        &self,
        integrator: &Integrator,
        hit: &HitInfo,
        rng: &mut dyn RngCore,
        depth: u32,
        gather: bool,
    ) -> Color {
        match self {
            SurfaceShader::Lambert { kd, .. } => {
                shade_lambert(*kd, integrator, hit, rng, depth, gather)
            }
            SurfaceShader::SpecularMirror { .. } => {
                let n = hit.facing_normal();
                let reflected = Ray::new(hit.p + SURFACE_OFFSET * n, reflect(hit.incident, n));
                integrator.recursive_render(reflected, rng, depth + 1, gather)
            }
            SurfaceShader::SpecularDielectric { ior } => {
                let n = hit.facing_normal();
                let r = dielectric_reflectance(hit, *ior);

                let mut color = Color::ZERO;
                if r > 0.0 {
                    let reflected = Ray::new(hit.p + SURFACE_OFFSET * n, reflect(hit.incident, n));
                    color += r * integrator.recursive_render(reflected, rng, depth + 1, gather);
                }
                if r < 1.0 {
                    if let Some(refracted) = transmit(integrator.scene(), hit, *ior) {
                        color += (1.0 - r)
                            * integrator.recursive_render(refracted, rng, depth + 1, gather);
                    }
                }
                color
            }
            SurfaceShader::Empty => Color::ZERO,
        }
    }

    /// Decide the fate of `photon` arriving at `hit`: store it, absorb it,
    /// or send it on through `pass`.
    pub fn process_photon(
        &self,
        pass: &mut PhotonPass,
        hit: &HitInfo,
        mut photon: EmittedPhoton,
        rng: &mut dyn RngCore,
        depth: u32,
    ) {
        match self {
            SurfaceShader::Lambert { kd, absorption } => {
                pass.store(&photon, hit);

                let survival = 1.0 - absorption;
                if survival <= 0.0 || gen_f64(rng) >= survival {
                    return;
                }

                let n = hit.facing_normal();
                let local = warp::cosine_hemisphere(gen_f64(rng), gen_f64(rng));
                photon.direction = Frame::from_normal(n).to_world(local);
                photon.position = hit.p + SURFACE_OFFSET * n;
                photon.power *= *kd / survival;
                photon.indirect = true;
                photon.specular_bounce = false;
                pass.scatter(photon, rng, depth + 1);
            }
            SurfaceShader::SpecularMirror { absorption } => {
                if gen_f64(rng) < *absorption {
                    return;
                }
                let n = hit.facing_normal();
                photon.direction = reflect(hit.incident, n);
                photon.position = hit.p + SURFACE_OFFSET * n;
                if !photon.indirect {
                    photon.specular_bounce = true;
                }
                pass.scatter(photon, rng, depth + 1);
            }
            SurfaceShader::SpecularDielectric { ior } => {
                if !photon.indirect {
                    photon.specular_bounce = true;
                }

                if gen_f64(rng) < dielectric_reflectance(hit, *ior) {
                    let n = hit.facing_normal();
                    photon.direction = reflect(hit.incident, n);
                    photon.position = hit.p + SURFACE_OFFSET * n;
                } else {
                    // Total internal reflection at the exit drops the photon
                    let Some(ray) = transmit(pass.scene(), hit, *ior) else {
                        return;
                    };
                    photon.direction = ray.direction;
                    photon.position = ray.origin;
                }
                pass.scatter(photon, rng, depth + 1);
            }
            SurfaceShader::Empty => {}
        }
    }
}

fn shade_lambert(
    kd: Color,
    integrator: &Integrator,
    hit: &HitInfo,
    rng: &mut dyn RngCore,
    depth: u32,
    gather: bool,
) -> Color {
    let scene = integrator.scene();
    let maps = integrator.maps();
    let settings = &scene.settings;
    let n = hit.facing_normal();

    if !gather {
        let irradiance =
            maps.global
                .irradiance_estimate(hit.p, n, settings.search_radius, settings.estimate_photons);
        return kd * FRAC_1_PI * irradiance;
    }

    let mut irradiance = direct_irradiance(scene, hit.p, n, rng);

    // Cosine-weighted directions: the cosine cancels against the pdf
    let samples = scene.generate_stratified_jittered_samples(settings.mc_samples, rng);
    if !samples.is_empty() {
        let frame = Frame::from_normal(n);
        let origin = hit.p + SURFACE_OFFSET * n;
        let mut radiance = Color::ZERO;
        for s in &samples {
            let direction = frame.to_world(warp::cosine_hemisphere(s.x, s.y));
            let ray = Ray::new(origin, direction);
            radiance += integrator.recursive_render(ray, rng, depth + 1, false);
        }
        irradiance += radiance * (PI / samples.len() as f64);
    }

    irradiance += maps
        .caustic
        .irradiance_estimate(hit.p, n, settings.search_radius, settings.estimate_photons);

    kd * FRAC_1_PI * irradiance
}

/// Irradiance at `p` on a surface with normal `n` from every light in the
/// scene, with shadow rays.
pub fn direct_irradiance(scene: &Scene, p: DVec3, n: DVec3, rng: &mut dyn RngCore) -> Color {
    let mut irradiance = Color::ZERO;

    for light in scene.lights() {
        if light.is_area() {
            let samples =
                scene.generate_stratified_jittered_samples(scene.settings.mc_samples, rng);
            if samples.is_empty() {
                continue;
            }
            let mut sum = Color::ZERO;
            for s in &samples {
                let Some(ls) = light.sample(p, *s) else {
                    continue;
                };
                let cos = ls.direction.dot(n);
                if cos > 0.0 && scene.area_light_visible(p, &ls) {
                    sum += ls.intensity * cos;
                }
            }
            irradiance += sum / samples.len() as f64;
        } else if let Some(ls) = light.sample(p, DVec2::ZERO) {
            let cos = ls.direction.dot(n);
            if cos > 0.0 && scene.point_visible(p, &ls) {
                irradiance += ls.intensity * cos;
            }
        }
    }

    irradiance
}

/// Fresnel reflectance for `hit` on an interface between vacuum and `ior`,
/// from whichever side the ray arrives.
fn dielectric_reflectance(hit: &HitInfo, ior: f64) -> f64 {
    let cos_i = -hit.incident.dot(hit.facing_normal());
    if entering(hit) {
        fresnel_dielectric(cos_i, 1.0, ior)
    } else {
        fresnel_dielectric(cos_i, ior, 1.0)
    }
}

#[inline]
fn entering(hit: &HitInfo) -> bool {
    hit.n.dot(hit.incident) < 0.0
}

/// The ray leaving a dielectric shape after refracting at `hit`.
///
/// Entering rays are followed through the shape to the far side and
/// refracted out again. Returns `None` on total internal reflection.
fn transmit(scene: &Scene, hit: &HitInfo, ior: f64) -> Option<Ray> {
    let n = hit.facing_normal();

    if !entering(hit) {
        let direction = refract(hit.incident, n, ior)?;
        return Some(Ray::new(hit.p - SURFACE_OFFSET * n, direction));
    }

    let inside = refract(hit.incident, n, 1.0 / ior)?;
    let mut ray = Ray::new(hit.p - SURFACE_OFFSET * n, inside);
    let Some(shape) = hit.shape.map(|id| scene.shape(id)) else {
        return Some(ray);
    };

    if !shape.intersect(&mut ray) {
        // Open surface: nothing to leave through
        return Some(Ray::new(ray.origin, inside));
    }
    shape.fill_hit_info(&mut ray);

    let exit_n = ray.hit.facing_normal();
    let direction = refract(inside, exit_n, ior)?;
    Some(Ray::new(ray.hit.p - SURFACE_OFFSET * exit_n, direction))
}

/// Mirror `d` about the plane with normal `n`.
#[inline]
pub fn reflect(d: DVec3, n: DVec3) -> DVec3 {
    d - 2.0 * d.dot(n) * n
}

/// Refract the unit direction `d` through a surface whose unit normal `n`
/// faces against it, with `eta` the ratio of the incident index to the
/// transmitted index. `None` on total internal reflection.
#[inline]
pub fn refract(d: DVec3, n: DVec3, eta: f64) -> Option<DVec3> {
    let cos_i = (-d.dot(n)).min(1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some((eta * d + (eta * cos_i - cos_t) * n).normalize())
}

/// Unpolarised Fresnel reflectance going from index `eta_i` to `eta_t` at
/// incidence cosine `cos_i`. Total internal reflection gives 1.
pub fn fresnel_dielectric(cos_i: f64, eta_i: f64, eta_t: f64) -> f64 {
    let cos_i = cos_i.clamp(0.0, 1.0);
    let eta = eta_i / eta_t;
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin2_t).sqrt();

    let rs = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    let rp = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    0.5 * (rs * rs + rp * rp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect() {
        let d = DVec3::new(1.0, 0.0, -1.0).normalize();
        let r = reflect(d, DVec3::Z);
        assert!(r.abs_diff_eq(DVec3::new(1.0, 0.0, 1.0).normalize(), 1e-12));
    }

    #[test]
    fn test_refract_snell() {
        let d = DVec3::new(1.0, 0.0, -1.0).normalize();
        let t = refract(d, DVec3::Z, 1.0 / 1.5).unwrap();
        let sin_i = d.x;
        let sin_t = t.x;
        assert!((sin_i - 1.5 * sin_t).abs() < 1e-12);
        assert!(t.z < 0.0);

        // Straight through at normal incidence
        assert!(refract(-DVec3::Z, DVec3::Z, 0.5).unwrap().abs_diff_eq(-DVec3::Z, 1e-12));
    }

    #[test]
    fn test_total_internal_reflection() {
        let grazing = DVec3::new(1.0, 0.0, -0.2).normalize();
        assert!(refract(grazing, DVec3::Z, 1.5).is_none());
        assert_eq!(fresnel_dielectric(0.2, 1.5, 1.0), 1.0);
    }

    #[test]
    fn test_fresnel_normal_incidence() {
        // ((1 - 1.5) / (1 + 1.5))^2
        assert!((fresnel_dielectric(1.0, 1.0, 1.5) - 0.04).abs() < 1e-12);
        assert!((fresnel_dielectric(1.0, 1.5, 1.0) - 0.04).abs() < 1e-12);
        assert!((fresnel_dielectric(0.0, 1.0, 1.5) - 1.0).abs() < 1e-12);
        assert_eq!(fresnel_dielectric(0.7, 1.0, 1.0), 0.0);
    }
}

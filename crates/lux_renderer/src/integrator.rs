//! Recursive radiance integrator.
//!
//! Camera rays are traced to the first surface. Fog boxes crossed on the
//! way are ray marched, then the surface's shader is evaluated; specular
//! and gathering shaders recurse back into [`Integrator::recursive_render`].

use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};

use lux_math::{Color, DVec2, DVec3, Interval};
use rand::RngCore;

use crate::hit::ShapeId;
use crate::photon_map::PhotonMaps;
use crate::renderer::RenderConfig;
use crate::scene::{FogBox, Scene};
use crate::{gen_f64, Ray};

const ISOTROPIC_PHASE: f64 = 1.0 / (4.0 * PI);

/// Renders rays against a scene and its photon maps. Shared by every render
/// worker; all randomness comes from the generator passed in.
pub struct Integrator<'a> {
    scene: &'a Scene,
    maps: &'a PhotonMaps,
    config: &'a RenderConfig,
    depth_cutoffs: AtomicUsize,
    march_cutoffs: AtomicUsize,
}

impl<'a> Integrator<'a> {
    pub fn new(scene: &'a Scene, maps: &'a PhotonMaps, config: &'a RenderConfig) -> Self {
        Self {
            scene,
            maps,
            config,
            depth_cutoffs: AtomicUsize::new(0),
            march_cutoffs: AtomicUsize::new(0),
        }
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn maps(&self) -> &'a PhotonMaps {
        self.maps
    }

    pub fn config(&self) -> &'a RenderConfig {
        self.config
    }

    /// Rays terminated at the recursion limit so far.
    pub fn depth_cutoffs(&self) -> usize {
        self.depth_cutoffs.load(Ordering::Relaxed)
    }

    /// Fog intervals cut short at the march step limit so far.
    pub fn march_cutoffs(&self) -> usize {
        self.march_cutoffs.load(Ordering::Relaxed)
    }

    /// Radiance arriving at the origin of `ray`.
    ///
    /// Beyond the configured maximum depth the ray contributes black.
    pub fn recursive_render(
        &self,
        mut ray: Ray,
        rng: &mut dyn RngCore,
        depth: u32,
        gather: bool,
    ) -> Color {
        if depth > self.config.max_depth {
            self.depth_cutoffs.fetch_add(1, Ordering::Relaxed);
            return Color::ZERO;
        }

        let far = ray.t_max;
        let hit = self.scene.intersect(&mut ray);
        let surface_t = if hit.is_some() { ray.hit.t } else { far };

        let mut radiance = Color::ZERO;
        let mut transmittance = 1.0;
        let mut t = ray.t_min;
        for _ in 0..self.scene.fog().len() {
            let Some((fog, span)) = self.next_fog(&ray, t, surface_t) else {
                break;
            };
            let (scattered, fog_transmittance) = self.ray_march(&ray, fog, span, rng);
            radiance += transmittance * scattered;
            transmittance *= fog_transmittance;
            t = span.max;
        }

        let surface = match hit {
            Some(id) => self.shade(&ray, id, rng, depth, gather),
            None => Color::ZERO,
        };
        radiance + transmittance * surface
    }

    fn shade(
        &self,
        ray: &Ray,
        id: ShapeId,
        rng: &mut dyn RngCore,
        depth: u32,
        gather: bool,
    ) -> Color {
        let shape = self.scene.shape(id);

        // Emitters are seen directly by camera rays only; every other path
        // already accounts for them through direct lighting
        if shape.area_light && depth == 0 {
            return if ray.hit.ng.dot(ray.direction) < 0.0 {
                shape.emission
            } else {
                Color::ZERO
            };
        }

        match ray.hit.shader {
            Some(shader) => self
                .scene
                .shader(shader)
                .shade(self, &ray.hit, rng, depth, gather),
            None => Color::ZERO,
        }
    }

    /// The fog box entered first along `ray` within `[t, end]`.
    fn next_fog(&self, ray: &Ray, t: f64, end: f64) -> Option<(&'a FogBox, Interval)> {
        let scene = self.scene;
        scene
            .fog()
            .iter()
            .filter_map(|fog| fog.clip(ray, t, end).map(|span| (fog, span)))
            .min_by(|a, b| a.1.min.total_cmp(&b.1.min))
    }

    /// March `span` of `ray` through `fog` in steps of `sigma_s * U(0, 1)`.
    ///
    /// Returns the in-scattered radiance reaching the ray origin from the
    /// interval and the transmittance across it. Fog that does not scatter
    /// only attenuates.
    pub fn ray_march(
        &self,
        ray: &Ray,
        fog: &FogBox,
        span: Interval,
        rng: &mut dyn RngCore,
    ) -> (Color, f64) {
        let sigma_t = fog.sigma_t();
        if fog.sigma_s <= 0.0 {
            return (Color::ZERO, (-sigma_t * span.size()).exp());
        }

        let mut radiance = Color::ZERO;
        let mut transmittance = 1.0;
        let mut t = span.min;
        let mut steps = 0u32;

        loop {
            let dx = fog.sigma_s * gen_f64(rng);
            if t + dx >= span.max {
                break;
            }
            if steps >= self.config.max_march_steps {
                self.march_cutoffs.fetch_add(1, Ordering::Relaxed);
                break;
            }

            t += dx;
            steps += 1;
            transmittance *= (-sigma_t * dx).exp();
            radiance += transmittance * dx * self.in_scattered(ray.at(t), fog, rng);
        }

        transmittance *= (-sigma_t * (span.max - t)).exp();
        (radiance, transmittance)
    }

    /// Radiance scattered towards the eye per unit length at `x`.
    fn in_scattered(&self, x: DVec3, fog: &FogBox, rng: &mut dyn RngCore) -> Color {
        let mut incident = Color::ZERO;
        for light in self.scene.lights() {
            if light.is_area() {
                let sample = DVec2::new(gen_f64(rng), gen_f64(rng));
                if let Some(ls) = light.sample(x, sample) {
                    if self.scene.area_light_visible(x, &ls) {
                        incident += ls.intensity;
                    }
                }
            } else if let Some(ls) = light.sample(x, DVec2::ZERO) {
                if self.scene.point_visible(x, &ls) {
                    incident += ls.intensity;
                }
            }
        }

        let mut radiance = incident * (fog.sigma_s * ISOTROPIC_PHASE);
        if let Some(volume) = &self.maps.volume {
            radiance += volume.density_estimate(x) * ISOTROPIC_PHASE;
        }
        radiance
    }
}

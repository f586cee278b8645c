//! The photon pass: emission, scattering and storage.
//!
//! Every photon source emits its photons, each photon is traced through the
//! scene and handed to the shader it lands on, and the resulting maps are
//! balanced. The pass runs serially on one seeded generator so it is
//! reproducible.

use lux_math::Aabb;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::hit::HitInfo;
use crate::octree::{Octree, VolumetricPhoton, DEFAULT_MAX_DEPTH};
use crate::photon_map::PhotonMaps;
use crate::photon_source::EmittedPhoton;
use crate::renderer::RenderConfig;
use crate::scene::{FogBox, Scene};
use crate::{gen_f64, Ray};

/// Offset along the photon direction for the scattering ray origin.
const EMIT_OFFSET: f64 = 1e-3;

/// Counters gathered while tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotonPassStats {
    pub emitted: usize,
    /// Scattering rays that left the scene
    pub escaped: usize,
    /// Photons dropped on a shape without a shader
    pub unshaded: usize,
    /// Photons dropped at the bounce limit
    pub cutoffs: usize,
    pub volumetric: usize,
}

/// State of one photon pass over a scene.
pub struct PhotonPass<'a> {
    scene: &'a Scene,
    maps: PhotonMaps,
    max_bounces: u32,
    stats: PhotonPassStats,
}

impl<'a> PhotonPass<'a> {
    pub fn new(scene: &'a Scene, config: &RenderConfig) -> Self {
        let volume = if config.volumetric_photons {
            fog_bounds(scene.fog()).map(|bounds| Octree::new(bounds, DEFAULT_MAX_DEPTH))
        } else {
            None
        };

        Self {
            scene,
            maps: PhotonMaps {
                volume,
                ..Default::default()
            },
            max_bounces: config.max_photon_bounces,
            stats: PhotonPassStats::default(),
        }
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn stats(&self) -> PhotonPassStats {
        self.stats
    }

    /// The maps built so far, unbalanced.
    pub fn maps(&self) -> &PhotonMaps {
        &self.maps
    }

    /// Emit and trace the photons of every source, then balance the maps.
    pub fn run(mut self, seed: u64) -> PhotonMaps {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut emitted = Vec::new();
        for source in self.scene.photon_sources() {
            source.emit(&mut rng, &mut emitted);
        }
        self.stats.emitted = emitted.len();
        log::info!(
            "Tracing {} photons from {} sources",
            emitted.len(),
            self.scene.photon_sources().len()
        );

        for photon in emitted {
            self.scatter(photon, &mut rng, 0);
        }

        self.maps.balance();

        let stats = self.stats;
        log::info!(
            "Photon pass: {} global, {} caustic, {} volumetric photons stored",
            self.maps.global.len(),
            self.maps.caustic.len(),
            stats.volumetric
        );
        log::debug!(
            "Photon pass: {} escaped, {} hit unshaded shapes",
            stats.escaped,
            stats.unshaded
        );
        if stats.cutoffs > 0 {
            log::warn!(
                "{} photons dropped at the bounce limit of {}",
                stats.cutoffs,
                self.max_bounces
            );
        }

        self.maps
    }

    /// Trace `photon` to the next surface and let its shader process it.
    pub fn scatter(&mut self, mut photon: EmittedPhoton, rng: &mut dyn RngCore, depth: u32) {
        if depth > self.max_bounces {
            self.stats.cutoffs += 1;
            return;
        }

        let origin = photon.position + EMIT_OFFSET * photon.direction;
        let mut ray = Ray::new(origin, photon.direction);
        let hit = self.scene.intersect(&mut ray);

        if !self.scene.fog().is_empty() {
            let end = if hit.is_some() { ray.hit.t } else { f64::INFINITY };
            if self.maps.volume.is_some() && (photon.indirect || photon.specular_bounce) {
                self.deposit_volumetric(&photon, &ray, end, rng);
            }
            photon.power *= fog_transmittance(self.scene.fog(), &ray, end);
        }

        let Some(shape_id) = hit else {
            self.stats.escaped += 1;
            return;
        };
        let scene = self.scene;
        let Some(shader_id) = scene.shape(shape_id).shader else {
            self.stats.unshaded += 1;
            return;
        };

        let shader = scene.shader(shader_id);
        shader.process_photon(self, &ray.hit, photon, rng, depth);
    }

    /// Record a photon landing on a diffuse surface.
    pub fn store(&mut self, photon: &EmittedPhoton, hit: &HitInfo) {
        self.maps.global.store(photon.power, hit.p, hit.incident);
        if photon.specular_bounce {
            self.maps.caustic.store(photon.power, hit.p, hit.incident);
        }
    }

    /// Sample a scattering event in each fog box the segment `[t_min, end]`
    /// crosses and deposit the scattered share of the photon's power there.
    fn deposit_volumetric(
        &mut self,
        photon: &EmittedPhoton,
        ray: &Ray,
        end: f64,
        rng: &mut dyn RngCore,
    ) {
        let radius = self.scene.settings.volumetric_radius;
        let scene = self.scene;

        for fog in scene.fog() {
            let Some(span) = fog.clip(ray, ray.t_min, end) else {
                continue;
            };
            let sigma_t = fog.sigma_t();
            if sigma_t <= 0.0 {
                continue;
            }

            let distance = -(1.0 - gen_f64(rng)).ln() / sigma_t;
            if distance >= span.size() {
                continue;
            }

            let volumetric = VolumetricPhoton {
                position: ray.at(span.min + distance),
                power: photon.power * (fog.sigma_s / sigma_t),
                radius,
            };
            if let Some(octree) = &mut self.maps.volume {
                if octree.add(volumetric) {
                    self.stats.volumetric += 1;
                }
            }
        }
    }
}

/// Fraction of power surviving the fog along `ray` up to `end`.
fn fog_transmittance(fog: &[FogBox], ray: &Ray, end: f64) -> f64 {
    let optical_depth: f64 = fog
        .iter()
        .filter_map(|f| f.clip(ray, ray.t_min, end).map(|span| f.sigma_t() * span.size()))
        .sum();
    (-optical_depth).exp()
}

/// Union of the fog volumes, `None` without fog.
fn fog_bounds(fog: &[FogBox]) -> Option<Aabb> {
    let mut boxes = fog.iter().map(|f| f.bounds);
    let first = boxes.next()?;
    Some(boxes.fold(first, |acc, b| Aabb::surrounding(&acc, &b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::SurfaceShader;
    use crate::shape::Shape;
    use crate::sphere::Sphere;
    use lux_math::{Color, DVec3};

    fn enclosed_light(shader: SurfaceShader, photons: usize) -> Scene {
        let mut scene = Scene::default();
        let id = scene.add_shader(shader);
        scene.add_shape(Shape::sphere(Sphere::new(DVec3::ZERO, 5.0), Some(id)));
        scene.add_isotropic_point_light(DVec3::ZERO, Color::ONE, 300.0, photons);
        scene
    }

    #[test]
    fn test_absorbing_enclosure_stores_all_power() {
        let scene = enclosed_light(
            SurfaceShader::Lambert {
                kd: Color::splat(0.8),
                absorption: 1.0,
            },
            1000,
        );
        let pass = PhotonPass::new(&scene, &RenderConfig::default());
        let maps = pass.run(11);

        assert_eq!(maps.global.len(), 1000);
        assert!(maps.caustic.is_empty());
        let total = maps.global.total_power();
        assert!((total.x + total.y + total.z - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounces_are_capped() {
        let scene = enclosed_light(SurfaceShader::SpecularMirror { absorption: 0.0 }, 10);
        let config = RenderConfig {
            max_photon_bounces: 5,
            ..Default::default()
        };
        let mut pass = PhotonPass::new(&scene, &config);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10 {
            let photon = EmittedPhoton::new(DVec3::ZERO, Color::ONE, DVec3::Z);
            pass.scatter(photon, &mut rng, 0);
        }

        let stats = pass.stats();
        assert_eq!(stats.cutoffs, 10);
        assert_eq!(stats.escaped, 0);
        assert!(pass.maps().global.is_empty());
    }

    #[test]
    fn test_mirror_then_diffuse_is_caustic() {
        // A mirror floor under a diffuse ceiling
        let mut scene = Scene::default();
        let mirror = scene.add_shader(SurfaceShader::SpecularMirror { absorption: 0.0 });
        let diffuse = scene.add_shader(SurfaceShader::Lambert {
            kd: Color::splat(0.5),
            absorption: 1.0,
        });
        let floor = Sphere::new(DVec3::new(0.0, 0.0, -1001.0), 1000.0);
        let ceiling = Sphere::new(DVec3::new(0.0, 0.0, 1003.0), 1000.0);
        scene.add_shape(Shape::sphere(floor, Some(mirror)));
        scene.add_shape(Shape::sphere(ceiling, Some(diffuse)));

        let mut pass = PhotonPass::new(&scene, &RenderConfig::default());
        let mut rng = StdRng::seed_from_u64(5);
        pass.scatter(EmittedPhoton::new(DVec3::ZERO, Color::ONE, -DVec3::Z), &mut rng, 0);
        pass.scatter(EmittedPhoton::new(DVec3::ZERO, Color::ONE, DVec3::Z), &mut rng, 0);

        assert_eq!(pass.maps().global.len(), 2);
        assert_eq!(pass.maps().caustic.len(), 1);
    }

    #[test]
    fn test_volumetric_photons_land_in_fog() {
        let mut scene = enclosed_light(
            SurfaceShader::Lambert {
                kd: Color::splat(0.8),
                absorption: 0.0,
            },
            500,
        );
        scene.add_fog(FogBox {
            bounds: Aabb::enclosing([DVec3::splat(-4.0), DVec3::splat(4.0)]),
            sigma_s: 0.5,
            sigma_a: 0.0,
        });
        let config = RenderConfig {
            volumetric_photons: true,
            max_photon_bounces: 3,
            ..Default::default()
        };
        let maps = PhotonPass::new(&scene, &config).run(17);

        let volume = maps.volume.as_ref().unwrap();
        assert!(!volume.is_empty());
        let bounds = volume.bounds();
        assert!(volume.photons().iter().all(|p| bounds.contains(p.position)));
    }

    #[test]
    fn test_fog_attenuates_stored_photons() {
        let mut scene = Scene::default();
        let diffuse = scene.add_shader(SurfaceShader::Lambert {
            kd: Color::splat(0.5),
            absorption: 1.0,
        });
        let ceiling = Sphere::new(DVec3::new(0.0, 0.0, 1003.0), 1000.0);
        scene.add_shape(Shape::sphere(ceiling, Some(diffuse)));
        scene.add_fog(FogBox {
            bounds: Aabb::enclosing([DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, 1.0, 2.0)]),
            sigma_s: 0.25,
            sigma_a: 0.75,
        });

        let mut pass = PhotonPass::new(&scene, &RenderConfig::default());
        let mut rng = StdRng::seed_from_u64(8);
        pass.scatter(EmittedPhoton::new(DVec3::ZERO, Color::ONE, DVec3::Z), &mut rng, 0);

        // One unit of fog with extinction 1 before the ceiling
        let photons = pass.maps().global.photons();
        assert_eq!(photons.len(), 1);
        assert!((photons[0].power - Color::splat((-1.0f64).exp())).length() < 1e-12);
    }

    #[test]
    fn test_no_volume_without_fog() {
        let scene = enclosed_light(SurfaceShader::Empty, 10);
        let config = RenderConfig {
            volumetric_photons: true,
            ..Default::default()
        };
        let maps = PhotonPass::new(&scene, &config).run(1);
        assert!(maps.volume.is_none());
        assert!(maps.global.is_empty());
    }
}

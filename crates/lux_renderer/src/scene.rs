//! The runtime scene.
//!
//! Shapes and shaders live in arenas addressed by [`ShapeId`] and
//! [`ShaderId`]; hit records carry those handles instead of references. The
//! photon maps built for the scene are cached until the scene changes or is
//! reset.

use std::path::PathBuf;
use std::sync::Arc;

use lux_core::description::vec3;
use lux_core::{
    load_obj, FogDescription, LightDescription, MeshLoadError, PhotonSourceDescription,
    SceneDescription, SceneSettings, ShaderKind, ShapeDescription,
};
use lux_math::{Aabb, Color, DVec2, DVec3, Interval};
use rand::RngCore;
use thiserror::Error;

use crate::bvh::BvhConfig;
use crate::camera::Camera;
use crate::hit::{Hittable, ShaderId, ShapeId};
use crate::light::{Light, LightSample, SquareArea};
use crate::mesh::MeshShape;
use crate::photon_map::PhotonMaps;
use crate::photon_pass::PhotonPass;
use crate::photon_source::PhotonSource;
use crate::renderer::RenderConfig;
use crate::shader::SurfaceShader;
use crate::shape::Shape;
use crate::sphere::Sphere;
use crate::{sampling, Ray};

/// Start of shadow ray intervals.
const SHADOW_T_MIN: f64 = 1e-3;

/// How far short of the sampled point an area-light shadow ray may end on
/// the light and still count as reaching it.
const AREA_LIGHT_TOLERANCE: f64 = 0.1;

/// Errors that can occur while building a scene from a description.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("failed to load mesh {path}: {source}")]
    Mesh {
        path: PathBuf,
        #[source]
        source: MeshLoadError,
    },

    #[error("unknown shader '{0}'")]
    UnknownShader(String),

    #[error("shader '{0}' is defined more than once")]
    DuplicateShader(String),

    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },
}

fn invalid(what: &'static str, reason: impl Into<String>) -> SceneError {
    SceneError::Invalid {
        what,
        reason: reason.into(),
    }
}

/// Homogeneous fog filling an axis-aligned box.
#[derive(Debug, Clone, PartialEq)]
pub struct FogBox {
    pub bounds: Aabb,
    /// Scattering coefficient
    pub sigma_s: f64,
    /// Absorption coefficient
    pub sigma_a: f64,
}

impl FogBox {
    /// Extinction coefficient.
    #[inline]
    pub fn sigma_t(&self) -> f64 {
        self.sigma_s + self.sigma_a
    }

    /// The part of `[t_min, t_max]` along `ray` inside the box, if it has
    /// positive length.
    pub fn clip(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Interval> {
        let span = self
            .bounds
            .hit(ray.origin, ray.direction, Interval::new(t_min, t_max))?;
        (span.size() > 0.0).then_some(span)
    }
}

/// Photon maps together with the settings they were traced with.
#[derive(Debug, Clone)]
struct CachedPhotonMaps {
    seed: u64,
    max_photon_bounces: u32,
    volumetric_photons: bool,
    maps: Arc<PhotonMaps>,
}

impl CachedPhotonMaps {
    fn matches(&self, config: &RenderConfig) -> bool {
        self.seed == config.seed
            && self.max_photon_bounces == config.max_photon_bounces
            && self.volumetric_photons == config.volumetric_photons
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub camera: Camera,
    pub settings: SceneSettings,
    shapes: Vec<Shape>,
    shaders: Vec<SurfaceShader>,
    lights: Vec<Light>,
    photon_sources: Vec<PhotonSource>,
    fog: Vec<FogBox>,
    photon_maps: Option<CachedPhotonMaps>,
}

impl Scene {
    pub fn new(camera: Camera, settings: SceneSettings) -> Self {
        Self {
            camera,
            settings,
            ..Default::default()
        }
    }

    /// Build a scene from a description.
    pub fn from_description(desc: &SceneDescription) -> Result<Self, SceneError> {
        let mut scene = Scene::new(Camera::default(), SceneSettings::default());
        scene.load(desc)?;
        Ok(scene)
    }

    /// Replace the content of this scene with `desc`.
    ///
    /// The new content is built completely before anything is replaced, so
    /// on error the scene is left as it was.
    pub fn load(&mut self, desc: &SceneDescription) -> Result<(), SceneError> {
        let loaded = build(desc)?;
        log::info!(
            "Loaded scene: {} shapes, {} shaders, {} lights, {} photon sources, {} fog volumes",
            loaded.shapes.len(),
            loaded.shaders.len(),
            loaded.lights.len(),
            loaded.photon_sources.len(),
            loaded.fog.len()
        );
        *self = loaded;
        Ok(())
    }

    /// Drop every shape, shader, light, photon source, fog volume and the
    /// cached photon maps. The camera and settings are kept.
    pub fn reset(&mut self) {
        self.shapes.clear();
        self.shaders.clear();
        self.lights.clear();
        self.photon_sources.clear();
        self.fog.clear();
        self.photon_maps = None;
    }

    pub fn bvh_config(&self) -> BvhConfig {
        BvhConfig {
            max_depth: self.settings.bvh_max_depth,
            max_objects: self.settings.bvh_max_objects,
        }
    }

    pub fn add_shader(&mut self, shader: SurfaceShader) -> ShaderId {
        self.shaders.push(shader);
        ShaderId(self.shaders.len() - 1)
    }

    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        self.photon_maps = None;
        self.shapes.push(shape);
        ShapeId(self.shapes.len() - 1)
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn add_photon_source(&mut self, source: PhotonSource) {
        self.photon_maps = None;
        self.photon_sources.push(source);
    }

    pub fn add_fog(&mut self, fog: FogBox) {
        self.photon_maps = None;
        self.fog.push(fog);
    }

    /// Add an isotropic point emitter. It traces photons and also lights
    /// surfaces directly.
    pub fn add_isotropic_point_light(
        &mut self,
        position: DVec3,
        color: Color,
        power: f64,
        photons: usize,
    ) {
        let total = color.x + color.y + color.z;
        if total <= 0.0 {
            log::warn!("Point photon source at {:?} is black and emits nothing", position);
        }
        let direct_color = if total > 0.0 { color / total } else { Color::ZERO };

        self.add_light(Light::Point {
            position,
            color: direct_color,
            power,
        });
        self.add_photon_source(PhotonSource::IsotropicPoint {
            position,
            color,
            power,
            photons,
        });
    }

    /// Add a diffuse rectangular emitter. It traces photons, lights surfaces
    /// directly and is visible as a two-triangle shape with the empty shader.
    pub fn add_square_area_light(&mut self, area: SquareArea, photons: usize) -> ShapeId {
        if area.color.x + area.color.y + area.color.z <= 0.0 {
            log::warn!("Area photon source at {:?} is black and emits nothing", area.lower);
        }

        let empty = self.add_shader(SurfaceShader::Empty);
        let mesh = MeshShape::new(Arc::new(area.mesh()), self.bvh_config());
        let id = self.add_shape(Shape::mesh(mesh, Some(empty)).as_area_light(area.radiance()));

        self.add_light(Light::SquareArea(area.clone()));
        self.add_photon_source(PhotonSource::DiffuseSquareArea { area, photons });
        id
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0]
    }

    pub fn shaders(&self) -> &[SurfaceShader] {
        &self.shaders
    }

    pub fn shader(&self, id: ShaderId) -> &SurfaceShader {
        &self.shaders[id.0]
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn photon_sources(&self) -> &[PhotonSource] {
        &self.photon_sources
    }

    pub fn fog(&self) -> &[FogBox] {
        &self.fog
    }

    /// Find the closest hit along `ray`.
    ///
    /// On a hit `ray.hit` is filled for the winning shape, including
    /// `hit.shape`, and `ray.t_max` no longer admits farther hits.
    pub fn intersect(&self, ray: &mut Ray) -> Option<ShapeId> {
        let mut closest = None;
        for (i, shape) in self.shapes.iter().enumerate() {
            // Every hit tightens t_max, so the last one reported is the closest
            if shape.intersect(ray) {
                closest = Some(i);
            }
        }

        let i = closest?;
        self.shapes[i].fill_hit_info(ray);
        ray.hit.shape = Some(ShapeId(i));
        Some(ShapeId(i))
    }

    /// True if anything blocks `ray` within its interval.
    pub fn occluded(&self, ray: &mut Ray) -> bool {
        self.shapes.iter().any(|shape| shape.intersect(ray))
    }

    /// True if nothing lies between `from` and a point light sample.
    pub fn point_visible(&self, from: DVec3, sample: &LightSample) -> bool {
        let mut ray = Ray::with_interval(
            from,
            sample.direction,
            SHADOW_T_MIN,
            sample.distance - 1e-5,
        );
        !self.occluded(&mut ray)
    }

    /// True if the first thing seen from `from` towards an area light sample
    /// is the light itself.
    pub fn area_light_visible(&self, from: DVec3, sample: &LightSample) -> bool {
        let mut ray = Ray::with_interval(
            from,
            sample.direction,
            SHADOW_T_MIN,
            sample.distance + 1e-3,
        );
        match self.intersect(&mut ray) {
            Some(id) => {
                self.shape(id).area_light && ray.hit.t > sample.distance - AREA_LIGHT_TOLERANCE
            }
            None => false,
        }
    }

    /// Stratified jittered samples, `n` rounded up to a perfect square.
    pub fn generate_stratified_jittered_samples(
        &self,
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Vec<DVec2> {
        sampling::stratified_jittered(n, rng)
    }

    /// Grid cell centres, `n` rounded up to a perfect square.
    pub fn generate_uniform_samples(&self, n: usize) -> Vec<DVec2> {
        sampling::uniform_grid(n)
    }

    pub fn generate_random_samples(&self, n: usize, rng: &mut dyn RngCore) -> Vec<DVec2> {
        sampling::random(n, rng)
    }

    /// The cached photon maps, if traced.
    pub fn photon_maps(&self) -> Option<Arc<PhotonMaps>> {
        self.photon_maps.as_ref().map(|cached| Arc::clone(&cached.maps))
    }

    /// Return the photon maps for `config`, running the photon pass first if
    /// they are missing or were traced with different settings.
    pub fn ensure_photon_maps(&mut self, config: &RenderConfig) -> Arc<PhotonMaps> {
        if let Some(cached) = &self.photon_maps {
            if cached.matches(config) {
                return Arc::clone(&cached.maps);
            }
        }

        let maps = Arc::new(PhotonPass::new(self, config).run(config.seed));
        self.photon_maps = Some(CachedPhotonMaps {
            seed: config.seed,
            max_photon_bounces: config.max_photon_bounces,
            volumetric_photons: config.volumetric_photons,
            maps: Arc::clone(&maps),
        });
        maps
    }
}

/// Build a complete scene from `desc` without touching any existing one.
fn build(desc: &SceneDescription) -> Result<Scene, SceneError> {
    let camera_desc = &desc.camera;
    if camera_desc.width == 0 || camera_desc.height == 0 {
        return Err(invalid(
            "camera",
            format!("resolution {}x{}", camera_desc.width, camera_desc.height),
        ));
    }
    if !(camera_desc.vfov > 0.0 && camera_desc.vfov < 180.0) {
        return Err(invalid("camera", format!("vertical fov {}", camera_desc.vfov)));
    }
    if desc.settings.bvh_max_objects == 0 {
        return Err(invalid("settings", "bvh_max_objects must be at least 1"));
    }

    let mut scene = Scene::new(Camera::from_description(camera_desc), desc.settings.clone());

    let mut names = std::collections::HashMap::new();
    for shader in &desc.shaders {
        let runtime = match shader.kind {
            ShaderKind::Lambert { kd, absorption } => {
                check_probability(&shader.name, absorption)?;
                SurfaceShader::Lambert {
                    kd: vec3(kd),
                    absorption,
                }
            }
            ShaderKind::Mirror { absorption } => {
                check_probability(&shader.name, absorption)?;
                SurfaceShader::SpecularMirror { absorption }
            }
            ShaderKind::Dielectric { ior } => {
                if !(ior > 0.0) {
                    return Err(invalid(
                        "shader",
                        format!("'{}' has index of refraction {}", shader.name, ior),
                    ));
                }
                SurfaceShader::SpecularDielectric { ior }
            }
        };
        let id = scene.add_shader(runtime);
        if names.insert(shader.name.clone(), id).is_some() {
            return Err(SceneError::DuplicateShader(shader.name.clone()));
        }
    }

    let lookup = |name: &Option<String>| -> Result<Option<ShaderId>, SceneError> {
        match name {
            Some(name) => names
                .get(name)
                .copied()
                .map(Some)
                .ok_or_else(|| SceneError::UnknownShader(name.clone())),
            None => Ok(None),
        }
    };

    for shape in &desc.shapes {
        match shape {
            ShapeDescription::Sphere {
                center,
                radius,
                shader,
            } => {
                if !(*radius > 0.0 && radius.is_finite()) {
                    return Err(invalid("sphere", format!("radius {}", radius)));
                }
                let shader = lookup(shader)?;
                scene.add_shape(Shape::sphere(Sphere::new(vec3(*center), *radius), shader));
            }
            ShapeDescription::Obj {
                path,
                shader,
                smooth_normals,
                reverse_orientation,
            } => {
                let shader = lookup(shader)?;
                let mut mesh = load_obj(path).map_err(|source| SceneError::Mesh {
                    path: path.clone(),
                    source,
                })?;
                if *reverse_orientation {
                    mesh.reverse_orientation();
                    mesh.flip_normals();
                }
                if *smooth_normals && !mesh.has_normals() {
                    mesh.compute_normals();
                }
                log::debug!("Loaded {} with {} triangles", path.display(), mesh.triangle_count());

                let mesh_shape = MeshShape::new(Arc::new(mesh), scene.bvh_config())
                    .with_smooth_normals(*smooth_normals);
                scene.add_shape(Shape::mesh(mesh_shape, shader));
            }
        }
    }

    for source in &desc.photon_sources {
        match source {
            PhotonSourceDescription::IsotropicPoint {
                position,
                color,
                power,
                photons,
            } => {
                check_power(*power)?;
                scene.add_isotropic_point_light(vec3(*position), vec3(*color), *power, *photons);
            }
            PhotonSourceDescription::DiffuseSquareArea {
                lower,
                dx,
                dy,
                width,
                height,
                normal,
                color,
                power,
                photons,
            } => {
                check_power(*power)?;
                let area = SquareArea::new(
                    vec3(*lower),
                    vec3(*dx),
                    vec3(*dy),
                    *width,
                    *height,
                    vec3(*normal),
                    vec3(*color),
                    *power,
                );
                if area.area() <= 0.0 || area.normal == DVec3::ZERO {
                    return Err(invalid("area light", "degenerate rectangle or normal"));
                }
                scene.add_square_area_light(area, *photons);
            }
        }
    }

    for light in &desc.lights {
        match light {
            LightDescription::Point {
                position,
                color,
                power,
            } => {
                check_power(*power)?;
                scene.add_light(Light::Point {
                    position: vec3(*position),
                    color: vec3(*color),
                    power: *power,
                });
            }
        }
    }

    for fog in &desc.fog {
        scene.add_fog(fog_box(fog)?);
    }

    Ok(scene)
}

fn check_probability(name: &str, p: f64) -> Result<(), SceneError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(invalid("shader", format!("'{}' has absorption {} outside [0, 1]", name, p)))
    }
}

fn check_power(power: f64) -> Result<(), SceneError> {
    if power >= 0.0 && power.is_finite() {
        Ok(())
    } else {
        Err(invalid("emitter", format!("power {}", power)))
    }
}

fn fog_box(desc: &FogDescription) -> Result<FogBox, SceneError> {
    let (min, max) = (vec3(desc.min), vec3(desc.max));
    if min.cmpgt(max).any() {
        return Err(invalid("fog", format!("min {:?} exceeds max {:?}", min, max)));
    }
    if !(desc.sigma_s >= 0.0 && desc.sigma_a >= 0.0) {
        return Err(invalid("fog", "negative coefficient"));
    }
    Ok(FogBox {
        bounds: Aabb::enclosing([min, max]),
        sigma_s: desc.sigma_s,
        sigma_a: desc.sigma_a,
    })
}

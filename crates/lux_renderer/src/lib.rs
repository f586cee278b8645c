//! Lux Renderer - CPU Photon Mapping
//!
//! An offline renderer that traces photons from the lights into global,
//! caustic and volumetric photon maps, then ray traces the image using
//! those maps for indirect illumination.
//!
//! # Example
//!
//! ```ignore
//! use lux_core::SceneDescription;
//! use lux_renderer::{RenderConfig, Renderer, Scene};
//!
//! let desc = SceneDescription::two_spheres();
//! let mut scene = Scene::from_description(&desc)?;
//! let image = Renderer::new(RenderConfig::from(&desc.render)).render(&mut scene);
//! image.save_png("two_spheres.png")?;
//! ```

mod bvh;
mod camera;
mod hit;
mod integrator;
mod light;
mod mesh;
mod octree;
mod photon_map;
mod photon_pass;
mod photon_source;
mod ray;
mod renderer;
pub mod sampling;
mod scene;
mod shader;
mod shape;
mod sphere;
mod triangle;

pub use bvh::{BuildStats, Bvh, BvhConfig, BvhNode, BvhSource, LeafObjects};
pub use camera::Camera;
pub use hit::{HitInfo, Hittable, ShaderId, ShapeId};
pub use integrator::Integrator;
pub use light::{normalized_flux, Light, LightSample, SquareArea};
pub use mesh::MeshShape;
pub use octree::{Octree, VolumetricPhoton, DEFAULT_MAX_DEPTH};
pub use photon_map::{Photon, PhotonMap, PhotonMaps, MIN_ESTIMATE_PHOTONS};
pub use photon_pass::{PhotonPass, PhotonPassStats};
pub use photon_source::{EmittedPhoton, PhotonSource};
pub use ray::{Ray, RAY_T_MIN};
pub use renderer::{
    clamp_01, color_to_rgba, linear_to_gamma, render_pixel, ImageBuffer, RenderConfig, Renderer,
};
pub use scene::{FogBox, Scene, SceneError};
pub use shader::{fresnel_dielectric, reflect, refract, SurfaceShader, SURFACE_OFFSET};
pub use shape::{Geometry, Shape};
pub use sphere::Sphere;
pub use triangle::{intersect_triangle, TriangleHit};

/// Re-export common math types from lux_math
pub use lux_math::{Aabb, Color, DVec2, DVec3, Interval};

use rand::{Rng, RngCore};

/// Uniform sample in `[0, 1)` from a type-erased generator.
#[inline]
pub fn gen_f64(rng: &mut dyn RngCore) -> f64 {
    rng.gen()
}

//! Serializable scene descriptions.
//!
//! A [`SceneDescription`] is plain data: shaders are referenced by name, meshes
//! by path, and every numeric setting has a default so partial JSON files load.
//! The renderer turns a description into its runtime scene.

use std::path::{Path, PathBuf};

use lux_math::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading a scene description.
#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convert a serialized triple into a vector.
#[inline]
pub fn vec3(a: [f64; 3]) -> DVec3 {
    DVec3::from_array(a)
}

/// Sampling and acceleration parameters owned by the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Monte-Carlo samples for hemisphere gathering and area lights
    pub mc_samples: usize,
    /// Maximum photon-map search radius
    pub search_radius: f64,
    /// Photons used per irradiance estimate
    pub estimate_photons: usize,
    /// Radius given to volumetric photons
    pub volumetric_radius: f64,
    /// BVH maximum depth
    pub bvh_max_depth: usize,
    /// BVH maximum objects per leaf
    pub bvh_max_objects: usize,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            mc_samples: 64,
            search_radius: 0.1,
            estimate_photons: 64,
            volumetric_radius: 0.5,
            bvh_max_depth: 32,
            bvh_max_objects: 4,
        }
    }
}

/// Integrator parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub samples_per_pixel: u32,
    /// Camera-ray recursion cutoff
    pub max_depth: u32,
    /// Photon scattering cutoff
    pub max_photon_bounces: u32,
    /// Ray-march step cutoff per fog interval
    pub max_march_steps: u32,
    /// Hemisphere gathering on the primary hit
    pub final_gather: bool,
    /// Deposit photons in fog volumes during the photon pass
    pub volumetric_photons: bool,
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            samples_per_pixel: 1,
            max_depth: 32,
            max_photon_bounces: 32,
            max_march_steps: 4096,
            final_gather: true,
            volumetric_photons: false,
            seed: 0,
        }
    }
}

/// Perspective camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDescription {
    pub look_from: [f64; 3],
    pub look_at: [f64; 3],
    pub up: [f64; 3],
    /// Vertical field of view in degrees
    pub vfov: f64,
    pub width: u32,
    pub height: u32,
    pub near: f64,
    pub far: f64,
}

impl Default for CameraDescription {
    fn default() -> Self {
        Self {
            look_from: [0.0, -10.0, 0.0],
            look_at: [0.0, 0.0, 0.0],
            up: [0.0, 0.0, 1.0],
            vfov: 45.0,
            width: 512,
            height: 512,
            near: 1e-3,
            far: 1.0e12,
        }
    }
}

/// A named surface shader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderDescription {
    pub name: String,
    #[serde(flatten)]
    pub kind: ShaderKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShaderKind {
    /// Diffuse reflector. `absorption` is the photon termination probability.
    Lambert {
        kd: [f64; 3],
        #[serde(default = "default_lambert_absorption")]
        absorption: f64,
    },
    /// Perfect mirror. `absorption` is the photon termination probability.
    Mirror {
        #[serde(default)]
        absorption: f64,
    },
    /// Smooth glass-like interface entered from a medium of index 1.
    Dielectric { ior: f64 },
}

fn default_lambert_absorption() -> f64 {
    0.5
}

/// Geometry. `shader` names an entry of [`SceneDescription::shaders`];
/// `None` leaves the shape without a shader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeDescription {
    Sphere {
        center: [f64; 3],
        radius: f64,
        #[serde(default)]
        shader: Option<String>,
    },
    Obj {
        path: PathBuf,
        #[serde(default)]
        shader: Option<String>,
        /// Interpolate vertex normals for shading
        #[serde(default)]
        smooth_normals: bool,
        /// Reverse triangle winding after loading
        #[serde(default)]
        reverse_orientation: bool,
    },
}

/// Emitters traced in the photon pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhotonSourceDescription {
    IsotropicPoint {
        position: [f64; 3],
        color: [f64; 3],
        power: f64,
        photons: usize,
    },
    /// A `width` x `height` rectangle spanned from `lower` along `dx` and
    /// `dy`, emitting into the hemisphere around `normal`. Also acts as a
    /// direct light and a visible shape.
    DiffuseSquareArea {
        lower: [f64; 3],
        dx: [f64; 3],
        dy: [f64; 3],
        width: f64,
        height: f64,
        normal: [f64; 3],
        color: [f64; 3],
        power: f64,
        photons: usize,
    },
}

/// Emitters used only for direct lighting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightDescription {
    Point {
        position: [f64; 3],
        color: [f64; 3],
        power: f64,
    },
}

/// Homogeneous fog filling an axis-aligned box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FogDescription {
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub sigma_s: f64,
    pub sigma_a: f64,
}

/// Everything needed to build and render a scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    pub camera: CameraDescription,
    pub settings: SceneSettings,
    pub render: RenderSettings,
    pub shaders: Vec<ShaderDescription>,
    pub shapes: Vec<ShapeDescription>,
    pub photon_sources: Vec<PhotonSourceDescription>,
    pub lights: Vec<LightDescription>,
    pub fog: Vec<FogDescription>,
}

impl SceneDescription {
    /// Parse a description from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a description from a JSON file.
    ///
    /// Relative mesh paths are resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DescriptionError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DescriptionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut description = Self::from_json_str(&json)?;

        if let Some(dir) = path.parent() {
            for shape in &mut description.shapes {
                if let ShapeDescription::Obj { path, .. } = shape {
                    if path.is_relative() {
                        *path = dir.join(&*path);
                    }
                }
            }
        }

        log::debug!(
            "Read scene {}: {} shapes, {} photon sources, {} lights, {} fog volumes",
            path.display(),
            description.shapes.len(),
            description.photon_sources.len(),
            description.lights.len(),
            description.fog.len()
        );
        Ok(description)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, DescriptionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The classic test scene: a huge ground sphere of radius 1e6 just below
    /// the `z = 0` plane, a radius-10 sphere resting on it, and one isotropic
    /// point light above.
    pub fn two_spheres() -> Self {
        let big_radius = 1_000_000.0;
        let small_radius = 10.0;
        let small_center = DVec3::new(0.0, 0.0, small_radius);
        let eye = small_center - DVec3::new(-small_radius, small_radius * 10.0, -small_radius);

        Self {
            camera: CameraDescription {
                look_from: eye.to_array(),
                look_at: small_center.to_array(),
                up: [0.0, 0.0, 1.0],
                vfov: 30.0,
                width: 64,
                height: 64,
                ..Default::default()
            },
            settings: SceneSettings {
                mc_samples: 16,
                search_radius: 4.0,
                estimate_photons: 32,
                ..Default::default()
            },
            render: RenderSettings {
                seed: 7,
                ..Default::default()
            },
            shaders: vec![ShaderDescription {
                name: "gray".to_string(),
                kind: ShaderKind::Lambert {
                    kd: [0.5, 0.5, 0.5],
                    absorption: 0.5,
                },
            }],
            shapes: vec![
                ShapeDescription::Sphere {
                    center: [0.0, 0.0, -big_radius],
                    radius: big_radius,
                    shader: Some("gray".to_string()),
                },
                ShapeDescription::Sphere {
                    center: small_center.to_array(),
                    radius: small_radius,
                    shader: Some("gray".to_string()),
                },
            ],
            photon_sources: vec![PhotonSourceDescription::IsotropicPoint {
                position: [30.0, -30.0, 60.0],
                color: [1.0, 1.0, 1.0],
                power: 50_000.0,
                photons: 20_000,
            }],
            lights: Vec::new(),
            fog: Vec::new(),
        }
    }
}

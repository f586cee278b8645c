//! Lux Core - Renderer-agnostic scene data.
//!
//! This crate provides:
//!
//! - **Geometry**: the triangle `Mesh`
//! - **OBJ support**: loading triangulated Wavefront OBJ files
//! - **Scene descriptions**: serde-backed JSON scene files with defaults
//!
//! # Example
//!
//! ```ignore
//! use lux_core::{load_obj, SceneDescription};
//!
//! let mesh = load_obj("bunny.obj")?;
//! println!("{} triangles", mesh.triangle_count());
//!
//! let scene = SceneDescription::from_file("scene.json")?;
//! ```

pub mod description;
pub mod mesh;
pub mod obj;

// Re-export commonly used types
pub use description::{
    CameraDescription, DescriptionError, FogDescription, LightDescription,
    PhotonSourceDescription, RenderSettings, SceneDescription, SceneSettings, ShaderDescription,
    ShaderKind, ShapeDescription,
};
pub use mesh::Mesh;
pub use obj::{load_obj, load_obj_from_reader, MeshLoadError, MeshLoadResult};

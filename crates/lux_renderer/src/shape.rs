//! Scene shapes: geometry bound to a surface shader.

use crate::hit::{Hittable, ShaderId};
use crate::mesh::MeshShape;
use crate::sphere::Sphere;
use crate::Ray;
use lux_math::{Aabb, Color};

/// The closed set of geometric primitives.
#[derive(Debug, Clone)]
pub enum Geometry {
    Sphere(Sphere),
    Mesh(MeshShape),
}

impl Hittable for Geometry {
    #[inline]
    fn intersect(&self, ray: &mut Ray) -> bool {
        match self {
            Geometry::Sphere(s) => s.intersect(ray),
            Geometry::Mesh(m) => m.intersect(ray),
        }
    }

    #[inline]
    fn fill_hit_info(&self, ray: &mut Ray) {
        match self {
            Geometry::Sphere(s) => s.fill_hit_info(ray),
            Geometry::Mesh(m) => m.fill_hit_info(ray),
        }
    }

    fn bounding_box(&self) -> Aabb {
        match self {
            Geometry::Sphere(s) => s.bounding_box(),
            Geometry::Mesh(m) => m.bounding_box(),
        }
    }
}

/// A shape in the scene.
///
/// A shape without a shader still occludes but neither shades nor stores
/// photons.
#[derive(Debug, Clone)]
pub struct Shape {
    pub geometry: Geometry,
    pub shader: Option<ShaderId>,
    /// Visible surface of an area light
    pub area_light: bool,
    /// Radiance seen by camera rays hitting the front of an area light
    pub emission: Color,
}

impl Shape {
    pub fn new(geometry: Geometry, shader: Option<ShaderId>) -> Self {
        Self {
            geometry,
            shader,
            area_light: false,
            emission: Color::ZERO,
        }
    }

    pub fn sphere(sphere: Sphere, shader: Option<ShaderId>) -> Self {
        Self::new(Geometry::Sphere(sphere), shader)
    }

    pub fn mesh(mesh: MeshShape, shader: Option<ShaderId>) -> Self {
        Self::new(Geometry::Mesh(mesh), shader)
    }

    /// Mark this shape as the visible surface of an area light emitting
    /// `emission`.
    pub fn as_area_light(mut self, emission: Color) -> Self {
        self.area_light = true;
        self.emission = emission;
        self
    }
}

impl Hittable for Shape {
    #[inline]
    fn intersect(&self, ray: &mut Ray) -> bool {
        self.geometry.intersect(ray)
    }

    fn fill_hit_info(&self, ray: &mut Ray) {
        self.geometry.fill_hit_info(ray);
        ray.hit.shader = self.shader;
    }

    fn bounding_box(&self) -> Aabb {
        self.geometry.bounding_box()
    }
}

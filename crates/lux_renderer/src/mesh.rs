//! Triangle mesh shape accelerated by a BVH.

use std::sync::Arc;

use crate::bvh::{Bvh, BvhConfig, BvhSource};
use crate::hit::Hittable;
use crate::triangle::intersect_triangle;
use crate::Ray;
use lux_core::Mesh;
use lux_math::{Aabb, DVec3};

impl BvhSource for Mesh {
    fn object_count(&self) -> usize {
        self.triangle_count()
    }

    fn object_bounds(&self, index: usize) -> Aabb {
        self.triangle_bounds(index)
    }
}

/// A triangle mesh with a BVH built over its triangles at construction.
#[derive(Debug, Clone)]
pub struct MeshShape {
    mesh: Arc<Mesh>,
    bvh: Bvh,
    smooth_normals: bool,
}

impl MeshShape {
    /// Build the BVH for `mesh`. Shading uses flat geometric normals.
    pub fn new(mesh: Arc<Mesh>, config: BvhConfig) -> Self {
        log::debug!(
            "Building mesh BVH over {} triangles (max depth {}, max objects {})",
            mesh.triangle_count(),
            config.max_depth,
            config.max_objects
        );
        let bvh = Bvh::build(mesh.as_ref(), config);
        Self {
            mesh,
            bvh,
            smooth_normals: false,
        }
    }

    /// Interpolate per-vertex normals for shading when the mesh has them.
    pub fn with_smooth_normals(mut self, smooth: bool) -> Self {
        if smooth && !self.mesh.has_normals() {
            log::warn!("Mesh has no vertex normals, using flat shading");
        }
        self.smooth_normals = smooth;
        self
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    fn shading_normal(&self, index: usize, u: f64, v: f64, ng: DVec3) -> DVec3 {
        if !self.smooth_normals {
            return ng;
        }
        let Some(normals) = &self.mesh.normals else {
            return ng;
        };
        let [a, b, c] = self.mesh.triangles[index];
        let n = (1.0 - u - v) * normals[a as usize]
            + u * normals[b as usize]
            + v * normals[c as usize];
        n.try_normalize().unwrap_or(ng)
    }
}

impl Hittable for MeshShape {
    /// Finds the closest triangle: every accepted hit tightens `t_max`, so
    /// the traversal keeps culling against the best hit so far.
    fn intersect(&self, ray: &mut Ray) -> bool {
        let mesh = &self.mesh;
        self.bvh.traverse(ray, |index, ray| {
            let [v0, v1, v2] = mesh.triangle_vertices(index as usize);
            match intersect_triangle(ray.origin, ray.direction, v0, v1, v2, ray.t_min, ray.t_max) {
                Some(hit) => {
                    let ng = hit.ng.normalize();
                    ray.hit.t = hit.t;
                    ray.hit.uv = hit.uv;
                    ray.hit.ng = ng;
                    ray.hit.n = ng;
                    ray.hit.primitive = index;
                    ray.t_max = hit.t;
                    true
                }
                None => false,
            }
        })
    }

    fn fill_hit_info(&self, ray: &mut Ray) {
        let hit = &mut ray.hit;
        let index = hit.primitive as usize;
        let (u, v) = (hit.uv.x, hit.uv.y);
        let [v0, v1, v2] = self.mesh.triangle_vertices(index);

        hit.p = ray.origin + hit.t * ray.direction;
        hit.incident = ray.direction;
        hit.origin = ray.origin;
        hit.n = self.shading_normal(index, u, v, hit.ng);
        hit.dp_du = v1 - v0;
        hit.dp_dv = v2 - v0;

        if let Some(uvs) = &self.mesh.uvs {
            let [a, b, c] = self.mesh.triangles[index];
            hit.st = (1.0 - u - v) * uvs[a as usize] + u * uvs[b as usize] + v * uvs[c as usize];
        } else {
            hit.st = hit.uv;
        }
    }

    fn bounding_box(&self) -> Aabb {
        self.mesh.bounds
    }
}

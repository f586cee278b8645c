//! Triangle mesh geometry.
//!
//! This module provides a renderer-agnostic mesh representation that can be
//! populated from OBJ files or built procedurally, and is consumed read-only by
//! the renderer's acceleration structures.

use lux_math::{Aabb, DVec2, DVec3};

/// A mesh consisting of vertex positions, optional normals and texture
/// coordinates, and triangle index triples.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions (one DVec3 per vertex)
    pub positions: Vec<DVec3>,

    /// Vertex normals (optional, one per vertex when present)
    pub normals: Option<Vec<DVec3>>,

    /// Texture coordinates (optional, one per vertex when present)
    pub uvs: Option<Vec<DVec2>>,

    /// Triangles as vertex index triples
    pub triangles: Vec<[u32; 3]>,

    /// Material index of each triangle (empty when the mesh has one material)
    pub material_ids: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and triangles, optionally with normals.
    ///
    /// Normals are NOT computed automatically. Call `compute_normals()`
    /// explicitly if you need them.
    pub fn new(
        positions: Vec<DVec3>,
        triangles: Vec<[u32; 3]>,
        normals: Option<Vec<DVec3>>,
    ) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            normals,
            uvs: None,
            triangles,
            material_ids: Vec::new(),
            bounds,
        }
    }

    /// Two-triangle quad `v0 v1 v2 v3`, wound so that its normal is
    /// `(v1 - v0) x (v3 - v0)`.
    pub fn quad(v0: DVec3, v1: DVec3, v2: DVec3, v3: DVec3) -> Self {
        Self::new(vec![v0, v1, v2, v3], vec![[0, 1, 2], [0, 2, 3]], None)
    }

    /// Compute axis-aligned bounding box from positions.
    fn compute_bounds(positions: &[DVec3]) -> Aabb {
        if positions.is_empty() {
            return Aabb::empty();
        }
        Aabb::enclosing(positions.iter().copied())
    }

    /// The three corner positions of triangle `index`.
    #[inline]
    pub fn triangle_vertices(&self, index: usize) -> [DVec3; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Bounding box of triangle `index`.
    pub fn triangle_bounds(&self, index: usize) -> Aabb {
        Aabb::enclosing(self.triangle_vertices(index))
    }

    /// Unnormalized face normal `(v1 - v0) x (v2 - v0)` of triangle `index`.
    pub fn face_normal(&self, index: usize) -> DVec3 {
        let [p0, p1, p2] = self.triangle_vertices(index);
        (p1 - p0).cross(p2 - p0)
    }

    /// Compute smooth vertex normals by averaging face normals.
    ///
    /// Replaces existing normals. Faces are area weighted; vertices touched
    /// only by degenerate faces fall back to `+Y`.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![DVec3::ZERO; vertex_count];
        let mut degenerate = 0usize;

        for (i, tri) in self.triangles.iter().enumerate() {
            let face_normal = self.face_normal(i);
            if face_normal.length_squared() == 0.0 {
                degenerate += 1;
                continue;
            }
            for &v in tri {
                normals[v as usize] += face_normal;
            }
        }

        for normal in &mut normals {
            let len = normal.length();
            if len > 0.0 {
                *normal /= len;
            } else {
                *normal = DVec3::Y;
            }
        }

        if degenerate > 0 {
            log::warn!("{} degenerate faces with zero-length normals", degenerate);
        }

        self.normals = Some(normals);
    }

    /// Negate every vertex normal.
    pub fn flip_normals(&mut self) {
        if let Some(normals) = &mut self.normals {
            for n in normals {
                *n = -*n;
            }
        }
    }

    /// Reverse the winding of every triangle, which flips its face normal.
    pub fn reverse_orientation(&mut self) {
        for tri in &mut self.triangles {
            tri.swap(1, 2);
        }
    }

    /// Check if the mesh has normals.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Check if the mesh has texture coordinates.
    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    /// Ensure the mesh has one normal per vertex, computing them if necessary.
    pub fn ensure_normals(&mut self) {
        let should_compute = match &self.normals {
            None => true,
            Some(normals) => normals.len() != self.positions.len(),
        };

        if should_compute {
            if let Some(normals) = &self.normals {
                log::debug!(
                    "{} normals for {} vertices, computing smooth normals",
                    normals.len(),
                    self.positions.len()
                );
            }
            self.compute_normals();
        }
    }

    /// Material index of triangle `index`, 0 when the mesh has none.
    pub fn material_id(&self, index: usize) -> u32 {
        self.material_ids.get(index).copied().unwrap_or(0)
    }

    /// Get the mesh center (center of bounding box).
    pub fn center(&self) -> DVec3 {
        self.bounds.centroid()
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle() -> Mesh {
        let positions = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        Mesh::new(positions, vec![[0, 1, 2]], None)
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = single_triangle();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.has_normals());
        assert_eq!(mesh.material_id(0), 0);
    }

    #[test]
    fn test_compute_normals() {
        // Counter-clockwise viewed from +Z
        let mut mesh = single_triangle();
        mesh.compute_normals();

        assert!(mesh.has_normals());
        for normal in mesh.normals.as_ref().unwrap() {
            assert!((normal.z - 1.0).abs() < 1e-9);
        }

        mesh.flip_normals();
        for normal in mesh.normals.as_ref().unwrap() {
            assert!((normal.z + 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reverse_orientation() {
        let mut mesh = single_triangle();
        assert!(mesh.face_normal(0).z > 0.0);

        mesh.reverse_orientation();
        assert_eq!(mesh.triangles[0], [0, 2, 1]);
        assert!(mesh.face_normal(0).z < 0.0);
    }

    #[test]
    fn test_bounds_computation() {
        let positions = vec![
            DVec3::new(-1.0, -2.0, -3.0),
            DVec3::new(4.0, 5.0, 6.0),
            DVec3::new(0.0, 0.0, 0.0),
        ];
        let mesh = Mesh::new(positions, vec![[0, 1, 2]], None);

        assert_eq!(mesh.bounds.min(), DVec3::new(-1.0, -2.0, -3.0));
        assert_eq!(mesh.bounds.max(), DVec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_quad() {
        let quad = Mesh::quad(
            DVec3::new(-1.0, -1.0, 0.0),
            DVec3::new(1.0, -1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(-1.0, 1.0, 0.0),
        );

        assert_eq!(quad.triangle_count(), 2);
        for i in 0..2 {
            assert!(quad.face_normal(i).normalize().abs_diff_eq(DVec3::Z, 1e-12));
        }

        let tb = quad.triangle_bounds(1);
        assert_eq!(tb.min(), DVec3::new(-1.0, -1.0, 0.0));
        assert_eq!(tb.max(), DVec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_ensure_normals_recomputes_mismatched() {
        let mut mesh = single_triangle();
        mesh.normals = Some(vec![DVec3::X]);
        mesh.ensure_normals();
        assert_eq!(mesh.normals.as_ref().unwrap().len(), 3);
    }
}

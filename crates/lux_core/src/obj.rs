//! Wavefront OBJ mesh loading.
//!
//! Only triangulated files are accepted: any face with more or fewer than
//! three vertices fails the whole load.

use std::io::BufRead;
use std::path::Path;

use lux_math::{DVec2, DVec3};
use thiserror::Error;

use crate::mesh::Mesh;

/// Errors that can occur during OBJ loading.
#[derive(Error, Debug)]
pub enum MeshLoadError {
    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("model '{model}' face {face} has {arity} vertices, only triangles are supported")]
    NonTriangularFace { model: String, face: usize, arity: u32 },

    #[error("vertex index {index} out of range (vertex count {vertex_count})")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("no triangles found")]
    Empty,
}

/// Result type for mesh loading.
pub type MeshLoadResult<T> = Result<T, MeshLoadError>;

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        single_index: true,
        triangulate: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Load an OBJ file into a single [`Mesh`].
///
/// All models in the file are merged; each model's material becomes the
/// material index of its triangles.
pub fn load_obj<P: AsRef<Path>>(path: P) -> MeshLoadResult<Mesh> {
    let path = path.as_ref();
    log::info!("Loading OBJ: {}", path.display());

    let (models, _materials) = tobj::load_obj(path, &load_options())?;
    let mesh = merge_models(&models)?;

    log::info!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Load OBJ data from a reader. Material libraries are ignored.
pub fn load_obj_from_reader<R: BufRead>(reader: &mut R) -> MeshLoadResult<Mesh> {
    let (models, _materials) =
        tobj::load_obj_buf(reader, &load_options(), |_| Err(tobj::LoadError::OpenFileFailed))?;
    merge_models(&models)
}

fn merge_models(models: &[tobj::Model]) -> MeshLoadResult<Mesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut triangles = Vec::new();
    let mut material_ids = Vec::new();
    let mut all_normals = true;
    let mut all_uvs = true;

    for model in models {
        let m = &model.mesh;

        if let Some((face, &arity)) = m.face_arities.iter().enumerate().find(|(_, &a)| a != 3) {
            return Err(MeshLoadError::NonTriangularFace {
                model: model.name.clone(),
                face,
                arity,
            });
        }

        let base = positions.len() as u32;
        let vertex_count = m.positions.len() / 3;

        positions.extend(
            m.positions
                .chunks_exact(3)
                .map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64)),
        );

        if m.normals.len() == m.positions.len() {
            normals.extend(
                m.normals
                    .chunks_exact(3)
                    .map(|n| DVec3::new(n[0] as f64, n[1] as f64, n[2] as f64)),
            );
        } else {
            all_normals = false;
        }

        if m.texcoords.len() / 2 == vertex_count {
            uvs.extend(
                m.texcoords
                    .chunks_exact(2)
                    .map(|t| DVec2::new(t[0] as f64, t[1] as f64)),
            );
        } else {
            all_uvs = false;
        }

        let material = m.material_id.unwrap_or(0) as u32;
        for tri in m.indices.chunks_exact(3) {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshLoadError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
            triangles.push([base + tri[0], base + tri[1], base + tri[2]]);
            material_ids.push(material);
        }
    }

    if triangles.is_empty() {
        return Err(MeshLoadError::Empty);
    }

    let mut mesh = Mesh::new(positions, triangles, all_normals.then_some(normals));
    if all_uvs {
        mesh.uvs = Some(uvs);
    }
    mesh.material_ids = material_ids;
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TETRAHEDRON: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
f 1 3 2
f 1 2 4
f 1 4 3
f 2 3 4
";

    #[test]
    fn test_load_triangles() {
        let mesh = load_obj_from_reader(&mut Cursor::new(TETRAHEDRON)).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 4);
        assert!(!mesh.has_normals());
        assert_eq!(mesh.bounds.max(), DVec3::ONE);
    }

    #[test]
    fn test_load_with_normals() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1
";
        let mesh = load_obj_from_reader(&mut Cursor::new(src)).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        let normals = mesh.normals.as_ref().unwrap();
        assert_eq!(normals.len(), mesh.vertex_count());
        assert!(normals.iter().all(|n| *n == DVec3::Z));
    }

    #[test]
    fn test_quad_face_is_rejected() {
        let src = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
        let err = load_obj_from_reader(&mut Cursor::new(src)).unwrap_err();
        assert!(matches!(err, MeshLoadError::NonTriangularFace { arity: 4, .. }));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let err = load_obj_from_reader(&mut Cursor::new("# nothing\n")).unwrap_err();
        assert!(matches!(err, MeshLoadError::Empty));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_obj("/definitely/not/here.obj").is_err());
    }
}

//! Wavefront OBJ import through `tobj`
//!
//! Every named object or group in the file becomes one [`SubMesh`]. Faces are
//! triangulated and attributes are re-indexed so a single index buffer
//! addresses position, color and texture coordinate together.

use std::io::BufRead;
use std::path::Path;

use thiserror::Error;

use crate::render::Vertex;

/// Model import errors
#[derive(Error, Debug)]
pub enum ModelLoadError {
    /// `tobj` rejected the file
    #[error("OBJ import failed: {0}")]
    Import(#[from] tobj::LoadError),

    /// The file parsed but contains no triangles
    #[error("model '{0}' contains no geometry")]
    NoGeometry(String),
}

/// Flattened geometry of one named part of a model
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    /// Object or group name from the file
    pub name: String,
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

/// Import an OBJ file from disk
pub fn load_obj_file(path: impl AsRef<Path>) -> Result<Vec<SubMesh>, ModelLoadError> {
    let path = path.as_ref();
    // Materials are not used; a missing .mtl only affects the ignored half.
    let (models, _materials) = tobj::load_obj(path, &load_options())?;
    flatten(models, &path.display().to_string())
}

/// Import OBJ text from any buffered reader; `mtllib` references are ignored
pub fn load_obj_source(reader: &mut impl BufRead, name: &str) -> Result<Vec<SubMesh>, ModelLoadError> {
    let (models, _materials) =
        tobj::load_obj_buf(reader, &load_options(), |_| Ok(Default::default()))?;
    flatten(models, name)
}

fn flatten(models: Vec<tobj::Model>, source: &str) -> Result<Vec<SubMesh>, ModelLoadError> {
    let meshes: Vec<SubMesh> = models
        .into_iter()
        .filter(|model| !model.mesh.indices.is_empty())
        .map(|model| SubMesh {
            vertices: convert_vertices(&model.mesh),
            indices: model.mesh.indices,
            name: model.name,
        })
        .collect();

    if meshes.is_empty() {
        return Err(ModelLoadError::NoGeometry(source.to_string()));
    }
    log::debug!("Imported {} sub-mesh(es) from {}", meshes.len(), source);
    Ok(meshes)
}

fn convert_vertices(mesh: &tobj::Mesh) -> Vec<Vertex> {
    let vertex_count = mesh.positions.len() / 3;
    (0..vertex_count)
        .map(|i| {
            let position = [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ];
            let color = if mesh.vertex_color.len() >= 3 * (i + 1) {
                [
                    mesh.vertex_color[3 * i],
                    mesh.vertex_color[3 * i + 1],
                    mesh.vertex_color[3 * i + 2],
                ]
            } else {
                [1.0, 1.0, 1.0]
            };
            // OBJ puts v = 0 at the bottom of the image, Vulkan at the top.
            let tex_coord = if mesh.texcoords.len() >= 2 * (i + 1) {
                [mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1]]
            } else {
                [0.0, 0.0]
            };
            Vertex::new(position, color, tex_coord)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_PARTS: &str = "\
o quad
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
o tri
v 0.0 0.0 1.0
v 1.0 0.0 1.0
v 0.0 1.0 1.0
f 5 6 7
";

    #[test]
    fn test_named_parts_become_sub_meshes() {
        let meshes = load_obj_source(&mut Cursor::new(TWO_PARTS), "two_parts").unwrap();

        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].name, "quad");
        assert_eq!(meshes[1].name, "tri");
    }

    #[test]
    fn test_quad_is_triangulated() {
        let meshes = load_obj_source(&mut Cursor::new(TWO_PARTS), "two_parts").unwrap();
        let quad = &meshes[0];

        assert_eq!(quad.indices.len(), 6);
        assert_eq!(quad.vertices.len(), 4);
        assert!(quad
            .indices
            .iter()
            .all(|&index| (index as usize) < quad.vertices.len()));
    }

    #[test]
    fn test_texcoords_flipped_and_default_color() {
        let meshes = load_obj_source(&mut Cursor::new(TWO_PARTS), "two_parts").unwrap();
        let quad = &meshes[0];

        let corner = quad
            .vertices
            .iter()
            .find(|vertex| vertex.position == [-0.5, -0.5, 0.0])
            .unwrap();
        assert_eq!(corner.tex_coord, [0.0, 1.0]);
        assert_eq!(corner.color, [1.0, 1.0, 1.0]);

        let tri = &meshes[1];
        assert!(tri.vertices.iter().all(|vertex| vertex.tex_coord == [0.0, 0.0]));
    }

    #[test]
    fn test_file_without_faces_is_rejected() {
        let result = load_obj_source(&mut Cursor::new("v 0 0 0\nv 1 0 0\n"), "points");
        assert!(matches!(result, Err(ModelLoadError::NoGeometry(name)) if name == "points"));
    }

    #[test]
    fn test_missing_file_is_import_error() {
        let result = load_obj_file("does/not/exist.obj");
        assert!(matches!(result, Err(ModelLoadError::Import(_))));
    }
}

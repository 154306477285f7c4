use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;
use precomputed::{Error, Mesh, MeshLoader, Result};

/// Loads `.obj` files, or the first `.obj` inside a `.zip`.
///
/// Faces are triangulated and every model in the file is merged into one mesh.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjLoader;

impl MeshLoader for ObjLoader {
    fn load(&self, path: &Path) -> Result<Mesh> {
        if !path.is_file() {
            return Err(Error::MissingInputFile(path.to_path_buf()));
        }

        let is_zip = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        let mesh = if is_zip {
            load_zipped_obj(path)
        } else {
            load_obj_file(path)
        }
        .map_err(|reason| Error::Load {
            path: path.to_path_buf(),
            reason,
        })?;

        if mesh.vertices.is_empty() {
            return Err(Error::Load {
                path: path.to_path_buf(),
                reason: "no vertices".into(),
            });
        }

        debug!(
            "Loaded {}: {} vertices, {} faces",
            path.display(),
            mesh.vertex_count(),
            mesh.face_count()
        );

        Ok(mesh)
    }
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

fn load_obj_file(path: &Path) -> std::result::Result<Mesh, String> {
    debug!("Opening OBJ file directly");
    let (models, _materials) = tobj::load_obj(path, &load_options()).map_err(|e| e.to_string())?;
    Ok(merge_models(&models))
}

fn load_zipped_obj(path: &Path) -> std::result::Result<Mesh, String> {
    debug!("Opening ZIP archive");
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;

    let obj_name = archive
        .file_names()
        .find(|n| n.to_ascii_lowercase().ends_with(".obj"))
        .ok_or_else(|| "no .obj file found in zip archive".to_string())?
        .to_owned();

    debug!("Found OBJ file in ZIP: {}", obj_name);
    let mut bytes = Vec::new();
    archive
        .by_name(&obj_name)
        .map_err(|e| e.to_string())?
        .read_to_end(&mut bytes)
        .map_err(|e| e.to_string())?;

    // Material libraries inside archives are not needed for geometry.
    let mut reader: &[u8] = &bytes;
    let (models, _materials) = tobj::load_obj_buf(&mut reader, &load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .map_err(|e| e.to_string())?;

    Ok(merge_models(&models))
}

/// Concatenate models, offsetting each model's indices past the earlier vertices.
fn merge_models(models: &[tobj::Model]) -> Mesh {
    let mut mesh = Mesh::default();

    for model in models {
        let offset = mesh.vertices.len() as u32;
        let obj = &model.mesh;

        mesh.vertices
            .extend(obj.positions.chunks_exact(3).map(|c| [c[0], c[1], c[2]]));
        mesh.faces.extend(
            obj.indices
                .chunks_exact(3)
                .map(|c| [c[0] + offset, c[1] + offset, c[2] + offset]),
        );
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const QUAD_OBJ: &str = "\
o quad
v 0 0 0
v 2 0 0
v 2 3 0
v 0 3 1
f 1 2 3 4
";

    const TWO_OBJECTS: &str = "\
o a
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o b
v 5 5 5
v 6 5 5
v 5 6 5
f 4 5 6
";

    fn write_temp(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn quad_is_triangulated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "quad.obj", QUAD_OBJ);

        let mesh = ObjLoader.load(&path).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.max_corner(), Some([2.0, 3.0, 1.0]));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn models_are_merged_with_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "two.obj", TWO_OBJECTS);

        let mesh = ObjLoader.load(&path).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [3, 4, 5]]);
    }

    #[test]
    fn missing_file_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let err = ObjLoader.load(&dir.path().join("absent.obj")).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn obj_inside_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.zip");

        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("readme.txt", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"not a mesh").unwrap();
        zip.start_file("nested/quad.OBJ", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(QUAD_OBJ.as_bytes()).unwrap();
        zip.finish().unwrap();

        let mesh = ObjLoader.load(&path).unwrap();
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn empty_obj_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "empty.obj", "# nothing\n");

        let err = ObjLoader.load(&path).unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }
}

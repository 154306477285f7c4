use crate::error::{Error, Result};

/// A decoded triangle mesh: vertex positions plus index triples into them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Component-wise maximum over all vertices, or `None` for an empty mesh.
    pub fn max_corner(&self) -> Option<[f64; 3]> {
        let mut iter = self.vertices.iter();
        let first = *iter.next()?;

        Some(iter.fold(first, |acc, v| {
            [acc[0].max(v[0]), acc[1].max(v[1]), acc[2].max(v[2])]
        }))
    }

    /// Checks that the counts fit the fragment header and every index points at a vertex.
    pub fn validate(&self) -> Result<()> {
        if u32::try_from(self.vertices.len()).is_err() {
            return Err(Error::InvalidGeometry(format!(
                "{} vertices exceed the u32 vertex count",
                self.vertices.len()
            )));
        }

        // Each face contributes three u32 indices to the fragment.
        if self
            .faces
            .len()
            .checked_mul(3)
            .and_then(|n| u32::try_from(n).ok())
            .is_none()
        {
            return Err(Error::InvalidGeometry(format!(
                "{} faces exceed the u32 index count",
                self.faces.len()
            )));
        }

        let n = self.vertices.len() as u64;
        for (face_index, face) in self.faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&i| u64::from(i) >= n) {
                return Err(Error::InvalidGeometry(format!(
                    "face {face_index} references vertex {bad}, mesh has {n} vertices"
                )));
            }
        }

        Ok(())
    }
}

//! Legacy single-resolution mesh fragments.
//!
//! Fragment layout (little-endian, no padding, no trailer):
//!   00  : u32         num_vertices
//!   04  : f32[3] * N  vertex positions
//!   ..  : u32[3] * F  triangle vertex indices, in input order
//!
//! The face count is implied by the remaining length.

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::mesh::Mesh;

const VERTEX_BYTES: usize = 12;
const FACE_BYTES: usize = 12;

#[inline(always)]
fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(Error::MalformedFragment(format!(
            "truncated fragment: wanted {n} bytes, {} left",
            buf.len()
        )));
    }

    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[inline(always)]
fn le_u32(buf: &mut &[u8]) -> Result<u32> {
    let b = take(buf, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[inline(always)]
fn le_u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[inline(always)]
fn le_f32_at(b: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[inline]
fn write_u32<W: Write>(w: &mut W, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

#[inline]
fn write_f32<W: Write>(w: &mut W, v: f32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Encode one mesh into a fragment. Vertex coordinates are narrowed to `f32`.
pub fn encode(mesh: &Mesh) -> Result<Vec<u8>> {
    mesh.validate()?;

    let len = 4 + mesh.vertex_count() * VERTEX_BYTES + mesh.face_count() * FACE_BYTES;
    let mut out = Vec::<u8>::with_capacity(len);

    encode_into(mesh, &mut out).map_err(|e| Error::io("<fragment buffer>", e))?;

    debug_assert_eq!(out.len(), len);
    Ok(out)
}

fn encode_into<W: Write>(mesh: &Mesh, w: &mut W) -> std::io::Result<()> {
    write_u32(w, mesh.vertex_count() as u32)?;

    for v in &mesh.vertices {
        write_f32(w, v[0] as f32)?;
        write_f32(w, v[1] as f32)?;
        write_f32(w, v[2] as f32)?;
    }

    #[cfg(target_endian = "little")]
    {
        // [u32; 3] is tightly packed, so the index block is already in wire order.
        w.write_all(bytemuck::cast_slice::<[u32; 3], u8>(&mesh.faces))?;
    }

    #[cfg(not(target_endian = "little"))]
    {
        for face in &mesh.faces {
            write_u32(w, face[0])?;
            write_u32(w, face[1])?;
            write_u32(w, face[2])?;
        }
    }

    Ok(())
}

/// Parse a fragment back into a mesh. Exact inverse of [`encode`] up to `f32` rounding.
pub fn decode(mut p: &[u8]) -> Result<Mesh> {
    let count = le_u32(&mut p)? as usize;

    let vertex_bytes = count
        .checked_mul(VERTEX_BYTES)
        .ok_or_else(|| Error::MalformedFragment("vertex block size overflow".into()))?;
    let raw = take(&mut p, vertex_bytes)?;

    let vertices: Vec<[f64; 3]> = raw
        .chunks_exact(VERTEX_BYTES)
        .map(|c| {
            [
                le_f32_at(c, 0) as f64,
                le_f32_at(c, 4) as f64,
                le_f32_at(c, 8) as f64,
            ]
        })
        .collect();

    if p.len() % FACE_BYTES != 0 {
        return Err(Error::MalformedFragment(format!(
            "index block of {} bytes is not a whole number of triangles",
            p.len()
        )));
    }

    let mut faces = Vec::<[u32; 3]>::with_capacity(p.len() / FACE_BYTES);
    for (face_index, c) in p.chunks_exact(FACE_BYTES).enumerate() {
        let face = [le_u32_at(c, 0), le_u32_at(c, 4), le_u32_at(c, 8)];

        if let Some(&bad) = face.iter().find(|&&i| i as usize >= count) {
            return Err(Error::MalformedFragment(format!(
                "face {face_index} references vertex {bad}, fragment declares {count}"
            )));
        }

        faces.push(face);
    }

    Ok(Mesh { vertices, faces })
}

/// Prefer mmap; fall back to a single read.
#[cfg(feature = "mmap")]
pub fn read_fragment<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let map = unsafe { memmap2::MmapOptions::new().map(&file) }.map_err(|e| Error::io(path, e))?;
    decode(&map)
}

#[cfg(not(feature = "mmap"))]
pub fn read_fragment<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    decode(&bytes)
}

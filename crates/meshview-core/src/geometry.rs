//! Mesh decoding and normalization
//!
//! Decoding is delegated to `stl_io` (ASCII and binary STL) and `tobj`
//! (Wavefront OBJ). Both produce an indexed triangle list which is then
//! normalized the same way: vertex normals are computed when the file did
//! not carry usable ones, and the geometry is moved so that its bounding box
//! is centered on the origin.

use std::collections::HashSet;
use std::io::Cursor;
use thiserror::Error;

use crate::format::ModelFormat;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unsupported model type: {0}")]
    UnsupportedFormat(String),
    #[error("STL parse error: {0}")]
    Stl(String),
    #[error("OBJ parse error: {0}")]
    Obj(String),
    #[error("Empty mesh: no geometry found")]
    EmptyMesh,
    #[error("Index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
    #[error("Triangle list length {0} is not a multiple of 3")]
    Malformed(usize),
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    /// Smallest box containing all points, `None` for no points
    pub fn from_points(points: &[[f32; 3]]) -> Option<Self> {
        let first = *points.first()?;
        let mut min = first;
        let mut max = first;
        for p in &points[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Some(Self { min, max })
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Largest of the three extents
    pub fn max_dimension(&self) -> f32 {
        let [x, y, z] = self.size();
        x.max(y).max(z)
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals; empty until computed or when the file had none
    pub normals: Vec<[f32; 3]>,
    /// Triangle list, three indices per face
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.positions)
    }

    /// Check index range and triangle list shape
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.positions.is_empty() || self.indices.is_empty() {
            return Err(DecodeError::EmptyMesh);
        }
        if self.indices.len() % 3 != 0 {
            return Err(DecodeError::Malformed(self.indices.len()));
        }
        let vertices = self.positions.len();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(DecodeError::IndexOutOfRange { index, vertices });
        }
        Ok(())
    }

    /// Compute normals if missing, then center the geometry on the origin
    pub fn normalize(&mut self) {
        if !self.has_normals() {
            self.compute_vertex_normals();
        }
        self.center();
    }

    /// Area-weighted smooth vertex normals
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![[0.0f32; 3]; self.positions.len()];

        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let (Some(pa), Some(pb), Some(pc)) =
                (self.positions.get(a), self.positions.get(b), self.positions.get(c))
            else {
                continue;
            };
            // Cross product length is twice the face area, which weights the sum
            let face = cross(sub(*pb, *pa), sub(*pc, *pa));
            for i in [a, b, c] {
                normals[i] = add(normals[i], face);
            }
        }

        for n in &mut normals {
            *n = normalize_or_up(*n);
        }
        self.normals = normals;
    }

    /// Translate so the bounding box center sits at the origin
    pub fn center(&mut self) {
        let Some(bounds) = self.bounds() else { return };
        let c = bounds.center();
        for p in &mut self.positions {
            *p = sub(*p, c);
        }
    }

    /// Unique undirected edges as a line list (two indices per edge)
    pub fn edge_indices(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        for tri in self.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = (a.min(b), a.max(b));
                if seen.insert(key) {
                    lines.push(key.0);
                    lines.push(key.1);
                }
            }
        }
        lines
    }

    /// Append another mesh, offsetting its indices
    fn append(&mut self, other: MeshData) {
        let offset = self.positions.len() as u32;
        let keep_normals =
            (self.positions.is_empty() || self.has_normals()) && other.has_normals();
        self.positions.extend(other.positions);
        if keep_normals {
            self.normals.extend(other.normals);
        } else {
            self.normals.clear();
        }
        self.indices.extend(other.indices.into_iter().map(|i| i + offset));
    }
}

/// Decode raw model bytes with the decoder for `format`
pub fn decode(format: ModelFormat, bytes: &[u8]) -> Result<MeshData, DecodeError> {
    let mesh = match format {
        ModelFormat::Stl => decode_stl(bytes)?,
        ModelFormat::Obj => decode_obj(bytes)?,
    };
    mesh.validate()?;

    tracing::debug!(
        %format,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Decoded mesh"
    );

    Ok(mesh)
}

/// Decode using a type tag such as `"stl"`; unknown tags are an error
pub fn decode_tagged(tag: &str, bytes: &[u8]) -> Result<MeshData, DecodeError> {
    let format =
        ModelFormat::from_tag(tag).ok_or_else(|| DecodeError::UnsupportedFormat(tag.to_string()))?;
    decode(format, bytes)
}

fn decode_stl(bytes: &[u8]) -> Result<MeshData, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let stl = stl_io::read_stl(&mut cursor).map_err(|e| DecodeError::Stl(e.to_string()))?;

    let positions = stl.vertices.iter().map(|v| [v[0], v[1], v[2]]).collect();
    let indices = stl
        .faces
        .iter()
        .flat_map(|face| face.vertices.iter().map(|&i| i as u32))
        .collect();

    Ok(MeshData {
        positions,
        normals: Vec::new(),
        indices,
    })
}

fn decode_obj(bytes: &[u8]) -> Result<MeshData, DecodeError> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };

    // Material libraries are never fetched; only geometry is rendered
    let mut reader = bytes;
    let (models, _materials) =
        tobj::load_obj_buf(&mut reader, &options, |_: &std::path::Path| Ok(Default::default()))
            .map_err(|e| DecodeError::Obj(e.to_string()))?;

    let mut mesh = MeshData::default();
    for model in models {
        let m = model.mesh;
        let positions: Vec<[f32; 3]> = m
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        let normals: Vec<[f32; 3]> = if m.normals.len() == m.positions.len() {
            m.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect()
        } else {
            Vec::new()
        };
        mesh.append(MeshData {
            positions,
            normals,
            indices: m.indices,
        });
    }

    Ok(mesh)
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize_or_up(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > f32::EPSILON {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA_STL: &str = "solid tetra
facet normal 0 0 -1
  outer loop
    vertex 0 0 0
    vertex 0 1 0
    vertex 1 0 0
  endloop
endfacet
facet normal 0 -1 0
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 0 1
  endloop
endfacet
facet normal -1 0 0
  outer loop
    vertex 0 0 0
    vertex 0 0 1
    vertex 0 1 0
  endloop
endfacet
facet normal 1 1 1
  outer loop
    vertex 1 0 0
    vertex 0 1 0
    vertex 0 0 1
  endloop
endfacet
endsolid tetra
";

    const QUAD_OBJ: &str = "o quad
v 0 0 0
v 4 0 0
v 4 2 0
v 0 2 0
f 1 2 3 4
";

    fn binary_stl(triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut out = vec![0u8; 80];
        out.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for tri in triangles {
            for _ in 0..3 {
                out.extend_from_slice(&0f32.to_le_bytes());
            }
            for v in tri {
                for c in v {
                    out.extend_from_slice(&c.to_le_bytes());
                }
            }
            out.extend_from_slice(&[0, 0]);
        }
        out
    }

    #[test]
    fn test_decode_ascii_stl() {
        let mesh = decode(ModelFormat::Stl, TETRA_STL.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 4);
        assert!(!mesh.has_normals());
    }

    #[test]
    fn test_decode_binary_stl() {
        let bytes = binary_stl(&[[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]]);
        let mesh = decode(ModelFormat::Stl, &bytes).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.size(), [2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_decode_obj_triangulates() {
        let mesh = decode(ModelFormat::Obj, QUAD_OBJ.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_decode_obj_merges_objects() {
        let obj = format!("{}o second\nv 10 0 0\nv 11 0 0\nv 10 1 0\nf 5 6 7\n", QUAD_OBJ);
        let mesh = decode(ModelFormat::Obj, obj.as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 3);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode_tagged("ply", b"ply"),
            Err(DecodeError::UnsupportedFormat("ply".to_string()))
        );
        assert_eq!(decode(ModelFormat::Obj, b"# nothing here\n"), Err(DecodeError::EmptyMesh));
        assert!(decode(ModelFormat::Stl, b"\x00\x01garbage").is_err());
    }

    #[test]
    fn test_normalize_centers_and_computes_normals() {
        let mut mesh = decode(ModelFormat::Obj, QUAD_OBJ.as_bytes()).unwrap();
        mesh.normalize();

        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.center(), [0.0, 0.0, 0.0]);
        assert_eq!(bounds.min, [-2.0, -1.0, 0.0]);
        assert_eq!(mesh.normals.len(), 4);
        for n in &mesh.normals {
            assert!((n[2].abs() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_keeps_file_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 1 0 0\nf 1//1 2//1 3//1\n";
        let mut mesh = decode(ModelFormat::Obj, obj.as_bytes()).unwrap();
        assert!(mesh.has_normals());
        mesh.normalize();
        assert!(mesh.normals.iter().all(|n| *n == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_edge_indices_deduplicates_shared_edges() {
        let mesh = decode(ModelFormat::Obj, QUAD_OBJ.as_bytes()).unwrap();
        // Two triangles sharing the diagonal: 4 outer edges + 1 diagonal
        assert_eq!(mesh.edge_indices().len(), 5 * 2);

        let tetra = decode(ModelFormat::Stl, TETRA_STL.as_bytes()).unwrap();
        assert_eq!(tetra.edge_indices().len(), 6 * 2);
    }

    #[test]
    fn test_validate_index_range() {
        let mesh = MeshData {
            positions: vec![[0.0; 3]; 3],
            normals: Vec::new(),
            indices: vec![0, 1, 3],
        };
        assert_eq!(
            mesh.validate(),
            Err(DecodeError::IndexOutOfRange {
                index: 3,
                vertices: 3
            })
        );
    }
}

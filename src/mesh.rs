//! Mesh storage and loading.
//!
//! A [`Mesh`] owns an interleaved `[x, y, z, nx, ny, nz]` vertex buffer and
//! an index buffer, the exact layout a draw call consumes through
//! [`VertexInput`]. OBJ files are loaded via `tobj`; a built-in cube is
//! provided so demos and tests need no assets.

use std::fmt;

use crate::math::Vec3;
use crate::render::VertexInput;

/// Floats per vertex: position followed by normal.
pub const VERTEX_STRIDE: usize = 6;

#[derive(Debug)]
pub enum LoadError {
    Tobj(tobj::LoadError),
    NoModels,
    NoVertices,
    InvalidFaces,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Tobj(e) => write!(f, "failed to load OBJ: {}", e),
            LoadError::NoModels => write!(f, "OBJ file contains no models"),
            LoadError::NoVertices => write!(f, "mesh has no vertices"),
            LoadError::InvalidFaces => write!(f, "face indices not divisible by 3"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Tobj(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tobj::LoadError> for LoadError {
    fn from(e: tobj::LoadError) -> Self {
        LoadError::Tobj(e)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

impl Mesh {
    pub fn from_obj(file_path: &str) -> Result<Self, LoadError> {
        let (models, _materials) = tobj::load_obj(file_path, &tobj::GPU_LOAD_OPTIONS)?;

        // For now we only support a single model per file.
        let model = models.into_iter().next().ok_or(LoadError::NoModels)?;
        let mesh = model.mesh;

        if mesh.positions.is_empty() {
            return Err(LoadError::NoVertices);
        }
        if mesh.indices.len() % 3 != 0 {
            return Err(LoadError::InvalidFaces);
        }

        // OBJ files are free to omit normals; derive smooth ones then.
        let normals = if mesh.normals.len() == mesh.positions.len() {
            mesh.normals
        } else {
            vertex_normals(&mesh.positions, &mesh.indices)
        };

        let vertices = mesh
            .positions
            .chunks_exact(3)
            .zip(normals.chunks_exact(3))
            .flat_map(|(p, n)| [p[0], p[1], p[2], n[0], n[1], n[2]])
            .collect();

        log::debug!(
            "loaded {}: {} vertices, {} triangles",
            file_path,
            mesh.positions.len() / 3,
            mesh.indices.len() / 3
        );

        Ok(Self {
            vertices,
            indices: mesh.indices,
        })
    }

    /// A unit cube around the origin with per-face normals, wound so every
    /// outward face survives back-face culling.
    pub fn cube() -> Self {
        // Quad corners listed so that (w2 - w1) x (w3 - w1) points inward,
        // the orientation the screen-space cull expects for outward faces.
        const FACES: [(Vec3, [Vec3; 4]); 6] = [
            (
                Vec3::new(0.0, 0.0, -1.0),
                [
                    Vec3::new(-1.0, -1.0, -1.0),
                    Vec3::new(1.0, -1.0, -1.0),
                    Vec3::new(1.0, 1.0, -1.0),
                    Vec3::new(-1.0, 1.0, -1.0),
                ],
            ),
            (
                Vec3::new(0.0, 0.0, 1.0),
                [
                    Vec3::new(1.0, -1.0, 1.0),
                    Vec3::new(-1.0, -1.0, 1.0),
                    Vec3::new(-1.0, 1.0, 1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                ],
            ),
            (
                Vec3::new(-1.0, 0.0, 0.0),
                [
                    Vec3::new(-1.0, -1.0, 1.0),
                    Vec3::new(-1.0, -1.0, -1.0),
                    Vec3::new(-1.0, 1.0, -1.0),
                    Vec3::new(-1.0, 1.0, 1.0),
                ],
            ),
            (
                Vec3::new(1.0, 0.0, 0.0),
                [
                    Vec3::new(1.0, -1.0, -1.0),
                    Vec3::new(1.0, -1.0, 1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                    Vec3::new(1.0, 1.0, -1.0),
                ],
            ),
            (
                Vec3::new(0.0, 1.0, 0.0),
                [
                    Vec3::new(-1.0, 1.0, -1.0),
                    Vec3::new(1.0, 1.0, -1.0),
                    Vec3::new(1.0, 1.0, 1.0),
                    Vec3::new(-1.0, 1.0, 1.0),
                ],
            ),
            (
                Vec3::new(0.0, -1.0, 0.0),
                [
                    Vec3::new(-1.0, -1.0, 1.0),
                    Vec3::new(1.0, -1.0, 1.0),
                    Vec3::new(1.0, -1.0, -1.0),
                    Vec3::new(-1.0, -1.0, -1.0),
                ],
            ),
        ];

        let mut vertices = Vec::with_capacity(FACES.len() * 4 * VERTEX_STRIDE);
        let mut indices = Vec::with_capacity(FACES.len() * 6);

        for (face, (normal, corners)) in FACES.iter().enumerate() {
            let base = (face * 4) as u32;
            for corner in corners {
                vertices.extend_from_slice(&[
                    corner.x, corner.y, corner.z, normal.x, normal.y, normal.z,
                ]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self { vertices, indices }
    }

    pub fn vertex_input(&self) -> VertexInput<'_> {
        VertexInput::new(&self.vertices, &self.indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Smooth per-vertex normals: area-weighted face normals accumulated at
/// each vertex, then normalized.
fn vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex = |i: usize| Vec3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]);

    let mut sums = vec![Vec3::ZERO; positions.len() / 3];
    for triple in indices.chunks_exact(3) {
        let (a, b, c) = (triple[0] as usize, triple[1] as usize, triple[2] as usize);
        let face = (vertex(b) - vertex(a)).cross(vertex(c) - vertex(a));
        sums[a] = sums[a] + face;
        sums[b] = sums[b] + face;
        sums[c] = sums[c] + face;
    }

    sums.into_iter()
        .flat_map(|n| {
            let n = if n.magnitude() > 0.0 {
                n.normalize()
            } else {
                Vec3::FORWARD
            };
            [n.x, n.y, n.z]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cube_has_four_vertices_per_face() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
    }

    #[test]
    fn cube_normals_are_unit_and_axis_aligned() {
        let cube = Mesh::cube();
        for chunk in cube.vertices.chunks_exact(VERTEX_STRIDE) {
            let n = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert_relative_eq!(n.magnitude(), 1.0, epsilon = 1e-6);
            assert_eq!(n.x.abs() + n.y.abs() + n.z.abs(), 1.0);
        }
    }

    #[test]
    fn derived_normals_match_the_face_plane() {
        // A single triangle in the xy plane: every normal is +-z.
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let indices = [0, 1, 2];
        let normals = vertex_normals(&positions, &indices);
        for n in normals.chunks_exact(3) {
            assert_relative_eq!(n[0], 0.0);
            assert_relative_eq!(n[1], 0.0);
            assert_relative_eq!(n[2].abs(), 1.0, epsilon = 1e-6);
        }
    }
}

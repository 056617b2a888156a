//! Polygon mesh data for the host scene model.
//!
//! Meshes keep USD's polygon layout (per-face vertex counts plus a flat
//! corner index list) so they can be written back without re-triangulating.

use usdio_math::Vec3;

use crate::scene::MaterialId;

/// A polygon mesh with optional normals and UVs.
///
/// Normals and UVs are either per vertex or per face corner; which one is
/// decided by their length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Number of corners of each face
    pub face_vertex_counts: Vec<u32>,

    /// Vertex index of every face corner, face after face
    pub face_vertex_indices: Vec<u32>,

    /// Normals, per vertex or per corner
    pub normals: Option<Vec<Vec3>>,

    /// UV coordinates, per vertex or per corner
    pub uvs: Option<Vec<[f32; 2]>>,

    /// Assigned material
    pub material: Option<MaterialId>,
}

impl Mesh {
    /// Create a new mesh from positions and polygon topology.
    pub fn new(positions: Vec<Vec3>, face_vertex_counts: Vec<u32>, face_vertex_indices: Vec<u32>) -> Self {
        Self {
            positions,
            face_vertex_counts,
            face_vertex_indices,
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }

    pub fn corner_count(&self) -> usize {
        self.face_vertex_indices.len()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Whether normals are stored per face corner rather than per vertex.
    pub fn normals_are_face_varying(&self) -> bool {
        matches!(&self.normals, Some(n) if n.len() == self.corner_count() && n.len() != self.vertex_count())
    }

    /// Whether UVs are stored per face corner rather than per vertex.
    pub fn uvs_are_face_varying(&self) -> bool {
        matches!(&self.uvs, Some(uv) if uv.len() == self.corner_count() && uv.len() != self.vertex_count())
    }

    /// Same face layout and corner indices as `other`.
    pub fn topology_matches(&self, other: &Mesh) -> bool {
        self.positions.len() == other.positions.len()
            && self.face_vertex_counts == other.face_vertex_counts
            && self.face_vertex_indices == other.face_vertex_indices
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Triangulate the polygons and return triangle corner indices.
    ///
    /// Faces with more than three corners are split with fan triangulation.
    pub fn triangulate(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        let mut offset = 0usize;

        for &count in &self.face_vertex_counts {
            let count = count as usize;
            if count >= 3 && offset + count <= self.face_vertex_indices.len() {
                // Fan triangulation: (0,1,2), (0,2,3), ... (0,n-2,n-1)
                for i in 1..(count - 1) {
                    indices.push(self.face_vertex_indices[offset]);
                    indices.push(self.face_vertex_indices[offset + i]);
                    indices.push(self.face_vertex_indices[offset + i + 1]);
                }
            }
            offset += count;
        }

        indices
    }

    pub fn triangle_count(&self) -> usize {
        self.face_vertex_counts
            .iter()
            .map(|&c| (c as usize).saturating_sub(2))
            .sum()
    }

    /// Reverse the corner order of every face (left-handed to right-handed).
    pub fn flip_winding(&mut self) {
        let normals_per_corner = self.normals_are_face_varying();
        let uvs_per_corner = self.uvs_are_face_varying();
        let mut offset = 0usize;
        for &count in &self.face_vertex_counts {
            let end = (offset + count as usize).min(self.face_vertex_indices.len());
            self.face_vertex_indices[offset..end].reverse();
            if let (true, Some(normals)) = (normals_per_corner, self.normals.as_mut()) {
                normals[offset..end].reverse();
            }
            if let (true, Some(uvs)) = (uvs_per_corner, self.uvs.as_mut()) {
                uvs[offset..end].reverse();
            }
            offset = end;
        }
    }

    /// Drop faces that reference missing vertices or have fewer than three
    /// corners. Returns `true` when anything was removed.
    ///
    /// Per-corner attributes are dropped if faces were removed.
    pub fn validate(&mut self) -> bool {
        let vertex_count = self.positions.len() as u32;
        let mut counts = Vec::with_capacity(self.face_vertex_counts.len());
        let mut indices = Vec::with_capacity(self.face_vertex_indices.len());
        let mut offset = 0usize;
        let mut changed = false;

        for &count in &self.face_vertex_counts {
            let end = offset + count as usize;
            let corners = self.face_vertex_indices.get(offset..end);
            match corners {
                Some(c) if count >= 3 && c.iter().all(|&i| i < vertex_count) => {
                    counts.push(count);
                    indices.extend_from_slice(c);
                }
                _ => changed = true,
            }
            offset = end;
        }
        if offset != self.face_vertex_indices.len() {
            changed = true;
        }

        if changed {
            if self.normals_are_face_varying() {
                self.normals = None;
            }
            if self.uvs_are_face_varying() {
                self.uvs = None;
            }
            self.face_vertex_counts = counts;
            self.face_vertex_indices = indices;
        }
        changed
    }
}

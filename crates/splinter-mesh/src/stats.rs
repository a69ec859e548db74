use splinter_core::FaceDirection;

use crate::buffers::MeshBuffers;
use crate::quad::Quad;

/// Statistics about a mesh result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshStats {
    /// Total number of quads generated
    pub quad_count: usize,
    /// Quads per face direction, indexed by [`FaceDirection::index`]
    pub quads_per_face: [usize; 6],
    /// Visible unit faces before merging
    pub exposed_faces: usize,
    /// Total vertices
    pub vertex_count: usize,
    /// Total triangles
    pub triangle_count: usize,
    /// Merge efficiency (1.0 = perfect merging, 0.0 = no merging)
    pub merge_efficiency: f32,
}

impl MeshStats {
    pub(crate) fn collect(quads: &[Quad], exposed_faces: usize, buffers: &MeshBuffers) -> Self {
        let mut quads_per_face = [0; 6];
        for quad in quads {
            quads_per_face[quad.direction.index()] += 1;
        }
        let merge_efficiency = if exposed_faces > 0 {
            1.0 - (quads.len() as f32 / exposed_faces as f32)
        } else {
            0.0
        };
        Self {
            quad_count: quads.len(),
            quads_per_face,
            exposed_faces,
            vertex_count: buffers.vertex_count(),
            triangle_count: buffers.triangle_count(),
            merge_efficiency,
        }
    }

    /// Quads emitted for one direction.
    pub fn quads_facing(&self, direction: FaceDirection) -> usize {
        self.quads_per_face[direction.index()]
    }
}

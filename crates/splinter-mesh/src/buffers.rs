//! Output buffers and quad expansion.

use glam::{UVec3, Vec3};
use hashbrown::HashMap;
use splinter_core::Aabb;

use crate::quad::Quad;

/// How quad corners become vertices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VertexSharing {
    /// Four fresh vertices per quad. Normals are recomputed from geometry.
    #[default]
    PerQuad,
    /// Up to eight corner vertices cached per seed voxel and reused by quads
    /// of other directions that land on the same corner with the same
    /// extents. No normals are produced.
    SharedCorners,
}

/// Renderable mesh data. Always rebuilt from scratch, never patched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    /// Vertex positions in mesh space.
    pub positions: Vec<Vec3>,
    /// Per-vertex RGBA, alpha always 255.
    pub colors: Vec<[u8; 4]>,
    /// Per-vertex normals. Empty for [`VertexSharing::SharedCorners`].
    pub normals: Vec<Vec3>,
    /// Triangle indices, three per triangle.
    pub indices: Vec<u32>,
    /// Bounds of all positions, `None` for an empty mesh.
    pub bounds: Option<Aabb>,
}

impl MeshBuffers {
    /// Pre-allocate capacity for an estimated quad count.
    pub fn with_capacity(quads: usize) -> Self {
        Self {
            positions: Vec::with_capacity(quads * 4),
            colors: Vec::with_capacity(quads * 4),
            normals: Vec::new(),
            indices: Vec::with_capacity(quads * 6),
            bounds: None,
        }
    }

    /// Number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Clear all mesh data.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.normals.clear();
        self.indices.clear();
        self.bounds = None;
    }

    /// Positions as a flat float slice for upload.
    pub fn position_data(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Colors as a flat byte slice for upload.
    pub fn color_data(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// Recompute smooth vertex normals by accumulating triangle normals.
    pub fn recompute_normals(&mut self) {
        self.normals.clear();
        self.normals.resize(self.positions.len(), Vec3::ZERO);
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let face = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            self.normals[a] += face;
            self.normals[b] += face;
            self.normals[c] += face;
        }
        for normal in &mut self.normals {
            *normal = normal.normalize_or_zero();
        }
    }

    /// Recompute the bounding box.
    pub fn recompute_bounds(&mut self) {
        self.bounds = Aabb::from_points(self.positions.iter().copied());
    }

    /// Build buffers from merged quads.
    pub fn from_quads(quads: &[Quad], sharing: VertexSharing) -> Self {
        let mut buffers = Self::with_capacity(quads.len());
        match sharing {
            VertexSharing::PerQuad => {
                for quad in quads {
                    let base = buffers.positions.len() as u32;
                    let rgba = quad.color.to_rgba();
                    buffers.positions.extend(quad.corners());
                    buffers.colors.extend([rgba; 4]);
                    buffers
                        .indices
                        .extend(Quad::triangle_order(quad.direction).map(|i| base + i));
                }
                buffers.recompute_normals();
            }
            VertexSharing::SharedCorners => {
                let mut cache = CornerCache::default();
                for quad in quads {
                    let low = quad.cell.as_vec3() - Vec3::ONE;
                    let rgba = quad.color.to_rgba();
                    let corners = quad.corner_stretches().map(|stretch| {
                        cache.resolve(quad.cell, stretch, || {
                            let index = buffers.positions.len() as u32;
                            buffers.positions.push(low + stretch.as_vec3());
                            buffers.colors.push(rgba);
                            index
                        })
                    });
                    buffers.indices.extend(
                        Quad::triangle_order(quad.direction).map(|i| corners[i as usize]),
                    );
                }
            }
        }
        buffers.recompute_bounds();
        buffers
    }
}

#[derive(Clone, Copy, Debug)]
struct CornerSlot {
    index: u32,
    stretch: UVec3,
}

/// Per-voxel corner vertices, keyed by seed cell and cube corner.
///
/// A slot remembers the extents it was built under. A quad that reaches the
/// same cube corner with different extents lands somewhere else in space, so
/// it gets a fresh vertex and takes over the slot.
#[derive(Default)]
struct CornerCache {
    slots: HashMap<(UVec3, u8), CornerSlot>,
}

impl CornerCache {
    fn resolve(&mut self, cell: UVec3, stretch: UVec3, alloc: impl FnOnce() -> u32) -> u32 {
        let corner =
            u8::from(stretch.x > 0) | u8::from(stretch.y > 0) << 1 | u8::from(stretch.z > 0) << 2;
        match self.slots.get(&(cell, corner)) {
            Some(slot) if slot.stretch == stretch => slot.index,
            _ => {
                let index = alloc();
                self.slots.insert((cell, corner), CornerSlot { index, stretch });
                index
            }
        }
    }
}

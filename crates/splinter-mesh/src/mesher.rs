//! Greedy mesher entry points.

use rayon::prelude::*;
use splinter_core::{spawn_pass, CancelToken, FaceDirection, PassHandle, VoxelGrid};

use crate::buffers::{MeshBuffers, VertexSharing};
use crate::quad::{merge_direction, Quad};
use crate::stats::MeshStats;

/// Turns a [`VoxelGrid`] into a minimal set of colored quads.
///
/// The mesher is stateless apart from its vertex policy; every call works on a
/// private copy of the grid, so the input is never touched and concurrent calls
/// on the same grid are fine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GreedyMesher {
    sharing: VertexSharing,
}

impl GreedyMesher {
    pub const fn new(sharing: VertexSharing) -> Self {
        Self { sharing }
    }

    pub const fn sharing(&self) -> VertexSharing {
        self.sharing
    }

    /// Merged quads for all six directions, in direction then scan order.
    pub fn quads(&self, grid: &VoxelGrid) -> Vec<Quad> {
        merge_all(grid, None).map(|(quads, _)| quads).unwrap_or_default()
    }

    /// Mesh a grid.
    pub fn generate(&self, grid: &VoxelGrid) -> MeshBuffers {
        self.generate_with_stats(grid).0
    }

    /// Mesh a grid and report merge statistics.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn generate_with_stats(&self, grid: &VoxelGrid) -> (MeshBuffers, MeshStats) {
        let Some((quads, exposed)) = merge_all(grid, None) else {
            return (MeshBuffers::default(), MeshStats::default());
        };
        let buffers = {
            let _span = tracing::trace_span!("mesh.expand", quads = quads.len()).entered();
            MeshBuffers::from_quads(&quads, self.sharing)
        };
        let stats = MeshStats::collect(&quads, exposed, &buffers);
        tracing::debug!(
            size = %grid.size(),
            quads = stats.quad_count,
            exposed = stats.exposed_faces,
            vertices = stats.vertex_count,
            "meshed grid"
        );
        (buffers, stats)
    }

    /// Mesh a grid, giving up between slices once `cancel` fires.
    pub fn generate_cancellable(
        &self,
        grid: &VoxelGrid,
        cancel: &CancelToken,
    ) -> Option<MeshBuffers> {
        let (quads, _) = merge_all(grid, Some(cancel))?;
        Some(MeshBuffers::from_quads(&quads, self.sharing))
    }

    /// Mesh many grids in parallel.
    pub fn generate_batch(&self, grids: &[VoxelGrid]) -> Vec<MeshBuffers> {
        grids.par_iter().map(|grid| self.generate(grid)).collect()
    }

    /// Mesh a grid on the worker pool.
    pub fn spawn_generate(&self, grid: VoxelGrid, cancel: CancelToken) -> PassHandle<MeshBuffers> {
        let mesher = *self;
        spawn_pass("mesh", cancel, move |token| {
            mesher.generate_cancellable(&grid, token)
        })
    }
}

fn merge_all(grid: &VoxelGrid, cancel: Option<&CancelToken>) -> Option<(Vec<Quad>, usize)> {
    let _span = tracing::trace_span!("mesh.merge").entered();
    let mut quads = Vec::new();
    if grid.is_empty() {
        return Some((quads, 0));
    }

    let mut scratch = grid.copy();
    scratch.clear_face_flags();
    let mut exposed = 0;
    for direction in FaceDirection::ALL {
        exposed += merge_direction(&mut scratch, direction, cancel, &mut quads)?;
    }
    Some((quads, exposed))
}

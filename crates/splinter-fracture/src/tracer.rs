//! 26-connected flood fill over voxel grids.
//!
//! Traversal is iterative with an explicit stack, so a component spanning the
//! whole grid costs heap, not call-stack depth. Cells are zeroed as they are
//! pushed; callers that still need the grid afterwards pass a copy.

use glam::{IVec3, UVec3};
use splinter_core::constants::NEIGHBORHOOD_26;
use splinter_core::{CancelToken, VoxelCode, VoxelGrid};

/// Offsets to every cell of the 3x3x3 cube except the center.
pub const NEIGHBOR_OFFSETS: [IVec3; NEIGHBORHOOD_26] = neighbor_offsets();

const fn neighbor_offsets() -> [IVec3; NEIGHBORHOOD_26] {
    let mut out = [IVec3::ZERO; NEIGHBORHOOD_26];
    let mut i = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if dx != 0 || dy != 0 || dz != 0 {
                    out[i] = IVec3::new(dx, dy, dz);
                    i += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
}

/// Pops between cancellation checks inside a single traversal.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// One voxel collected by a traversal. Face state is stripped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TracedVoxel {
    pub position: UVec3,
    pub code: VoxelCode,
}

/// Voxels collected by one traversal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelCluster {
    pub voxels: Vec<TracedVoxel>,
}

impl VoxelCluster {
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Inclusive cell bounds, `None` for an empty cluster.
    pub fn bounds(&self) -> Option<(UVec3, UVec3)> {
        let first = self.voxels.first()?.position;
        Some(self.voxels.iter().fold((first, first), |(min, max), v| {
            (min.min(v.position), max.max(v.position))
        }))
    }
}

/// Flood-fill engine. Keeps its stack between calls to avoid reallocating.
#[derive(Debug, Default)]
pub struct ConnectivityTracer {
    stack: Vec<UVec3>,
}

impl ConnectivityTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the component containing the first occupied cell in linear
    /// order. Zeroes that component. An empty grid gives 0.
    pub fn size_of(&mut self, grid: &mut VoxelGrid) -> usize {
        self.size_of_inner(grid, None).unwrap_or_default()
    }

    /// [`Self::size_of`] that gives up with `None` once `cancel` fires.
    pub fn size_of_cancellable(
        &mut self,
        grid: &mut VoxelGrid,
        cancel: &CancelToken,
    ) -> Option<usize> {
        self.size_of_inner(grid, Some(cancel))
    }

    fn size_of_inner(
        &mut self,
        grid: &mut VoxelGrid,
        cancel: Option<&CancelToken>,
    ) -> Option<usize> {
        let Some(start) = grid.codes().iter().position(|c| c.is_occupied()) else {
            return Some(0);
        };
        let start = grid.position(start);
        self.trace(grid, start, None, cancel, |_| {})
    }

    /// Split all occupied voxels into traversal clusters, zeroing the grid.
    ///
    /// Without a cap each cluster is one 26-connected component. With
    /// `max_per_cluster` a traversal stops growing at the cap and the rest of
    /// its component is picked up by later clusters. Either way every occupied
    /// voxel lands in exactly one cluster.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn extract_clusters(
        &mut self,
        grid: &mut VoxelGrid,
        max_per_cluster: Option<usize>,
    ) -> Vec<VoxelCluster> {
        self.extract_inner(grid, max_per_cluster, None)
            .unwrap_or_default()
    }

    /// [`Self::extract_clusters`] that gives up with `None` once `cancel` fires.
    pub fn extract_clusters_cancellable(
        &mut self,
        grid: &mut VoxelGrid,
        max_per_cluster: Option<usize>,
        cancel: &CancelToken,
    ) -> Option<Vec<VoxelCluster>> {
        self.extract_inner(grid, max_per_cluster, Some(cancel))
    }

    fn extract_inner(
        &mut self,
        grid: &mut VoxelGrid,
        max_per_cluster: Option<usize>,
        cancel: Option<&CancelToken>,
    ) -> Option<Vec<VoxelCluster>> {
        let cap = max_per_cluster.map(|c| c.max(1));
        let mut clusters = Vec::new();
        let mut next = 0;
        while let Some(offset) = grid.codes()[next..].iter().position(|c| c.is_occupied()) {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            let index = next + offset;
            let start = grid.position(index);
            let mut cluster = VoxelCluster::default();
            self.trace(grid, start, cap, cancel, |voxel| {
                cluster.voxels.push(voxel);
            })?;
            clusters.push(cluster);
            next = index + 1;
        }
        tracing::trace!(clusters = clusters.len(), "extracted clusters");
        Some(clusters)
    }

    /// Destructive traversal from an occupied `start`. Returns the number of
    /// cells visited.
    fn trace(
        &mut self,
        grid: &mut VoxelGrid,
        start: UVec3,
        cap: Option<usize>,
        cancel: Option<&CancelToken>,
        mut visit: impl FnMut(TracedVoxel),
    ) -> Option<usize> {
        let mut take = |grid: &mut VoxelGrid, index: usize, position: UVec3| {
            let code = grid.codes()[index];
            grid.codes_mut()[index] = VoxelCode::EMPTY;
            visit(TracedVoxel {
                position,
                code: code.without_faces(),
            });
        };

        self.stack.clear();
        let start_index = grid.index(start);
        take(grid, start_index, start);
        self.stack.push(start);
        let mut count = 1;
        let mut pops = 0;

        'traverse: while let Some(pos) = self.stack.pop() {
            pops += 1;
            if pops % CANCEL_CHECK_INTERVAL == 0 && cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            for offset in NEIGHBOR_OFFSETS {
                if cap.is_some_and(|cap| count >= cap) {
                    break 'traverse;
                }
                let neighbor = pos.as_ivec3() + offset;
                let Some(index) = grid.index_checked(neighbor) else {
                    continue;
                };
                if grid.codes()[index].is_empty() {
                    continue;
                }
                let neighbor = neighbor.as_uvec3();
                take(grid, index, neighbor);
                self.stack.push(neighbor);
                count += 1;
            }
        }
        Some(count)
    }
}

/// Size of the first component without modifying `grid`.
pub fn connected_size(grid: &VoxelGrid) -> usize {
    ConnectivityTracer::new().size_of(&mut grid.copy())
}

/// Clusters of `grid` without modifying it.
pub fn components(grid: &VoxelGrid, max_per_cluster: Option<usize>) -> Vec<VoxelCluster> {
    ConnectivityTracer::new().extract_clusters(&mut grid.copy(), max_per_cluster)
}

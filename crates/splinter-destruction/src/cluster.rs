//! Structural clusters: one grid plus its place in the world.

use std::fmt;

use glam::{IVec3, UVec3, Vec3};
use serde::{Deserialize, Serialize};
use splinter_core::{cell_center, Aabb, FaceDirection, Placement, VoxelGrid};

/// Stable handle to a cluster in a [`DestructionGraph`](crate::DestructionGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterState {
    #[default]
    Intact,
    Collapsed,
}

/// Permanent adjacency between two clusters found by the bake.
///
/// Stored with `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterConnection {
    pub a: ClusterId,
    pub b: ClusterId,
}

impl ClusterConnection {
    pub fn new(a: ClusterId, b: ClusterId) -> Self {
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }

    /// The endpoint that is not `id`.
    pub fn other(&self, id: ClusterId) -> ClusterId {
        if self.a == id {
            self.b
        } else {
            self.a
        }
    }
}

/// A destructible unit: a voxel grid placed in world space.
#[derive(Clone, Debug)]
pub struct Cluster {
    pub(crate) id: ClusterId,
    pub(crate) grid: VoxelGrid,
    pub(crate) placement: Placement,
    pub(crate) state: ClusterState,
    /// Authored permanent anchor, independent of joints.
    pub(crate) anchored: bool,
    /// Anchored, or held by at least one joint.
    pub(crate) fixed: bool,
    pub(crate) original_voxel_count: usize,
}

impl Cluster {
    pub(crate) fn new(id: ClusterId, grid: VoxelGrid, placement: Placement) -> Self {
        let original_voxel_count = grid.occupied_count();
        Self {
            id,
            grid,
            placement,
            state: ClusterState::Intact,
            anchored: false,
            fixed: false,
            original_voxel_count,
        }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    pub fn is_collapsed(&self) -> bool {
        self.state == ClusterState::Collapsed
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Voxel count when the cluster was created.
    pub fn original_voxel_count(&self) -> usize {
        self.original_voxel_count
    }

    /// False once the grid has been disposed.
    pub fn has_grid(&self) -> bool {
        self.grid.len() > 0
    }

    /// World-space bounds of the whole grid volume.
    pub fn world_bounds(&self) -> Aabb {
        self.placement.world_bounds(self.grid.size())
    }

    /// World-space centers of the shell voxels.
    pub fn shell_centers(&self) -> Vec<Vec3> {
        shell_voxels(&self.grid)
            .into_iter()
            .map(|cell| self.placement.transform_point(cell_center(cell)))
            .collect()
    }

    pub(crate) fn dispose(&mut self) {
        self.grid.dispose();
    }
}

/// Occupied cells that are not inner cells.
///
/// An inner cell has all six face neighbors occupied and cannot touch
/// anything outside its own grid.
pub fn shell_voxels(grid: &VoxelGrid) -> Vec<UVec3> {
    grid.iter_occupied()
        .filter(|(pos, _)| {
            let pos: IVec3 = pos.as_ivec3();
            FaceDirection::ALL
                .iter()
                .any(|d| !grid.is_occupied(pos + d.offset()))
        })
        .map(|(pos, _)| pos)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use splinter_core::{Color, VoxelCode};

    #[test]
    fn connection_is_normalized() {
        let c = ClusterConnection::new(ClusterId(5), ClusterId(2));
        assert_eq!(c.a, ClusterId(2));
        assert_eq!(c.other(ClusterId(2)), ClusterId(5));
        assert_eq!(c, ClusterConnection::new(ClusterId(2), ClusterId(5)));
    }

    #[test]
    fn solid_cube_shell_skips_center() {
        let mut grid = VoxelGrid::new(3, 3, 3);
        grid.fill_box(IVec3::ZERO, IVec3::splat(2), VoxelCode::from_color(Color::WHITE));
        let shell = shell_voxels(&grid);
        assert_eq!(shell.len(), 26);
        assert!(!shell.contains(&UVec3::ONE));
    }

    #[test]
    fn disposed_cluster_has_no_grid() {
        let mut grid = VoxelGrid::new(1, 1, 1);
        grid.set(IVec3::ZERO, VoxelCode::from_color(Color::WHITE));
        let mut cluster = Cluster::new(ClusterId(0), grid, Placement::default());
        assert!(cluster.has_grid());
        assert_eq!(cluster.original_voxel_count(), 1);
        cluster.dispose();
        assert!(!cluster.has_grid());
        assert!(cluster.shell_centers().is_empty());
    }
}

//! Spherical voxel removal and post-hoc fragment splitting.

use std::cmp::Reverse;
use std::fmt;

use glam::{DVec3, IVec3, UVec3};
use rayon::prelude::*;
use splinter_core::{Color, VoxelCode, VoxelGrid};

use crate::tracer::{ConnectivityTracer, VoxelCluster};

/// A voxel removed by damage, for debris effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RemovedVoxel {
    pub position: UVec3,
    pub color: Color,
}

/// A disconnected piece of a grid, cropped to its own bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub grid: VoxelGrid,
    /// Cell of the source grid that this fragment's `(0, 0, 0)` came from.
    pub origin: UVec3,
    pub voxel_count: usize,
}

impl Fragment {
    fn from_cluster(cluster: &VoxelCluster) -> Option<Self> {
        let (min, max) = cluster.bounds()?;
        let size = max - min + UVec3::ONE;
        let mut grid = VoxelGrid::new(size.x, size.y, size.z);
        for voxel in &cluster.voxels {
            grid.set((voxel.position - min).as_ivec3(), voxel.code);
        }
        Some(Self {
            grid,
            origin: min,
            voxel_count: cluster.len(),
        })
    }
}

/// Everything one damage event produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FractureOutcome {
    pub removed: Vec<RemovedVoxel>,
    /// Pieces of the damaged grid, largest first. Empty when nothing was
    /// removed or nothing is left.
    pub fragments: Vec<Fragment>,
}

/// Removes voxels in a region and splits what is left into fragments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FractureSplitter {
    max_fragment_voxels: Option<usize>,
}

impl FractureSplitter {
    pub const fn new() -> Self {
        Self {
            max_fragment_voxels: None,
        }
    }

    /// Cap the voxel count of a single fragment. Larger components are cut
    /// into several traversal-sized pieces.
    #[must_use]
    pub const fn with_max_fragment_voxels(mut self, max: Option<usize>) -> Self {
        self.max_fragment_voxels = max;
        self
    }

    pub const fn max_fragment_voxels(&self) -> Option<usize> {
        self.max_fragment_voxels
    }

    /// Remove every occupied voxel whose cell lies within `radius` cells of
    /// `center`, compared as squared distance between cell coordinates.
    /// Only cells inside the grid are visited, whatever the center and radius.
    pub fn damage(&self, grid: &mut VoxelGrid, center: IVec3, radius: f32) -> Vec<RemovedVoxel> {
        let mut removed = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return removed;
        }
        // Bounds are clipped in f64 so far centers and huge radii cannot overflow.
        let radius = f64::from(radius);
        let radius_sq = radius * radius;
        let reach = DVec3::splat(radius.floor());
        let center = center.as_dvec3();
        let lo = (center - reach).max(DVec3::ZERO).as_ivec3();
        let hi = (center + reach)
            .min((grid.size().as_ivec3() - IVec3::ONE).as_dvec3())
            .as_ivec3();

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let pos = IVec3::new(x, y, z);
                    if pos.as_dvec3().distance_squared(center) > radius_sq {
                        continue;
                    }
                    let code = grid.get(pos);
                    if code.is_empty() {
                        continue;
                    }
                    grid.set(pos, VoxelCode::EMPTY);
                    removed.push(RemovedVoxel {
                        position: pos.as_uvec3(),
                        color: code.color(),
                    });
                }
            }
        }
        tracing::trace!(%center, radius, removed = removed.len(), "damage");
        removed
    }

    /// Split the occupied voxels of `grid` into cropped fragments, largest
    /// first. Ties keep discovery order. `grid` itself is left untouched.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn split(&self, grid: &VoxelGrid) -> Vec<Fragment> {
        let mut work = grid.copy();
        let clusters =
            ConnectivityTracer::new().extract_clusters(&mut work, self.max_fragment_voxels);
        let mut fragments: Vec<Fragment> = clusters
            .par_iter()
            .filter_map(Fragment::from_cluster)
            .collect();
        fragments.sort_by_key(|f| Reverse(f.voxel_count));
        fragments
    }
}

/// Strategy for turning a damage event into removed voxels and fragments.
///
/// Chosen once and handed to the destruction graph at construction.
pub trait FracturePolicy: Send + Sync + fmt::Debug {
    /// Damage `grid` around a local cell. `grid` keeps whatever is left.
    fn fracture(&self, grid: &mut VoxelGrid, center: IVec3, radius: f32) -> FractureOutcome;
}

/// Spherical removal followed by a connectivity split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SphericalFracture {
    pub splitter: FractureSplitter,
}

impl SphericalFracture {
    pub const fn new(splitter: FractureSplitter) -> Self {
        Self { splitter }
    }
}

impl FracturePolicy for SphericalFracture {
    fn fracture(&self, grid: &mut VoxelGrid, center: IVec3, radius: f32) -> FractureOutcome {
        let removed = self.splitter.damage(grid, center, radius);
        let fragments = if removed.is_empty() {
            Vec::new()
        } else {
            self.splitter.split(grid)
        };
        FractureOutcome { removed, fragments }
    }
}

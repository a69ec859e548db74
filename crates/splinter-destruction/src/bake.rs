//! Offline adjacency bake between clusters.
//!
//! Pairs whose world bounds are clearly apart are rejected first. The rest are
//! compared shell voxel against shell voxel through a coarse spatial hash.

use glam::{IVec3, Vec3};
use hashbrown::HashMap;
use rayon::prelude::*;
use splinter_core::{Aabb, CancelToken};

use crate::cluster::{Cluster, ClusterConnection, ClusterId};

/// What the bake needs from one cluster, detached from the graph so the
/// bake can run on the worker pool.
#[derive(Clone, Debug)]
pub struct BakeInput {
    pub id: ClusterId,
    pub bounds: Aabb,
    pub shell: Vec<Vec3>,
}

impl BakeInput {
    /// `None` for clusters whose grid is gone.
    pub fn from_cluster(cluster: &Cluster) -> Option<Self> {
        if !cluster.has_grid() {
            tracing::debug!(cluster = %cluster.id(), "no grid, skipped by bake");
            return None;
        }
        Some(Self {
            id: cluster.id(),
            bounds: cluster.world_bounds(),
            shell: cluster.shell_centers(),
        })
    }
}

/// Shell points bucketed by cells of edge `reach`, so every point within
/// `reach` of a query lies in the 27 buckets around it.
struct ShellHash {
    reach: f32,
    buckets: HashMap<IVec3, Vec<Vec3>>,
}

impl ShellHash {
    fn new(points: &[Vec3], reach: f32) -> Self {
        let mut buckets: HashMap<IVec3, Vec<Vec3>> = HashMap::new();
        for &p in points {
            buckets.entry(Self::key(p, reach)).or_default().push(p);
        }
        Self { reach, buckets }
    }

    fn key(p: Vec3, reach: f32) -> IVec3 {
        (p / reach).floor().as_ivec3()
    }

    fn any_within(&self, p: Vec3) -> bool {
        let reach_sq = self.reach * self.reach;
        let key = Self::key(p, self.reach);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let Some(bucket) = self.buckets.get(&(key + IVec3::new(dx, dy, dz))) else {
                        continue;
                    };
                    if bucket.iter().any(|q| q.distance_squared(p) <= reach_sq) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Find all adjacent pairs. `reach` is the maximum distance between shell
/// voxel centers; the bounds prefilter uses the same margin.
///
/// Returns `None` if `cancel` fired.
#[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
pub fn bake_connections(
    inputs: &[BakeInput],
    reach: f32,
    cancel: Option<&CancelToken>,
) -> Option<Vec<ClusterConnection>> {
    if reach.is_nan() || reach <= 0.0 {
        tracing::warn!(reach, "non-positive adjacency reach, nothing is connected");
        return Some(Vec::new());
    }

    let hashes: Vec<ShellHash> = inputs
        .par_iter()
        .map(|input| ShellHash::new(&input.shell, reach))
        .collect();

    let pairs: Vec<(usize, usize)> = (0..inputs.len())
        .flat_map(|i| (i + 1..inputs.len()).map(move |j| (i, j)))
        .collect();

    let mut connections: Vec<ClusterConnection> = pairs
        .par_iter()
        .filter_map(|&(i, j)| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            let (a, b) = (&inputs[i], &inputs[j]);
            if a.bounds.separated_from(&b.bounds, reach) {
                return None;
            }
            // Walk the smaller shell against the other's hash.
            let touching = if a.shell.len() <= b.shell.len() {
                a.shell.iter().any(|&p| hashes[j].any_within(p))
            } else {
                b.shell.iter().any(|&p| hashes[i].any_within(p))
            };
            touching.then(|| ClusterConnection::new(a.id, b.id))
        })
        .collect();

    if cancel.is_some_and(CancelToken::is_cancelled) {
        return None;
    }
    connections.sort_unstable();
    tracing::info!(
        clusters = inputs.len(),
        pairs = pairs.len(),
        connections = connections.len(),
        "baked cluster adjacency"
    );
    Some(connections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: u32, shell: Vec<Vec3>) -> BakeInput {
        let half = Vec3::splat(0.5);
        let bounds = Aabb::from_points(shell.iter().flat_map(|&p| [p - half, p + half])).unwrap();
        BakeInput {
            id: ClusterId(id),
            bounds,
            shell,
        }
    }

    #[test]
    fn unit_distance_connects() {
        let inputs = [input(0, vec![Vec3::ZERO]), input(1, vec![Vec3::X])];
        let connections = bake_connections(&inputs, 1.001, None).unwrap();
        assert_eq!(connections, vec![ClusterConnection::new(ClusterId(0), ClusterId(1))]);
    }

    #[test]
    fn diagonal_neighbors_are_too_far() {
        let inputs = [input(0, vec![Vec3::ZERO]), input(1, vec![Vec3::new(1.0, 1.0, 0.0)])];
        assert!(bake_connections(&inputs, 1.001, None).unwrap().is_empty());
    }

    #[test]
    fn hash_finds_points_across_bucket_edges() {
        let hash = ShellHash::new(&[Vec3::new(0.999, 0.0, 0.0)], 1.0);
        assert!(hash.any_within(Vec3::new(0.001, 0.0, 0.0)));
        assert!(hash.any_within(Vec3::new(1.5, 0.5, -0.5)));
        assert!(!hash.any_within(Vec3::new(2.5, 0.0, 0.0)));
    }

    #[test]
    fn cancelled_bake_returns_none() {
        let token = CancelToken::new();
        token.cancel();
        let inputs = [input(0, vec![Vec3::ZERO]), input(1, vec![Vec3::X])];
        assert!(bake_connections(&inputs, 1.0, Some(&token)).is_none());
    }
}

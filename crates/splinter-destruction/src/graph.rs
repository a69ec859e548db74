//! The destruction cluster graph.
//!
//! Clusters are linked by permanent connections from the bake. Whether a
//! cluster stays up is decided by searching those connections for a fixed
//! cluster whenever a neighbor collapses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use glam::{IVec3, Vec3};
use hashbrown::{HashMap, HashSet};
use splinter_core::{
    cell_containing, spawn_pass, CancelToken, Error, PassHandle, Placement, Result, VoxelGrid,
};
use splinter_fracture::{
    components, FractureOutcome, FracturePolicy, FractureSplitter, RemovedVoxel,
    SphericalFracture, VoxelCluster,
};

use crate::bake::{bake_connections, BakeInput};
use crate::cluster::{Cluster, ClusterConnection, ClusterId, ClusterState};
use crate::config::DestructionConfig;
use crate::event::{CollapseCause, GraphEvent};
use crate::joint::{Joint, JointId};

/// A collapse waiting for its delay to run out.
#[derive(Clone, Copy, Debug)]
struct PendingCollapse {
    cluster: ClusterId,
    remaining: Duration,
}

/// Damage computed against a copy of a cluster's grid, not yet applied.
#[derive(Clone, Debug)]
pub struct DamageResult {
    /// The damaged copy.
    pub grid: VoxelGrid,
    pub outcome: FractureOutcome,
    /// Size of the largest connected component of `grid`, independent of
    /// any fragment cap.
    pub connected: usize,
}

impl DamageResult {
    /// Damage `grid` with `policy` at a world-space point.
    pub fn compute(
        policy: &dyn FracturePolicy,
        mut grid: VoxelGrid,
        placement: &Placement,
        world_point: Vec3,
        world_radius: f32,
    ) -> Self {
        let local = placement.inverse_transform_point(world_point);
        let center: IVec3 = cell_containing(local);
        let radius = world_radius / placement.max_scale();
        let outcome = policy.fracture(&mut grid, center, radius);
        let connected = if outcome.removed.is_empty() {
            grid.occupied_count()
        } else {
            components(&grid, None)
                .iter()
                .map(VoxelCluster::len)
                .max()
                .unwrap_or_default()
        };
        Self {
            grid,
            outcome,
            connected,
        }
    }
}

/// What a committed damage event did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DamageReport {
    pub cluster: Option<ClusterId>,
    /// Removed voxels in the damaged cluster's grid coordinates at the time
    /// of the hit.
    pub removed: Vec<RemovedVoxel>,
    /// Clusters spawned from pieces that broke off.
    pub fragments: Vec<ClusterId>,
    /// The damaged cluster collapsed as a direct result.
    pub collapsed: bool,
}

/// Graph of structural clusters with fixation and cascading collapse.
pub struct DestructionGraph {
    config: DestructionConfig,
    policy: Arc<dyn FracturePolicy>,
    clusters: Vec<Cluster>,
    adjacency: HashMap<ClusterId, Vec<ClusterId>>,
    joints: BTreeMap<JointId, Joint>,
    next_joint: u32,
    pending: Vec<PendingCollapse>,
    events: Vec<GraphEvent>,
}

impl std::fmt::Debug for DestructionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestructionGraph")
            .field("clusters", &self.clusters.len())
            .field("connections", &self.connection_count())
            .field("joints", &self.joints.len())
            .field("pending", &self.pending.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for DestructionGraph {
    fn default() -> Self {
        Self::new(DestructionConfig::default())
    }
}

impl DestructionGraph {
    /// Create a graph that fractures with [`SphericalFracture`].
    pub fn new(config: DestructionConfig) -> Self {
        let splitter =
            FractureSplitter::new().with_max_fragment_voxels(config.max_fragment_voxels);
        Self::with_policy(config, Arc::new(SphericalFracture::new(splitter)))
    }

    /// Create a graph with an explicit fracture strategy.
    pub fn with_policy(config: DestructionConfig, policy: Arc<dyn FracturePolicy>) -> Self {
        Self {
            config,
            policy,
            clusters: Vec::new(),
            adjacency: HashMap::new(),
            joints: BTreeMap::new(),
            next_joint: 0,
            pending: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &DestructionConfig {
        &self.config
    }

    pub fn policy(&self) -> &Arc<dyn FracturePolicy> {
        &self.policy
    }

    // ---- clusters ----------------------------------------------------------

    /// Add an intact cluster. Ids are never reused.
    pub fn add_cluster(&mut self, grid: VoxelGrid, placement: Placement) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters.push(Cluster::new(id, grid, placement));
        self.update_fixed(id);
        id
    }

    /// Mark a cluster as permanently anchored (or not).
    pub fn set_anchored(&mut self, id: ClusterId, anchored: bool) -> Result<()> {
        self.cluster_mut(id)?.anchored = anchored;
        self.update_fixed(id);
        Ok(())
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0 as usize)
    }

    fn cluster_mut(&mut self, id: ClusterId) -> Result<&mut Cluster> {
        self.clusters
            .get_mut(id.0 as usize)
            .ok_or(Error::UnknownCluster(id.0))
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    fn is_collapsed(&self, id: ClusterId) -> bool {
        self.cluster(id).map_or(true, Cluster::is_collapsed)
    }

    fn is_fixed(&self, id: ClusterId) -> bool {
        self.cluster(id).is_some_and(Cluster::is_fixed)
    }

    fn update_fixed(&mut self, id: ClusterId) {
        let held = self.joints.values().any(|j| j.holds(id));
        if let Some(cluster) = self.clusters.get_mut(id.0 as usize) {
            cluster.fixed = !cluster.is_collapsed() && (cluster.anchored || held);
        }
    }

    fn update_all_fixed(&mut self) {
        for i in 0..self.clusters.len() {
            self.update_fixed(ClusterId(i as u32));
        }
    }

    // ---- adjacency ---------------------------------------------------------

    fn bake_inputs(&self) -> Vec<BakeInput> {
        self.clusters.iter().filter_map(BakeInput::from_cluster).collect()
    }

    /// Rebuild all connections. Returns the number found.
    pub fn bake(&mut self) -> usize {
        let inputs = self.bake_inputs();
        let connections =
            bake_connections(&inputs, self.config.adjacency_reach(), None).unwrap_or_default();
        self.set_connections(connections)
    }

    /// [`Self::bake`] that leaves the current connections alone if `cancel` fires.
    pub fn bake_cancellable(&mut self, cancel: &CancelToken) -> Result<usize> {
        let inputs = self.bake_inputs();
        let connections = bake_connections(&inputs, self.config.adjacency_reach(), Some(cancel))
            .ok_or(Error::Cancelled)?;
        Ok(self.set_connections(connections))
    }

    /// Run the bake on the worker pool. Apply the result with
    /// [`Self::set_connections`].
    pub fn spawn_bake(&self, cancel: CancelToken) -> PassHandle<Vec<ClusterConnection>> {
        let inputs = self.bake_inputs();
        let reach = self.config.adjacency_reach();
        spawn_pass("bake", cancel, move |token| {
            bake_connections(&inputs, reach, Some(token))
        })
    }

    /// Replace all connections. Unknown cluster ids are dropped.
    pub fn set_connections(&mut self, connections: Vec<ClusterConnection>) -> usize {
        self.adjacency.clear();
        let mut count = 0;
        for connection in connections {
            if connection.a == connection.b
                || self.cluster(connection.a).is_none()
                || self.cluster(connection.b).is_none()
            {
                tracing::warn!(?connection, "dropping connection to unknown cluster");
                continue;
            }
            let a = self.adjacency.entry(connection.a).or_default();
            if a.contains(&connection.b) {
                continue;
            }
            a.push(connection.b);
            self.adjacency.entry(connection.b).or_default().push(connection.a);
            count += 1;
        }
        for neighbors in self.adjacency.values_mut() {
            neighbors.sort_unstable();
        }
        count
    }

    /// Clusters connected to `id`, in id order.
    pub fn neighbors(&self, id: ClusterId) -> &[ClusterId] {
        self.adjacency.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn are_connected(&self, a: ClusterId, b: ClusterId) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// All connections, sorted.
    pub fn connections(&self) -> Vec<ClusterConnection> {
        let mut out: Vec<_> = self
            .adjacency
            .iter()
            .flat_map(|(&a, ns)| {
                ns.iter()
                    .filter(move |&&b| a < b)
                    .map(move |&b| ClusterConnection::new(a, b))
            })
            .collect();
        out.sort_unstable();
        out
    }

    pub fn connection_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }

    // ---- joints ------------------------------------------------------------

    /// Add a joint and scan it immediately.
    pub fn add_joint(&mut self, mut joint: Joint) -> JointId {
        let id = JointId(self.next_joint);
        self.next_joint += 1;
        joint.rescan(&self.clusters);
        tracing::debug!(joint = %id, held = joint.fixations().len(), "joint added");
        self.joints.insert(id, joint);
        self.update_all_fixed();
        id
    }

    pub fn remove_joint(&mut self, id: JointId) -> Result<Joint> {
        let joint = self.joints.remove(&id).ok_or(Error::UnknownJoint(id.0))?;
        self.update_all_fixed();
        Ok(joint)
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(&id)
    }

    /// Rescan every joint now, regardless of its interval.
    pub fn refresh_fixations(&mut self) {
        let ids: Vec<JointId> = self.joints.keys().copied().collect();
        for id in ids {
            self.rescan_joint(id);
        }
        self.update_all_fixed();
    }

    fn rescan_joint(&mut self, id: JointId) {
        let Some(joint) = self.joints.get_mut(&id) else {
            return;
        };
        let previous = joint.rescan(&self.clusters);
        if previous == *joint.fixations() {
            return;
        }
        let held = joint.fixations().len();
        self.events.push(GraphEvent::FixationChanged {
            joint: id,
            clusters: held,
        });
        if held == 0 && !previous.is_empty() {
            tracing::debug!(joint = %id, "fixation broken");
            self.events.push(GraphEvent::FixationBroken { joint: id });
        }
    }

    // ---- time --------------------------------------------------------------

    /// Advance joint polls and collapse timers.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn update(&mut self, dt: Duration) {
        let due: Vec<JointId> = self
            .joints
            .iter_mut()
            .filter_map(|(&id, joint)| joint.tick(dt).then_some(id))
            .collect();
        if !due.is_empty() {
            for id in due {
                self.rescan_joint(id);
            }
            self.update_all_fixed();
        }

        if self.pending.is_empty() {
            return;
        }
        let mut fired = Vec::new();
        self.pending.retain_mut(|entry| {
            entry.remaining = entry.remaining.saturating_sub(dt);
            if entry.remaining.is_zero() {
                fired.push(entry.cluster);
                false
            } else {
                true
            }
        });
        for id in fired {
            self.collapse_with(id, CollapseCause::Unsupported);
        }
    }

    /// Clusters waiting on a collapse delay.
    pub fn pending_collapses(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.pending.iter().map(|p| p.cluster)
    }

    pub fn is_pending(&self, id: ClusterId) -> bool {
        self.pending.iter().any(|p| p.cluster == id)
    }

    // ---- collapse ----------------------------------------------------------

    /// Collapse a cluster now and propagate to its neighbors.
    pub fn collapse(&mut self, id: ClusterId) -> Result<()> {
        self.cluster_mut(id)?;
        self.collapse_with(id, CollapseCause::Direct);
        Ok(())
    }

    fn collapse_with(&mut self, id: ClusterId, cause: CollapseCause) {
        let mut work = vec![(id, cause)];
        while let Some((id, cause)) = work.pop() {
            let Ok(cluster) = self.cluster_mut(id) else {
                continue;
            };
            if cluster.is_collapsed() {
                continue;
            }
            cluster.state = ClusterState::Collapsed;
            cluster.fixed = false;
            self.pending.retain(|p| p.cluster != id);
            tracing::debug!(cluster = %id, ?cause, "cluster collapsed");
            self.events.push(GraphEvent::ClusterCollapsed { cluster: id, cause });
            self.release_fixations(id);

            for neighbor in self.neighbors(id).to_vec() {
                if self.is_collapsed(neighbor) || self.is_pending(neighbor) {
                    continue;
                }
                if self.is_supported(neighbor) {
                    continue;
                }
                if self.config.collapse_delay.is_zero() {
                    work.push((neighbor, CollapseCause::Unsupported));
                } else {
                    tracing::trace!(cluster = %neighbor, "collapse scheduled");
                    self.pending.push(PendingCollapse {
                        cluster: neighbor,
                        remaining: self.config.collapse_delay,
                    });
                }
            }
        }
    }

    /// Drop a collapsed cluster from every joint holding it.
    fn release_fixations(&mut self, id: ClusterId) {
        let mut broken = Vec::new();
        for (&joint_id, joint) in &mut self.joints {
            if joint.release(id) {
                self.events.push(GraphEvent::FixationChanged {
                    joint: joint_id,
                    clusters: joint.fixations().len(),
                });
                if joint.fixations().is_empty() {
                    broken.push(joint_id);
                }
            }
        }
        for joint in broken {
            self.events.push(GraphEvent::FixationBroken { joint });
        }
    }

    /// Whether `start` still reaches a fixed cluster over non-collapsed
    /// connections.
    ///
    /// Reaching an already visited cluster through a different edge means the
    /// search found a loop, and a loop counts as support. Unfixed loops
    /// therefore hold each other up.
    pub fn is_supported(&self, start: ClusterId) -> bool {
        if self.is_collapsed(start) {
            return false;
        }
        if self.is_fixed(start) {
            return true;
        }
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut stack = vec![(start, None)];
        while let Some((node, parent)) = stack.pop() {
            for &next in self.neighbors(node) {
                if Some(next) == parent || self.is_collapsed(next) {
                    continue;
                }
                if self.is_fixed(next) {
                    return true;
                }
                if !visited.insert(next) {
                    return true;
                }
                stack.push((next, Some(node)));
            }
        }
        false
    }

    // ---- damage ------------------------------------------------------------

    /// Damage a cluster at a world-space point and apply the result.
    pub fn apply_damage(
        &mut self,
        id: ClusterId,
        world_point: Vec3,
        world_radius: f32,
    ) -> Result<DamageReport> {
        let cluster = self.cluster(id).ok_or(Error::UnknownCluster(id.0))?;
        if !cluster.has_grid() {
            tracing::debug!(cluster = %id, "damage on cluster without grid ignored");
            return Ok(DamageReport::default());
        }
        let result = DamageResult::compute(
            self.policy.as_ref(),
            cluster.grid.copy(),
            &cluster.placement,
            world_point,
            world_radius,
        );
        self.commit_damage(id, result)
    }

    /// Apply damage computed elsewhere, replacing the cluster's grid wholesale.
    pub fn commit_damage(&mut self, id: ClusterId, result: DamageResult) -> Result<DamageReport> {
        let DamageResult {
            mut grid,
            outcome,
            connected,
        } = result;
        let mut report = DamageReport {
            cluster: Some(id),
            ..DamageReport::default()
        };
        let cluster = self.cluster_mut(id)?;
        if outcome.removed.is_empty() {
            return Ok(report);
        }
        report.removed = outcome.removed;
        let was_collapsed = cluster.is_collapsed();
        let original = cluster.original_voxel_count;
        let placement = cluster.placement;

        if grid.is_empty() {
            let cluster = self.cluster_mut(id)?;
            cluster.grid = grid;
            cluster.dispose();
            if !was_collapsed {
                self.collapse_with(id, CollapseCause::Emptied);
                report.collapsed = true;
            }
            return Ok(report);
        }

        let mut fragments = outcome.fragments.into_iter();
        if fragments.len() > 1 {
            // Largest piece stays as the body, the rest break off.
            if let Some(body) = fragments.next() {
                grid = body.grid;
                self.cluster_mut(id)?.placement = placement.offset_by_cells(body.origin);
            }
            for fragment in fragments {
                if fragment.voxel_count < self.config.min_fragment_voxels {
                    continue;
                }
                let child = ClusterId(self.clusters.len() as u32);
                let mut cluster = Cluster::new(
                    child,
                    fragment.grid,
                    placement.offset_by_cells(fragment.origin),
                );
                cluster.state = ClusterState::Collapsed;
                self.clusters.push(cluster);
                self.events.push(GraphEvent::FragmentSpawned {
                    parent: id,
                    fragment: child,
                    voxels: fragment.voxel_count,
                });
                report.fragments.push(child);
            }
        }
        self.cluster_mut(id)?.grid = grid;

        let threshold = self.config.collapse_threshold * original as f32;
        if !was_collapsed && (connected as f32) < threshold {
            tracing::debug!(cluster = %id, connected, original, "integrity lost");
            self.collapse_with(id, CollapseCause::IntegrityLost);
            report.collapsed = true;
        }
        Ok(report)
    }

    // ---- events ------------------------------------------------------------

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splinter_core::{Color, VoxelCode};

    fn solid(size: glam::UVec3) -> VoxelGrid {
        let mut grid = VoxelGrid::new(size.x, size.y, size.z);
        grid.fill_box(
            IVec3::ZERO,
            size.as_ivec3() - IVec3::ONE,
            VoxelCode::from_color(Color::new(140, 130, 120)),
        );
        grid
    }

    fn block() -> VoxelGrid {
        solid(glam::UVec3::ONE)
    }

    /// Three unit blocks along x: A at 0, B at 1, C at 2.
    fn chain(delay: Duration) -> (DestructionGraph, [ClusterId; 3]) {
        let mut graph =
            DestructionGraph::new(DestructionConfig::default().with_collapse_delay(delay));
        let a = graph.add_cluster(block(), Placement::at(Vec3::ZERO));
        let b = graph.add_cluster(block(), Placement::at(Vec3::X));
        let c = graph.add_cluster(block(), Placement::at(Vec3::X * 2.0));
        graph.set_anchored(a, true).unwrap();
        assert_eq!(graph.bake(), 2);
        (graph, [a, b, c])
    }

    fn collapsed(graph: &DestructionGraph, id: ClusterId) -> bool {
        graph.cluster(id).unwrap().is_collapsed()
    }

    #[test]
    fn bake_connects_touching_clusters_only() {
        let mut graph = DestructionGraph::default();
        let bar = solid(glam::UVec3::new(2, 1, 1));
        let a = graph.add_cluster(bar.copy(), Placement::at(Vec3::ZERO));
        let b = graph.add_cluster(bar, Placement::at(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(graph.bake(), 1);
        assert!(graph.are_connected(a, b));
        assert!(graph.are_connected(b, a));
        assert_eq!(graph.neighbors(a), &[b]);
    }

    #[test]
    fn bake_forgets_clusters_moved_apart() {
        let mut graph = DestructionGraph::default();
        let a = graph.add_cluster(block(), Placement::at(Vec3::ZERO));
        let b = graph.add_cluster(block(), Placement::at(Vec3::X));
        assert_eq!(graph.bake(), 1);

        let mut moved = DestructionGraph::default();
        let a2 = moved.add_cluster(block(), Placement::at(Vec3::ZERO));
        let b2 = moved.add_cluster(block(), Placement::at(Vec3::X * 3.0));
        assert_eq!(moved.bake(), 0);
        assert!(!moved.are_connected(a2, b2));
        assert!(graph.are_connected(a, b));
    }

    #[test]
    fn bake_skips_disposed_grids() {
        let mut graph = DestructionGraph::default();
        graph.add_cluster(block(), Placement::at(Vec3::ZERO));
        graph.add_cluster(VoxelGrid::default(), Placement::at(Vec3::X));
        assert_eq!(graph.bake(), 0);
    }

    #[test]
    fn bake_on_worker_matches_inline() {
        let (mut graph, [a, b, c]) = chain(Duration::ZERO);
        let handle = graph.spawn_bake(CancelToken::new());
        let connections = handle.wait().unwrap();
        assert_eq!(connections, graph.connections());
        graph.set_connections(connections);
        assert!(graph.are_connected(a, b));
        assert!(graph.are_connected(b, c));
        assert!(!graph.are_connected(a, c));
    }

    #[test]
    fn cancelled_bake_keeps_connections() {
        let (mut graph, [a, b, _]) = chain(Duration::ZERO);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(graph.bake_cancellable(&token), Err(Error::Cancelled));
        assert!(graph.are_connected(a, b));
    }

    #[test]
    fn collapsing_middle_drops_the_far_end() {
        let (mut graph, [a, b, c]) = chain(Duration::from_millis(150));
        graph.collapse(b).unwrap();
        assert!(collapsed(&graph, b));
        assert!(!collapsed(&graph, c), "collapse waits for the delay");
        assert!(graph.is_pending(c));

        graph.update(Duration::from_millis(100));
        assert!(!collapsed(&graph, c));
        graph.update(Duration::from_millis(60));
        assert!(collapsed(&graph, c));
        assert!(!collapsed(&graph, a));

        let events = graph.take_events();
        assert_eq!(
            events,
            vec![
                GraphEvent::ClusterCollapsed {
                    cluster: b,
                    cause: CollapseCause::Direct
                },
                GraphEvent::ClusterCollapsed {
                    cluster: c,
                    cause: CollapseCause::Unsupported
                },
            ]
        );
        assert!(graph.take_events().is_empty());
    }

    #[test]
    fn zero_delay_collapses_immediately() {
        let (mut graph, [a, b, c]) = chain(Duration::ZERO);
        graph.collapse(b).unwrap();
        assert!(collapsed(&graph, c));
        assert!(!collapsed(&graph, a));
    }

    #[test]
    fn cascade_runs_down_a_long_chain() {
        let config = DestructionConfig::default().with_collapse_delay(Duration::from_millis(10));
        let mut graph = DestructionGraph::new(config);
        let ids: Vec<_> = (0..5)
            .map(|i| graph.add_cluster(block(), Placement::at(Vec3::X * i as f32)))
            .collect();
        graph.set_anchored(ids[0], true).unwrap();
        graph.bake();
        graph.collapse(ids[1]).unwrap();
        for _ in 0..3 {
            graph.update(Duration::from_millis(10));
        }
        assert!(ids[1..].iter().all(|&id| collapsed(&graph, id)));
        assert!(!collapsed(&graph, ids[0]));
    }

    #[test]
    fn isolated_cluster_collapses_alone() {
        let mut graph = DestructionGraph::default();
        let lonely = graph.add_cluster(block(), Placement::at(Vec3::ZERO));
        let other = graph.add_cluster(block(), Placement::at(Vec3::X * 5.0));
        graph.bake();
        graph.collapse(lonely).unwrap();
        graph.update(Duration::from_secs(1));
        assert!(collapsed(&graph, lonely));
        assert!(!collapsed(&graph, other));
        assert_eq!(graph.take_events().len(), 1);
    }

    #[test]
    fn unfixed_loops_hold_each_other_up() {
        // A (anchored) - B, and B, C, D form a loop.
        let config = DestructionConfig::default().with_collapse_delay(Duration::ZERO);
        let mut graph = DestructionGraph::new(config);
        let a = graph.add_cluster(block(), Placement::at(Vec3::ZERO));
        let b = graph.add_cluster(block(), Placement::at(Vec3::X));
        let c = graph.add_cluster(block(), Placement::at(Vec3::new(2.0, 0.0, 0.0)));
        let d = graph.add_cluster(block(), Placement::at(Vec3::new(2.0, 1.0, 0.0)));
        graph.set_anchored(a, true).unwrap();
        graph.set_connections(vec![
            ClusterConnection::new(a, b),
            ClusterConnection::new(b, c),
            ClusterConnection::new(c, d),
            ClusterConnection::new(d, b),
        ]);

        graph.collapse(a).unwrap();
        for id in [b, c, d] {
            assert!(!collapsed(&graph, id));
            assert!(graph.is_supported(id));
        }
    }

    #[test]
    fn unknown_cluster_is_an_error() {
        let mut graph = DestructionGraph::default();
        assert_eq!(graph.collapse(ClusterId(3)), Err(Error::UnknownCluster(3)));
        assert!(matches!(
            graph.apply_damage(ClusterId(0), Vec3::ZERO, 1.0),
            Err(Error::UnknownCluster(0))
        ));
    }

    #[test]
    fn joints_fix_overlapping_clusters() {
        let (mut graph, [a, b, c]) = chain(Duration::ZERO);
        graph.set_anchored(a, false).unwrap();
        assert!(!graph.is_supported(b));

        // Block C spans (1..2, -1..0, -1..0).
        let joint = graph.add_joint(Joint::new(Vec3::new(1.5, -0.5, -0.5), 0.1));
        assert!(graph.cluster(c).unwrap().is_fixed());
        assert!(graph.is_supported(a));

        graph.collapse(b).unwrap();
        assert!(collapsed(&graph, a));
        assert!(!collapsed(&graph, c));
        assert!(graph.joint(joint).unwrap().holds(c));
    }

    #[test]
    fn joint_losing_all_clusters_reports_broken() {
        let mut graph = DestructionGraph::default();
        let a = graph.add_cluster(block(), Placement::at(Vec3::ZERO));
        let joint = graph.add_joint(Joint::new(Vec3::splat(-0.5), 0.1));
        graph.take_events();

        graph.collapse(a).unwrap();
        let events = graph.take_events();
        assert!(events.contains(&GraphEvent::FixationChanged { joint, clusters: 0 }));
        assert!(events.contains(&GraphEvent::FixationBroken { joint }));
        assert!(graph.joint(joint).unwrap().fixations().is_empty());
    }

    #[test]
    fn joints_rescan_on_their_interval() {
        let mut graph = DestructionGraph::default();
        let joint = graph.add_joint(
            Joint::new(Vec3::splat(-0.5), 0.1).with_poll_interval(Duration::from_millis(100)),
        );
        let a = graph.add_cluster(block(), Placement::at(Vec3::ZERO));
        // Not picked up until the next poll.
        assert!(!graph.cluster(a).unwrap().is_fixed());
        graph.update(Duration::from_millis(50));
        assert!(!graph.cluster(a).unwrap().is_fixed());
        graph.update(Duration::from_millis(50));
        assert!(graph.cluster(a).unwrap().is_fixed());
        assert_eq!(
            graph.take_events(),
            vec![GraphEvent::FixationChanged { joint, clusters: 1 }]
        );
    }

    #[test]
    fn damage_that_empties_a_cluster_collapses_and_disposes() {
        let mut graph = DestructionGraph::default();
        let a = graph.add_cluster(block(), Placement::at(Vec3::new(10.0, 0.0, 0.0)));
        let report = graph.apply_damage(a, Vec3::new(9.5, -0.5, -0.5), 0.5).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(report.collapsed);
        let cluster = graph.cluster(a).unwrap();
        assert!(cluster.is_collapsed());
        assert!(!cluster.has_grid());

        // Further damage on a disposed grid is a no-op.
        let again = graph.apply_damage(a, Vec3::new(9.5, -0.5, -0.5), 0.5).unwrap();
        assert!(again.removed.is_empty());
    }

    #[test]
    fn light_damage_keeps_cluster_intact() {
        let mut graph = DestructionGraph::default();
        let a = graph.add_cluster(solid(glam::UVec3::splat(3)), Placement::default());
        // Cell (1,1,1) has center (0.5, 0.5, 0.5).
        let report = graph.apply_damage(a, Vec3::splat(0.5), 1.0).unwrap();
        assert_eq!(report.removed.len(), 7);
        assert!(!report.collapsed);
        assert!(report.fragments.is_empty());
        assert_eq!(graph.cluster(a).unwrap().grid().occupied_count(), 20);
    }

    #[test]
    fn heavy_damage_collapses_by_integrity() {
        let mut graph = DestructionGraph::default();
        let a = graph.add_cluster(solid(glam::UVec3::new(4, 1, 1)), Placement::default());
        // Removes cells 0..=2 of 4 (center cell 1, radius 1).
        let report = graph.apply_damage(a, Vec3::new(0.5, -0.5, -0.5), 1.0).unwrap();
        assert_eq!(report.removed.len(), 3);
        assert!(report.collapsed);
        assert!(collapsed(&graph, a));
    }

    #[test]
    fn broken_off_pieces_become_collapsed_clusters() {
        let mut graph = DestructionGraph::default();
        let bar = graph.add_cluster(
            solid(glam::UVec3::new(7, 1, 1)),
            Placement::at(Vec3::new(0.0, 5.0, 0.0)),
        );
        // Knock out cell 4, leaving cells 0..=3 and 5..=6.
        let report = graph.apply_damage(bar, Vec3::new(3.5, 4.5, -0.5), 0.5).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.fragments.len(), 1);
        assert!(!report.collapsed, "4 of 7 voxels still connected");

        let body = graph.cluster(bar).unwrap();
        assert_eq!(body.grid().occupied_count(), 4);
        assert_eq!(body.placement().position, Vec3::new(0.0, 5.0, 0.0));

        let piece = graph.cluster(report.fragments[0]).unwrap();
        assert!(piece.is_collapsed());
        assert_eq!(piece.grid().occupied_count(), 2);
        assert_eq!(piece.placement().position, Vec3::new(5.0, 5.0, 0.0));

        assert!(graph.take_events().contains(&GraphEvent::FragmentSpawned {
            parent: bar,
            fragment: report.fragments[0],
            voxels: 2,
        }));
    }

    #[test]
    fn mirrored_chips_give_the_same_verdict() {
        let mut graph = DestructionGraph::default();
        let left = graph.add_cluster(solid(glam::UVec3::new(7, 1, 1)), Placement::default());
        let right = graph.add_cluster(
            solid(glam::UVec3::new(7, 1, 1)),
            Placement::at(Vec3::new(0.0, 10.0, 0.0)),
        );
        // Chip cell 1 of one bar and cell 5 of the other. Both leave 1 + 5.
        let a = graph.apply_damage(left, Vec3::new(0.5, -0.5, -0.5), 0.5).unwrap();
        let b = graph.apply_damage(right, Vec3::new(4.5, 9.5, -0.5), 0.5).unwrap();
        assert_eq!(a.removed.len(), 1);
        assert_eq!(b.removed.len(), 1);
        assert_eq!(a.collapsed, b.collapsed);
        assert!(!a.collapsed, "5 of 7 voxels still connected");
        assert_eq!(graph.cluster(left).unwrap().grid().occupied_count(), 5);
        assert_eq!(graph.cluster(right).unwrap().grid().occupied_count(), 5);
    }

    #[test]
    fn integrity_ignores_the_fragment_cap() {
        let config = DestructionConfig::default().with_max_fragment_voxels(Some(2));
        let mut graph = DestructionGraph::new(config);
        let bar = graph.add_cluster(solid(glam::UVec3::new(8, 1, 1)), Placement::default());
        let report = graph.apply_damage(bar, Vec3::new(-0.5, -0.5, -0.5), 0.5).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(!report.collapsed, "7 of 8 voxels still connected");
    }

    #[test]
    fn far_points_and_huge_radii_do_not_fault() {
        let mut graph = DestructionGraph::default();
        let a = graph.add_cluster(solid(glam::UVec3::new(7, 1, 1)), Placement::default());
        let far = graph.apply_damage(a, Vec3::splat(3.0e9), 1.0).unwrap();
        assert!(far.removed.is_empty());
        let far = graph.apply_damage(a, Vec3::splat(-3.0e9), f32::MAX).unwrap();
        assert_eq!(far.removed.len(), 7);
        assert!(far.collapsed);

        let b = graph.add_cluster(solid(glam::UVec3::new(7, 1, 1)), Placement::default());
        let all = graph
            .apply_damage(b, Vec3::new(0.5, -0.5, -0.5), f32::INFINITY)
            .unwrap();
        assert_eq!(all.removed.len(), 7);
        assert!(!graph.cluster(b).unwrap().has_grid());
    }

    #[test]
    fn missed_damage_reports_nothing() {
        let mut graph = DestructionGraph::default();
        let a = graph.add_cluster(block(), Placement::default());
        let report = graph.apply_damage(a, Vec3::splat(50.0), 1.0).unwrap();
        assert!(report.removed.is_empty());
        assert!(!collapsed(&graph, a));
    }
}

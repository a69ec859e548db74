//! World-space anchors that fix the clusters they overlap.

use std::fmt;
use std::time::Duration;

use glam::Vec3;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::cluster::{Cluster, ClusterId};

/// Stable handle to a joint in a [`DestructionGraph`](crate::DestructionGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JointId(pub u32);

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joint#{}", self.0)
    }
}

/// Default time between fixation rescans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A sphere that anchors every non-collapsed cluster it overlaps.
///
/// The fixation set is only rebuilt on the joint's own poll interval, so it
/// can be stale in between.
#[derive(Clone, Debug)]
pub struct Joint {
    center: Vec3,
    radius: f32,
    poll_interval: Duration,
    since_poll: Duration,
    fixations: HashSet<ClusterId>,
}

impl Joint {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius,
            poll_interval: DEFAULT_POLL_INTERVAL,
            since_poll: Duration::ZERO,
            fixations: HashSet::new(),
        }
    }

    /// Set how often the joint rescans.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Clusters currently held by this joint.
    pub fn fixations(&self) -> &HashSet<ClusterId> {
        &self.fixations
    }

    pub fn holds(&self, cluster: ClusterId) -> bool {
        self.fixations.contains(&cluster)
    }

    /// Advance the poll timer. Returns true when a rescan is due.
    pub(crate) fn tick(&mut self, dt: Duration) -> bool {
        self.since_poll += dt;
        if self.since_poll >= self.poll_interval {
            self.since_poll = Duration::ZERO;
            true
        } else {
            false
        }
    }

    pub(crate) fn overlaps(&self, cluster: &Cluster) -> bool {
        !cluster.is_collapsed()
            && cluster.has_grid()
            && cluster
                .world_bounds()
                .intersects_sphere(self.center, self.radius)
    }

    /// Rebuild the fixation set. Returns the previous set.
    pub(crate) fn rescan<'a>(
        &mut self,
        clusters: impl IntoIterator<Item = &'a Cluster>,
    ) -> HashSet<ClusterId> {
        let next = clusters
            .into_iter()
            .filter(|c| self.overlaps(c))
            .map(Cluster::id)
            .collect();
        std::mem::replace(&mut self.fixations, next)
    }

    /// Drop a cluster from the set. Returns true if it was held.
    pub(crate) fn release(&mut self, cluster: ClusterId) -> bool {
        self.fixations.remove(&cluster)
    }
}

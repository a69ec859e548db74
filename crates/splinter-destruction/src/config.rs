use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for the destruction graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestructionConfig {
    /// A cluster collapses once its connected voxel count drops below this
    /// fraction of its original count.
    pub collapse_threshold: f32,
    /// Delay between a cluster losing support and its collapse.
    pub collapse_delay: Duration,
    /// Maximum world distance between shell voxel centers of adjacent clusters.
    pub adjacency_distance: f32,
    /// Slack added to `adjacency_distance` for float error.
    pub adjacency_tolerance: f32,
    /// Cap on voxels per fragment when splitting damaged grids.
    pub max_fragment_voxels: Option<usize>,
    /// Fragments smaller than this are dropped instead of spawned.
    pub min_fragment_voxels: usize,
}

impl Default for DestructionConfig {
    fn default() -> Self {
        Self {
            collapse_threshold: 0.5,
            collapse_delay: Duration::from_millis(150),
            adjacency_distance: 1.0,
            adjacency_tolerance: 1e-3,
            max_fragment_voxels: None,
            min_fragment_voxels: 1,
        }
    }
}

impl DestructionConfig {
    /// Set the integrity fraction below which a damaged cluster collapses.
    pub fn with_collapse_threshold(mut self, threshold: f32) -> Self {
        self.collapse_threshold = threshold;
        self
    }

    /// Set the delay before an unsupported cluster collapses.
    pub fn with_collapse_delay(mut self, delay: Duration) -> Self {
        self.collapse_delay = delay;
        self
    }

    /// Set the adjacency distance used by the bake.
    pub fn with_adjacency_distance(mut self, distance: f32) -> Self {
        self.adjacency_distance = distance;
        self
    }

    /// Cap the size of a single fragment.
    pub fn with_max_fragment_voxels(mut self, max: Option<usize>) -> Self {
        self.max_fragment_voxels = max;
        self
    }

    /// Drop fragments smaller than `min` voxels.
    pub fn with_min_fragment_voxels(mut self, min: usize) -> Self {
        self.min_fragment_voxels = min;
        self
    }

    /// Distance at which two shell voxels count as touching.
    pub(crate) fn adjacency_reach(&self) -> f32 {
        self.adjacency_distance + self.adjacency_tolerance
    }
}

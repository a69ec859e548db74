//! Notifications for physics and effects, drained with
//! [`DestructionGraph::take_events`](crate::DestructionGraph::take_events).

use crate::cluster::ClusterId;
use crate::joint::JointId;

/// Why a cluster collapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollapseCause {
    /// Requested through [`DestructionGraph::collapse`](crate::DestructionGraph::collapse).
    Direct,
    /// Damage left too little of the cluster connected.
    IntegrityLost,
    /// Damage removed every voxel.
    Emptied,
    /// Lost every path to a fixed cluster.
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    ClusterCollapsed {
        cluster: ClusterId,
        cause: CollapseCause,
    },
    /// A joint's fixation set changed after a rescan.
    FixationChanged { joint: JointId, clusters: usize },
    /// A joint that held clusters now holds none.
    FixationBroken { joint: JointId },
    /// Damage split a piece off `parent`. Fragments start collapsed.
    FragmentSpawned {
        parent: ClusterId,
        fragment: ClusterId,
        voxels: usize,
    },
}

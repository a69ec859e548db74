//! Structural destruction for Splinter.
//!
//! A [`DestructionGraph`] holds placed voxel clusters and the permanent
//! connections baked between them. Clusters stay up while they can reach a
//! fixed cluster, either an authored anchor or one held by a [`Joint`].
//! Damage removes voxels, breaks off fragments and can collapse a cluster,
//! and each collapse is propagated through the graph after a short delay.
//!
//! [`DamageScheduler`] moves the fracture work onto the worker pool while
//! keeping every graph mutation on the caller's thread.

pub mod bake;
pub mod cluster;
pub mod config;
pub mod event;
pub mod graph;
pub mod joint;
pub mod scheduler;

pub use bake::{bake_connections, BakeInput};
pub use cluster::{shell_voxels, Cluster, ClusterConnection, ClusterId, ClusterState};
pub use config::DestructionConfig;
pub use event::{CollapseCause, GraphEvent};
pub use graph::{DamageReport, DamageResult, DestructionGraph};
pub use joint::{Joint, JointId, DEFAULT_POLL_INTERVAL};
pub use scheduler::{DamageRequest, DamageScheduler, DamageTicket};

//! Core types for the Splinter destruction engine.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Packed voxel codes and face directions
//! - The dense [`VoxelGrid`] every other crate operates on
//! - Mesh-space coordinate conventions and cluster placement
//! - Bounding boxes, error types and cancellable background passes

pub mod coords;
pub mod error;
pub mod grid;
pub mod math;
pub mod task;
pub mod types;

pub use coords::{cell_center, cell_containing, Placement};
pub use error::{Error, Result};
pub use grid::VoxelGrid;
pub use math::Aabb;
pub use task::{spawn_pass, CancelToken, PassHandle};
pub use types::{Color, FaceDirection, FaceFlags, VoxelCode};

/// Engine-wide constants
pub mod constants {
    /// Number of cells in a 26-neighborhood (3x3x3 cube minus the center).
    pub const NEIGHBORHOOD_26: usize = 26;
}

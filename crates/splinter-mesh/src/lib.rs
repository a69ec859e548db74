//! Greedy surface extraction for Splinter voxel grids.
//!
//! Meshing runs in two stages:
//! 1. Per direction, cull hidden faces and greedily merge visible ones into
//!    rectangles of one color ([`Quad`])
//! 2. Expand the quads into vertex, color and index buffers under a
//!    [`VertexSharing`] policy

pub mod buffers;
pub mod mesher;
pub mod quad;
pub mod stats;

pub use buffers::{MeshBuffers, VertexSharing};
pub use mesher::GreedyMesher;
pub use quad::{FacePlane, Quad};
pub use stats::MeshStats;

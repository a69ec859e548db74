//! Connectivity analysis and fracture for Splinter voxel grids.
//!
//! - [`ConnectivityTracer`]: 26-connected flood fill, used to measure how much
//!   of a grid is still attached and to pull disconnected pieces apart
//! - [`FractureSplitter`]: spherical voxel removal plus fragment splitting
//! - [`FracturePolicy`]: the strategy the destruction graph is built with

pub mod splitter;
pub mod tracer;

pub use splitter::{
    FractureOutcome, FracturePolicy, FractureSplitter, Fragment, RemovedVoxel, SphericalFracture,
};
pub use tracer::{components, connected_size, ConnectivityTracer, TracedVoxel, VoxelCluster};

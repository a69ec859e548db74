//! Error types for the engine.

use thiserror::Error;

/// Engine-wide error type.
///
/// Grid access never produces one of these: out-of-range reads are empty
/// cells and out-of-range writes are ignored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid data error
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// No cluster with this id exists in the graph
    #[error("Unknown cluster: {0}")]
    UnknownCluster(u32),

    /// No joint with this id exists in the graph
    #[error("Unknown joint: {0}")]
    UnknownJoint(u32),

    /// A background pass observed its cancellation token
    #[error("Pass cancelled")]
    Cancelled,

    /// A background pass ended without reporting (it panicked or was dropped)
    #[error("Worker disconnected before reporting a result")]
    WorkerDisconnected,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

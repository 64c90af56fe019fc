//! Error types for generals-harness.

use thiserror::Error;

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a scenario.
#[derive(Debug, Error)]
pub enum Error {
    /// The OM(m) session rejected its parameters or failed to complete.
    #[error("session error: {0}")]
    Session(#[from] generals_om::Error),

    /// A general's task panicked or was cancelled.
    #[error("general task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The runtime for a run could not be built.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad command line or scenario description.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

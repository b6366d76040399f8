//! Error types for the coordinator core

use thiserror::Error;

/// Errors that can occur in the coordinator core.
///
/// Peer misbehaviour never surfaces here; dispatch logs and drops it.
/// These cover the persistence layer and the host configuration, the
/// only failures a caller has to act on.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// IO error (persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (persistence)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unrecognized adapter type in the host configuration
    #[error("Unrecognized adapter type: {0}")]
    UnknownAdapterType(String),
}

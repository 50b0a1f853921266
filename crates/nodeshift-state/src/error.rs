//! Error types for the nodeshift cluster model.

use thiserror::Error;

/// Result type alias for cluster state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading cluster state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

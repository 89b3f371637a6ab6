//! Registry error types
//!
//! Error types for stream registry operations.

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No live stream for the key
    #[error("stream not found: {0}")]
    NotFound(String),

    /// A live stream already exists for the key
    #[error("stream already exists: {0}")]
    AlreadyExists(String),

    /// A tailer fell behind and was dropped
    #[error("subscriber on {key} dropped: queue of {capacity} lines is full")]
    Overflow { key: String, capacity: usize },

    /// The registry has been shut down
    #[error("stream registry is shut down")]
    Shutdown,
}

impl Error {
    /// Whether the error refers to a missing stream
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

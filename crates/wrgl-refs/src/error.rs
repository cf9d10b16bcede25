//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// The ref name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Storage backend failure.
    #[error("ref storage error: {0}")]
    Storage(String),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;

use wrgl_types::ObjectSum;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectSum),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Block compression or decompression failure.
    #[error("compression error: {0}")]
    Compression(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {sum}: {reason}")]
    CorruptObject { sum: ObjectSum, reason: String },

    /// The object exists but is of a different kind.
    #[error("object {sum} is a {actual}, expected {expected}")]
    KindMismatch {
        sum: ObjectSum,
        expected: crate::object::ObjectKind,
        actual: crate::object::ObjectKind,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

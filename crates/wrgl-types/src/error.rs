use thiserror::Error;

/// Failure to parse an [`ObjectSum`](crate::ObjectSum).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{input:?} is not a hex sum: {reason}")]
    BadHex { input: String, reason: String },

    #[error("object sum must be 32 bytes, got {0}")]
    BadSumLength(usize),
}

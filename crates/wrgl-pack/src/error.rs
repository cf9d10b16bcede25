use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid packfile magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    #[error("unsupported packfile version: {0}")]
    UnsupportedVersion(u32),

    #[error("unknown object type: {0}")]
    UnknownObjectType(u8),

    #[error("object length {0} does not fit in a packfile record")]
    LengthOverflow(u64),

    #[error("unexpected end of packfile")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PackResult<T> = Result<T, PackError>;

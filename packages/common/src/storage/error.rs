use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object was not found (or has expired).
    #[error("object not found: {0}")]
    NotFound(String),
    /// A stored object reference could not be parsed or validated.
    #[error("invalid object reference: {0}")]
    InvalidRef(String),
    /// A presigned download token failed verification or has expired.
    #[error("presigned token invalid or expired")]
    InvalidToken,
    /// An I/O error occurred.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The storage backend rejected an operation.
    #[error("storage backend error: {0}")]
    Backend(String),
}

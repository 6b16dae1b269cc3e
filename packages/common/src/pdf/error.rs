use thiserror::Error;

/// Errors from the document transform engine.
///
/// `Malformed` is deliberately distinct from storage-level I/O failures so
/// callers can tell corrupt content apart from an unreachable backend.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The input bytes are not a parseable PDF document.
    #[error("malformed document: {0}")]
    Malformed(String),
    /// The document is encrypted and cannot be transformed.
    #[error("document is encrypted")]
    Encrypted,
    /// The transform options are unusable.
    #[error("invalid transform options: {0}")]
    InvalidOptions(String),
    /// The transformed document could not be re-serialized.
    #[error("failed to serialize document: {0}")]
    Serialize(String),
}

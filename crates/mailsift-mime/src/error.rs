//! Error types for MIME primitives.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid content disposition.
    #[error("Invalid content disposition: {0}")]
    InvalidDisposition(String),
}

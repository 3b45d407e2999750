//! Common error types for gdir.

use thiserror::Error;

/// Top-level error type for gdir operations.
///
/// The first seven variants are the record-cipher taxonomy; callers must treat
/// each of them as fatal for the current run rather than as "record absent".
#[derive(Debug, Error)]
pub enum Error {
    /// Key material was rejected by the cipher primitive.
    #[error("Cipher initialization failed: {0}")]
    CipherInit(String),

    /// The cipher refused to seal a plaintext, e.g. one over the size limit.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The OS random source could not produce a nonce or secret.
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    /// Blob is shorter than the nonce it must start with.
    #[error("Malformed blob: {0}")]
    MalformedBlob(String),

    /// Tag verification failed: wrong secret, wrong namespace, or tampering.
    #[error("Authentication failed: wrong secret, wrong namespace, or corrupted blob")]
    Authentication,

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration file could not be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pushing a directory to the remote store failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Uploading the worker script failed.
    #[error("Deploy error: {0}")]
    Deploy(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

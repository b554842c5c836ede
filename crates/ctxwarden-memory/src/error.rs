//! Memory error types.

use thiserror::Error;

/// Errors that can occur during memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Committing the write would exceed the hard byte cap. Nothing was changed.
    #[error("Memory limit exceeded: storing '{key}' needs {required} bytes, limit is {limit}")]
    MemoryLimitExceeded {
        key: String,
        required: u64,
        limit: u64,
    },

    /// Description is longer than the configured maximum.
    #[error("Description too long: {len} characters, maximum is {max}")]
    DescriptionTooLong { len: usize, max: usize },

    /// Key is empty, malformed, or disagrees with the requested tier.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Entry not found.
    #[error("Entry not found: {0}")]
    KeyNotFound(String),

    /// The storage backend failed.
    #[error("Storage backend error: {0}")]
    StorageBackend(#[from] BackendError),
}

/// Errors raised by a [`MemoryBackend`](crate::MemoryBackend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("{0}")]
    Other(String),
}

impl MemoryError {
    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

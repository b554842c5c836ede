//! Error types for ctxwarden core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, saving, or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid JSON5 in config file: {0}")]
    Json5(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    /// One or more settings are out of range; all problems joined with `; `.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Could not determine the home directory")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_problems() {
        let err = ConfigError::Validation("a must be positive; b cannot be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: a must be positive; b cannot be empty"
        );
    }
}

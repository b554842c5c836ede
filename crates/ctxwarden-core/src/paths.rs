//! Path resolution utilities.

use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the ctxwarden base directory (~/.ctxwarden).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".ctxwarden"))
}

/// Get the main config file path (~/.ctxwarden/ctxwarden.json5).
///
/// `CTXWARDEN_CONFIG` overrides the location.
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = crate::env::get_var(crate::env::vars::CONFIG_PATH) {
        return Ok(PathBuf::from(path));
    }
    Ok(base_dir()?.join("ctxwarden.json5"))
}

/// Get the default memory store file (~/.ctxwarden/memory.json).
pub fn memory_store_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("memory.json"))
}

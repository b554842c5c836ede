//! Environment variable handling.

use std::env;

/// Well-known environment variable names.
pub mod vars {
    /// Config file location override.
    pub const CONFIG_PATH: &str = "CTXWARDEN_CONFIG";
    /// Total context window override, in tokens.
    pub const TOTAL_TOKENS: &str = "CTXWARDEN_TOTAL_TOKENS";
    /// Memory store hard byte cap override.
    pub const MEMORY_MAX_BYTES: &str = "CTXWARDEN_MEMORY_MAX_BYTES";
}

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable as a usize.
pub fn get_usize(name: &str) -> Option<usize> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Get an environment variable as a u64.
pub fn get_u64(name: &str) -> Option<u64> {
    get_var(name).and_then(|v| v.parse().ok())
}

//! # ctxwarden-core
//!
//! Core types, configuration, and utilities shared by the ctxwarden crates.
//!
//! - **Configuration**: loading, validation, and persistence of the JSON5 config file
//! - **Tokens**: the pluggable [`TokenEstimator`] and its character-ratio heuristic
//! - **Types**: conversation messages and tool definitions
//! - **Observers**: the [`EventObserver`] seam used for store and compaction events

pub mod config;
pub mod env;
pub mod error;
pub mod format;
pub mod observer;
pub mod paths;
pub mod tokens;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use format::format_bytes;
pub use observer::{EventObserver, NoopObserver, RecordingObserver};
pub use tokens::{estimate_tokens, ContentType, HeuristicEstimator, TokenEstimator};
pub use types::*;

//! CLI command implementations.

pub mod budget;
pub mod config;
pub mod estimate;
pub mod memory;
pub mod truncate;

use anyhow::Context;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read a file, or stdin when no path is given.
pub(crate) async fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Parse a command-line value as JSON, falling back to a plain string.
pub(crate) fn parse_json_or_string(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Split a `name=value` argument.
pub(crate) fn split_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => {
            Ok((name.to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

/// `name=path` argument parser.
pub(crate) fn parse_named_path(raw: &str) -> Result<(String, PathBuf), String> {
    split_key_value(raw).map(|(name, path)| (name, PathBuf::from(path)))
}

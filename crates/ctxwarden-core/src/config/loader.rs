//! Configuration loading and persistence.

use super::{Config, LogLevel};
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load configuration from the default path, falling back to defaults if
    /// no file exists. Environment overrides apply in both cases.
    pub fn load_or_default() -> Self {
        let config = match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    /// Apply `CTXWARDEN_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(total) = env::get_usize(env::vars::TOTAL_TOKENS) {
            self.budget.total_tokens = total;
        }
        if let Some(max) = env::get_u64(env::vars::MEMORY_MAX_BYTES) {
            self.memory.max_size_bytes = max;
        }
        self
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Budget shape
        let budget = &self.budget;
        if budget.total_tokens == 0 {
            errors.push("budget.total_tokens must be greater than 0".to_string());
        }
        if !(0.0..1.0).contains(&budget.reserve_fraction) {
            errors.push(format!(
                "budget.reserve_fraction must be in [0, 1), got {}",
                budget.reserve_fraction
            ));
        }
        if budget.compaction_threshold_percent <= 0.0 {
            errors.push(format!(
                "budget.compaction_threshold_percent must be positive, got {}",
                budget.compaction_threshold_percent
            ));
        }
        if budget.compaction_threshold_percent >= budget.hard_limit_percent {
            errors.push(format!(
                "budget.compaction_threshold_percent ({}) must be below hard_limit_percent ({})",
                budget.compaction_threshold_percent, budget.hard_limit_percent
            ));
        }
        if budget.hard_limit_percent > 100.0 {
            errors.push(format!(
                "budget.hard_limit_percent must be at most 100, got {}",
                budget.hard_limit_percent
            ));
        }

        // 2. Memory limits
        let memory = &self.memory;
        if memory.max_size_bytes == 0 {
            errors.push("memory.max_size_bytes must be greater than 0".to_string());
        }
        if memory.warn_percent == 0 || memory.warn_percent > 100 {
            errors.push(format!(
                "memory.warn_percent must be 1-100, got {}",
                memory.warn_percent
            ));
        }
        if memory.max_entries == Some(0) {
            errors.push("memory.max_entries must be greater than 0 when set".to_string());
        }
        if memory.max_index_entries == 0 {
            errors.push("memory.max_index_entries must be greater than 0".to_string());
        }
        if memory.retrieval_tool.trim().is_empty() {
            errors.push("memory.retrieval_tool cannot be empty".to_string());
        }

        // 3. Compaction strategy
        let mut seen = HashSet::new();
        for category in &self.compaction.categories {
            if !seen.insert(*category) {
                errors.push(format!(
                    "compaction.categories lists '{}' more than once",
                    category
                ));
            }
        }

        // 4. Token calibration
        if let Some(ratio) = self.tokens.chars_per_token {
            if !ratio.is_finite() || ratio <= 0.0 {
                errors.push(format!(
                    "tokens.chars_per_token must be a positive number, got {}",
                    ratio
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

/// Configuration builder for creating configs programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context window size.
    pub fn total_tokens(mut self, tokens: usize) -> Self {
        self.config.budget.total_tokens = tokens;
        self
    }

    /// Set the response reserve fraction.
    pub fn reserve_fraction(mut self, fraction: f64) -> Self {
        self.config.budget.reserve_fraction = fraction;
        self
    }

    /// Set both utilization thresholds.
    pub fn thresholds(mut self, compaction_percent: f64, hard_limit_percent: f64) -> Self {
        self.config.budget.compaction_threshold_percent = compaction_percent;
        self.config.budget.hard_limit_percent = hard_limit_percent;
        self
    }

    /// Set the memory store byte cap.
    pub fn memory_max_bytes(mut self, bytes: u64) -> Self {
        self.config.memory.max_size_bytes = bytes;
        self
    }

    /// Set the memory store entry cap.
    pub fn memory_max_entries(mut self, entries: Option<usize>) -> Self {
        self.config.memory.max_entries = entries;
        self
    }

    /// Set the log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}

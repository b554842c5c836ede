//! Configuration schema definitions.

use crate::tokens::ContentType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Main ctxwarden configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Token budget settings.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Tiered memory store limits.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Compaction strategy.
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Token estimation settings.
    #[serde(default)]
    pub tokens: TokensConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Token budget for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Context window size in tokens.
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,

    /// Fraction of the window held back for the model's response.
    #[serde(default = "default_reserve_fraction")]
    pub reserve_fraction: f64,

    /// Utilization percent at which status becomes warning and compaction runs.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold_percent: f64,

    /// Utilization percent at which status becomes critical.
    #[serde(default = "default_hard_limit")]
    pub hard_limit_percent: f64,
}

fn default_total_tokens() -> usize {
    200_000
}

fn default_reserve_fraction() -> f64 {
    0.1
}

fn default_compaction_threshold() -> f64 {
    75.0
}

fn default_hard_limit() -> f64 {
    90.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            reserve_fraction: default_reserve_fraction(),
            compaction_threshold_percent: default_compaction_threshold(),
            hard_limit_percent: default_hard_limit(),
        }
    }
}

/// Tiered memory store limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Hard cap on the summed size of all values, in bytes.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// Utilization percent at which a limit warning is emitted.
    #[serde(default = "default_warn_percent")]
    pub warn_percent: u8,

    /// Maximum number of entries; exceeding it evicts on write. `None` disables.
    #[serde(default = "default_max_entries")]
    pub max_entries: Option<usize>,

    /// Maximum entries listed in the rendered index.
    #[serde(default = "default_max_index_entries")]
    pub max_index_entries: usize,

    /// Maximum description length, in characters.
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,

    /// Name of the tool the model calls to load an entry's value.
    #[serde(default = "default_retrieval_tool")]
    pub retrieval_tool: String,
}

fn default_max_size_bytes() -> u64 {
    1024 * 1024
}

fn default_warn_percent() -> u8 {
    80
}

fn default_max_entries() -> Option<usize> {
    Some(500)
}

fn default_max_index_entries() -> usize {
    50
}

fn default_max_description_len() -> usize {
    200
}

fn default_retrieval_tool() -> String {
    "memory_retrieve".to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            warn_percent: default_warn_percent(),
            max_entries: default_max_entries(),
            max_index_entries: default_max_index_entries(),
            max_description_len: default_max_description_len(),
            retrieval_tool: default_retrieval_tool(),
        }
    }
}

/// A content category the compaction orchestrator may reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionCategory {
    /// Large tool results, reduced structurally.
    ToolOutputs,
    /// Conversation history, truncated or summarized.
    History,
    /// Working memory, reduced by ranked eviction.
    Memory,
}

impl CompactionCategory {
    /// Name used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolOutputs => "tool_outputs",
            Self::History => "history",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for CompactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompactionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tool_outputs" => Ok(Self::ToolOutputs),
            "history" => Ok(Self::History),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown compaction category '{}'", other)),
        }
    }
}

/// How history is reduced during compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Drop the oldest messages.
    #[default]
    Truncate,
    /// Replace older messages with a summary.
    Summarize,
}

/// Compaction strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Categories to compact, in order. Absent categories are never compacted.
    #[serde(default = "default_categories")]
    pub categories: Vec<CompactionCategory>,

    /// Tool outputs above this many tokens are truncated.
    #[serde(default = "default_max_tool_output_tokens")]
    pub max_tool_output_tokens: usize,

    /// History reduction mode.
    #[serde(default)]
    pub history_mode: HistoryMode,

    /// Messages kept verbatim when history is summarized.
    #[serde(default = "default_history_keep_recent")]
    pub history_keep_recent: usize,

    /// Tool outputs above this many tokens should go to memory instead of inline.
    #[serde(default = "default_auto_store_threshold")]
    pub auto_store_threshold_tokens: usize,
}

fn default_categories() -> Vec<CompactionCategory> {
    vec![
        CompactionCategory::ToolOutputs,
        CompactionCategory::History,
        CompactionCategory::Memory,
    ]
}

fn default_max_tool_output_tokens() -> usize {
    2_000
}

fn default_history_keep_recent() -> usize {
    10
}

fn default_auto_store_threshold() -> usize {
    4_000
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            max_tool_output_tokens: default_max_tool_output_tokens(),
            history_mode: HistoryMode::default(),
            history_keep_recent: default_history_keep_recent(),
            auto_store_threshold_tokens: default_auto_store_threshold(),
        }
    }
}

/// Token estimation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Calibrated chars-per-token ratio overriding the per-type defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars_per_token: Option<f64>,

    /// Content type assumed when a section does not declare one.
    #[serde(default)]
    pub default_content_type: ContentType,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Log file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

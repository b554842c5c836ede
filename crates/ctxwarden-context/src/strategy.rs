//! Compaction strategy.

use ctxwarden_core::config::{CompactionCategory, CompactionConfig, HistoryMode};
use serde::{Deserialize, Serialize};

/// Which categories to compact, in what order, and how hard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionStrategy {
    /// Categories walked in order. Categories not listed are never compacted.
    pub categories: Vec<CompactionCategory>,
    pub max_tool_output_tokens: usize,
    pub history_mode: HistoryMode,
    pub history_keep_recent: usize,
}

impl CompactionStrategy {
    /// Replace the category order.
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = CompactionCategory>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_history_mode(mut self, mode: HistoryMode) -> Self {
        self.history_mode = mode;
        self
    }

    pub fn includes(&self, category: CompactionCategory) -> bool {
        self.categories.contains(&category)
    }
}

impl From<&CompactionConfig> for CompactionStrategy {
    fn from(config: &CompactionConfig) -> Self {
        Self {
            categories: config.categories.clone(),
            max_tool_output_tokens: config.max_tool_output_tokens,
            history_mode: config.history_mode,
            history_keep_recent: config.history_keep_recent,
        }
    }
}

impl Default for CompactionStrategy {
    fn default() -> Self {
        Self::from(&CompactionConfig::default())
    }
}

//! Context error types.

use crate::orchestrator::CompactionStep;
use ctxwarden_memory::MemoryError;
use thiserror::Error;

/// Errors raised while budgeting or compacting a context.
#[derive(Error, Debug)]
pub enum ContextError {
    /// Every configured category was tried and the context is still over the hard limit.
    #[error(
        "context overflow: {used} tokens used of {limit} ({utilization_percent:.1}%) after {} compaction steps",
        .log.len()
    )]
    ContextOverflow {
        used: usize,
        limit: usize,
        utilization_percent: f64,
        log: Vec<CompactionStep>,
    },

    /// The memory provider failed.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// The history provider failed.
    #[error("history provider error: {0}")]
    History(String),

    /// A tool category is not in the catalog.
    #[error("unknown tool category: {0}")]
    UnknownToolCategory(String),
}

//! Token budgeting and context compaction for ctxwarden.
//!
//! This crate provides:
//! - [`BudgetCalculator`]: turns named content sections into a budget snapshot
//!   with an ok/warning/critical status
//! - [`CompactionOrchestrator`]: walks the configured compaction categories
//!   until the assembled context fits
//! - [`CompactableResource`]: the shared eviction protocol for memory, loaded
//!   tool categories, and static instructions, driven by [`ResourceCompactor`]

pub mod budget;
pub mod components;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod provider;
pub mod resource;
pub mod strategy;
pub mod tool_loader;
pub mod truncate;

pub use budget::{BudgetCalculator, BudgetSnapshot, BudgetStatus, ContentSection, SectionUsage};
pub use components::{ContextComponents, ToolOutput};
pub use error::ContextError;
pub use history::{HistoryProvider, RecencyHistoryProvider};
pub use orchestrator::{CompactionEvent, CompactionOrchestrator, CompactionStep, PreparedContext};
pub use provider::MemoryProvider;
pub use resource::{
    CompactableResource, CompactionReport, MemoryResource, ResourceCompactor, ResourceOutcome,
    StaticInstructions, ToolCategoryResource,
};
pub use strategy::CompactionStrategy;
pub use tool_loader::{StaticToolCatalog, ToolCatalog, ToolCategoryLoader};
pub use truncate::{should_auto_store, truncate_tool_output, truncate_tool_output_with};

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

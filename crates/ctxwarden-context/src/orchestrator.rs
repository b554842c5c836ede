//! Category-ordered context compaction.
//!
//! ## Algorithm
//!
//! 1. Estimate the budget. If the status is ok, return the components as-is.
//! 2. Walk the strategy's categories in order, reducing one category per step
//!    and re-estimating after each.
//! 3. Stop as soon as the status is ok.
//! 4. If every category has been tried and the status is still critical,
//!    fail with [`ContextError::ContextOverflow`]. Ending in warning is
//!    accepted.
//!
//! Reductions are not rolled back on failure; each step leaves the
//! components in a complete, usable state.

use crate::budget::{BudgetCalculator, BudgetSnapshot, BudgetStatus};
use crate::components::{section, ContextComponents};
use crate::error::ContextError;
use crate::history::{replace_with_summary, HistoryProvider};
use crate::provider::MemoryProvider;
use crate::strategy::CompactionStrategy;
use crate::truncate::truncate_tool_output_with;
use crate::Result;
use ctxwarden_core::config::{CompactionCategory, HistoryMode};
use ctxwarden_core::{ContentType, EventObserver, NoopObserver};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One category reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionStep {
    pub category: CompactionCategory,
    /// Total tokens used before the step.
    pub tokens_before: usize,
    /// Total tokens used after the step.
    pub tokens_after: usize,
    /// What was done.
    pub detail: String,
}

impl CompactionStep {
    pub fn tokens_freed(&self) -> usize {
        self.tokens_before.saturating_sub(self.tokens_after)
    }
}

/// Compaction progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompactionEvent {
    /// The budget was not ok and compaction started.
    Compacting {
        utilization_percent: f64,
        status: BudgetStatus,
    },
    /// A category was reduced.
    StepCompleted { step: CompactionStep },
}

/// Components ready to send, with the accounting that got them there.
#[derive(Debug, Clone)]
pub struct PreparedContext {
    pub components: ContextComponents,
    /// Whether any compaction ran.
    pub compacted: bool,
    /// Budget of the returned components.
    pub snapshot: BudgetSnapshot,
    pub log: Vec<CompactionStep>,
}

/// Fits assembled context into the token budget.
pub struct CompactionOrchestrator {
    calculator: BudgetCalculator,
    strategy: RwLock<CompactionStrategy>,
    observer: Arc<dyn EventObserver<CompactionEvent>>,
}

impl CompactionOrchestrator {
    pub fn new(calculator: BudgetCalculator, strategy: CompactionStrategy) -> Self {
        Self {
            calculator,
            strategy: RwLock::new(strategy),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set the observer that receives compaction events.
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver<CompactionEvent>>) -> Self {
        self.observer = observer;
        self
    }

    pub fn calculator(&self) -> &BudgetCalculator {
        &self.calculator
    }

    /// Current strategy.
    pub fn strategy(&self) -> CompactionStrategy {
        self.strategy.read().clone()
    }

    /// Replace the strategy. Takes effect on the next call to
    /// [`prepare_context`](Self::prepare_context).
    pub fn set_strategy(&self, strategy: CompactionStrategy) {
        info!("Compaction strategy set to {:?}", strategy.categories);
        *self.strategy.write() = strategy;
    }

    /// Estimate the budget of `components` without changing anything.
    pub fn snapshot(&self, components: &ContextComponents) -> BudgetSnapshot {
        self.calculator.estimate_budget(&components.sections())
    }

    /// Compact `components` until they fit the budget.
    pub async fn prepare_context(
        &self,
        mut components: ContextComponents,
        memory: &dyn MemoryProvider,
        history: &dyn HistoryProvider,
    ) -> Result<PreparedContext> {
        let mut snapshot = self.snapshot(&components);
        if snapshot.status == BudgetStatus::Ok {
            debug!(
                "Context at {:.1}% ({} tokens), no compaction needed",
                snapshot.utilization_percent, snapshot.used
            );
            return Ok(PreparedContext {
                components,
                compacted: false,
                snapshot,
                log: Vec::new(),
            });
        }

        info!(
            "Context at {:.1}% ({} tokens, {}), compacting",
            snapshot.utilization_percent, snapshot.used, snapshot.status
        );
        self.observer.notify(&CompactionEvent::Compacting {
            utilization_percent: snapshot.utilization_percent,
            status: snapshot.status,
        });

        let strategy = self.strategy();
        let mut log = Vec::new();

        for category in &strategy.categories {
            let tokens_before = snapshot.used;
            let detail = match category {
                CompactionCategory::ToolOutputs => self.compact_tool_outputs(&mut components, &strategy),
                CompactionCategory::History => {
                    self.compact_history(&mut components, &strategy, &snapshot, history)
                        .await?
                }
                CompactionCategory::Memory => self.compact_memory(&mut components, memory).await?,
            };
            snapshot = self.snapshot(&components);

            let step = CompactionStep {
                category: *category,
                tokens_before,
                tokens_after: snapshot.used,
                detail,
            };
            info!(
                "Compacted {}: {} -> {} tokens ({})",
                step.category, step.tokens_before, step.tokens_after, step.detail
            );
            self.observer.notify(&CompactionEvent::StepCompleted { step: step.clone() });
            log.push(step);

            if snapshot.status == BudgetStatus::Ok {
                break;
            }
        }

        if snapshot.status == BudgetStatus::Critical {
            warn!(
                "Context still at {:.1}% after {} compaction steps",
                snapshot.utilization_percent,
                log.len()
            );
            return Err(ContextError::ContextOverflow {
                used: snapshot.used,
                limit: snapshot.effective_window(),
                utilization_percent: snapshot.utilization_percent,
                log,
            });
        }

        Ok(PreparedContext {
            components,
            compacted: true,
            snapshot,
            log,
        })
    }

    fn compact_tool_outputs(&self, components: &mut ContextComponents, strategy: &CompactionStrategy) -> String {
        let estimator = self.calculator.estimator();
        let mut truncated = 0;
        for output in &mut components.tool_outputs {
            let tokens = estimator.estimate(&output.text(), ContentType::Code);
            if tokens > strategy.max_tool_output_tokens {
                output.value =
                    truncate_tool_output_with(estimator.as_ref(), &output.value, strategy.max_tool_output_tokens);
                truncated += 1;
            }
        }
        format!("truncated {} tool outputs", truncated)
    }

    async fn compact_history(
        &self,
        components: &mut ContextComponents,
        strategy: &CompactionStrategy,
        snapshot: &BudgetSnapshot,
        provider: &dyn HistoryProvider,
    ) -> Result<String> {
        let before = components.history.len();
        match strategy.history_mode {
            HistoryMode::Truncate => {
                let history_tokens = snapshot.section_tokens(section::HISTORY).unwrap_or(0);
                let excess = self.calculator.tokens_to_reach_ok(snapshot);
                let limit = history_tokens.saturating_sub(excess);
                components.history = provider.truncate(&components.history, limit).await?;
                Ok(format!(
                    "truncated history from {} to {} messages",
                    before,
                    components.history.len()
                ))
            }
            HistoryMode::Summarize => {
                if before <= strategy.history_keep_recent {
                    return Ok(format!("history has {} messages, nothing to summarize", before));
                }
                let split = before - strategy.history_keep_recent;
                let summary = provider.summarize(&components.history[..split]).await?;
                components.history =
                    replace_with_summary(&components.history, strategy.history_keep_recent, &summary);
                Ok(format!("summarized {} of {} messages", split, before))
            }
        }
    }

    async fn compact_memory(&self, components: &mut ContextComponents, memory: &dyn MemoryProvider) -> Result<String> {
        let mut evicted = Vec::new();
        let mut freed = 0;
        // evictions of entries the capped index never showed free nothing
        let mut unseen = 0;
        let mut index_tokens = self.calculator.estimate(&components.memory_index, ContentType::Prose);
        loop {
            if self.snapshot(components).status == BudgetStatus::Ok {
                break;
            }
            let Some(key) = memory.evict_one().await? else {
                break;
            };
            components.memory_index = memory.render_index().await?;
            let after = self.calculator.estimate(&components.memory_index, ContentType::Prose);
            let delta = index_tokens.saturating_sub(after);
            debug!("Evicted memory entry '{}' during compaction, index shrank by {} tokens", key, delta);
            if delta == 0 {
                unseen += 1;
            }
            freed += delta;
            index_tokens = after;
            evicted.push(key);
        }
        Ok(if evicted.is_empty() {
            "no memory entries evictable".to_string()
        } else {
            if unseen > 0 {
                warn!(
                    "{} of {} evicted memory entries were not in the rendered index",
                    unseen,
                    evicted.len()
                );
            }
            format!(
                "evicted {} memory entries ({} index tokens freed, {} not in index): {}",
                evicted.len(),
                freed,
                unseen,
                evicted.join(", ")
            )
        })
    }
}

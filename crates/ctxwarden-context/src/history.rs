//! Conversation history reduction.
//!
//! The orchestrator does not own summarization or truncation policy; it asks
//! a [`HistoryProvider`]. [`RecencyHistoryProvider`] keeps the most recent
//! messages and builds an extractive summary of the rest, which is enough
//! when no model is available to write a real summary.

use crate::Result;
use async_trait::async_trait;
use ctxwarden_core::{ContentType, HeuristicEstimator, Message, TokenEstimator};
use std::fmt::Write;
use std::sync::Arc;

/// Reduces conversation history on request.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Produce summary text for `messages`.
    async fn summarize(&self, messages: &[Message]) -> Result<String>;

    /// Return a suffix-preserving reduction of `messages` that fits in
    /// `token_limit` tokens.
    async fn truncate(&self, messages: &[Message], token_limit: usize) -> Result<Vec<Message>>;
}

/// Characters of each message kept in an extractive summary line.
const SUMMARY_LINE_CHARS: usize = 120;

/// Keeps the newest messages; summarizes by quoting the start of each message.
pub struct RecencyHistoryProvider {
    estimator: Arc<dyn TokenEstimator>,
}

impl RecencyHistoryProvider {
    pub fn new() -> Self {
        Self {
            estimator: Arc::new(HeuristicEstimator::new()),
        }
    }

    pub fn with_estimator(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    fn message_tokens(&self, message: &Message) -> usize {
        // +1 for the newline joining transcript lines
        self.estimator
            .estimate(&message.to_transcript_line(), ContentType::Mixed)
            + 1
    }
}

impl Default for RecencyHistoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryProvider for RecencyHistoryProvider {
    async fn summarize(&self, messages: &[Message]) -> Result<String> {
        let mut summary = format!(
            "Summary of {} earlier message{}:",
            messages.len(),
            if messages.len() == 1 { "" } else { "s" }
        );
        for message in messages {
            let first_line = message.content.lines().next().unwrap_or_default();
            let mut excerpt: String = first_line.chars().take(SUMMARY_LINE_CHARS).collect();
            if first_line.chars().count() > SUMMARY_LINE_CHARS || message.content.lines().nth(1).is_some() {
                excerpt.push_str("...");
            }
            let _ = write!(summary, "\n- {}: {}", message.role, excerpt);
        }
        Ok(summary)
    }

    async fn truncate(&self, messages: &[Message], token_limit: usize) -> Result<Vec<Message>> {
        let mut kept = 0;
        let mut tokens = 0;
        for message in messages.iter().rev() {
            let cost = self.message_tokens(message);
            if tokens + cost > token_limit {
                break;
            }
            tokens += cost;
            kept += 1;
        }
        Ok(messages[messages.len() - kept..].to_vec())
    }
}

/// Replace all but the `keep_recent` newest messages with one system
/// message carrying `summary`. Returns the messages unchanged when there is
/// nothing older to replace.
pub fn replace_with_summary(messages: &[Message], keep_recent: usize, summary: &str) -> Vec<Message> {
    if keep_recent >= messages.len() {
        return messages.to_vec();
    }
    let split = messages.len() - keep_recent;
    let mut compacted = Vec::with_capacity(keep_recent + 1);
    compacted.push(Message::system(summary));
    compacted.extend_from_slice(&messages[split..]);
    compacted
}

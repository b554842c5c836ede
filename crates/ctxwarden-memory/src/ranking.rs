//! Eviction and index ordering.
//!
//! [`eviction_order`] is the single comparator behind every eviction path
//! (manual LRU, manual size, automatic count-based, and compaction). It is
//! a total order: protected entries sort after every unprotected one, then
//! lower priority first, then the policy's secondary key, then key name.

use crate::entry::MemoryEntry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Secondary ranking used among entries of equal priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently accessed first.
    #[default]
    Lru,
    /// Largest first.
    Size,
}

/// Entries that ranked eviction must never remove.
pub fn is_protected(entry: &MemoryEntry) -> bool {
    entry.is_protected()
}

/// Total order in which entries are evicted (`Less` is evicted first).
pub fn eviction_order(a: &MemoryEntry, b: &MemoryEntry, policy: EvictionPolicy) -> Ordering {
    is_protected(a)
        .cmp(&is_protected(b))
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| match policy {
            EvictionPolicy::Lru => a.last_accessed_at.cmp(&b.last_accessed_at),
            EvictionPolicy::Size => b.size_bytes.cmp(&a.size_bytes),
        })
        .then_with(|| a.key.cmp(&b.key))
}

/// Unprotected entries in eviction order.
pub fn eviction_candidates<I>(entries: I, policy: EvictionPolicy) -> Vec<MemoryEntry>
where
    I: IntoIterator<Item = MemoryEntry>,
{
    let mut candidates: Vec<MemoryEntry> =
        entries.into_iter().filter(|e| !is_protected(e)).collect();
    candidates.sort_by(|a, b| eviction_order(a, b, policy));
    candidates
}

/// Order in which entries are listed in the index: pinned first, then
/// priority descending, then most recently accessed, then key.
pub fn index_order(a: &MemoryEntry, b: &MemoryEntry) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
        .then_with(|| a.key.cmp(&b.key))
}

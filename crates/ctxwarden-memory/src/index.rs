//! The LLM-facing memory index.
//!
//! The rendered index is itself charged against the token budget, so it is
//! capped at a configured number of entries and says how many were left out.

use crate::entry::{MemoryEntry, Priority};
use crate::ranking::index_order;
use crate::tier::Tier;
use ctxwarden_core::format_bytes;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One visible index line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub description: String,
    pub size_bytes: u64,
    pub priority: Priority,
    pub pinned: bool,
    pub tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,
}

impl From<&MemoryEntry> for IndexEntry {
    fn from(entry: &MemoryEntry) -> Self {
        Self {
            key: entry.key.clone(),
            description: entry.description.clone(),
            size_bytes: entry.size_bytes,
            priority: entry.priority,
            pinned: entry.pinned,
            tier: entry.tier(),
            derived_from: entry.derived_from.clone(),
        }
    }
}

/// Ranked snapshot of the store's contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryIndex {
    /// Visible entries, best first.
    pub entries: Vec<IndexEntry>,
    /// Entries in the store.
    pub total_entry_count: usize,
    /// Entries not listed because of the index cap.
    pub omitted_count: usize,
    pub total_size_bytes: u64,
    pub limit_size_bytes: u64,
    pub utilization_percent: f64,
}

impl MemoryIndex {
    /// Rank `entries` and keep at most `max_entries` of them.
    pub fn build(
        mut entries: Vec<MemoryEntry>,
        max_entries: usize,
        total_size_bytes: u64,
        limit_size_bytes: u64,
    ) -> Self {
        entries.sort_by(index_order);
        let total_entry_count = entries.len();
        let visible: Vec<IndexEntry> = entries.iter().take(max_entries).map(IndexEntry::from).collect();
        let omitted_count = total_entry_count - visible.len();

        Self {
            entries: visible,
            total_entry_count,
            omitted_count,
            total_size_bytes,
            limit_size_bytes,
            utilization_percent: utilization_percent(total_size_bytes, limit_size_bytes),
        }
    }

    /// Human-readable total size.
    pub fn total_size_human(&self) -> String {
        format_bytes(self.total_size_bytes)
    }

    /// Human-readable size limit.
    pub fn limit_size_human(&self) -> String {
        format_bytes(self.limit_size_bytes)
    }

    /// Whether some entries were left out.
    pub fn is_truncated(&self) -> bool {
        self.omitted_count > 0
    }

    /// Render the text block shown to the model.
    pub fn render(&self, retrieval_tool: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Working memory");
        let _ = writeln!(
            out,
            "{} {}, {} of {} used ({:.1}%)",
            self.total_entry_count,
            if self.total_entry_count == 1 { "entry" } else { "entries" },
            self.total_size_human(),
            self.limit_size_human(),
            self.utilization_percent
        );

        if self.entries.is_empty() {
            let _ = writeln!(out, "No entries stored.");
        }

        for entry in &self.entries {
            let pin = if entry.pinned { ", pinned" } else { "" };
            let _ = writeln!(
                out,
                "- `{}` [{}{}, {}]: {}",
                entry.key,
                entry.priority,
                pin,
                format_bytes(entry.size_bytes),
                entry.description
            );
        }

        if self.is_truncated() {
            let _ = writeln!(
                out,
                "({} more {} omitted from this index)",
                self.omitted_count,
                if self.omitted_count == 1 { "entry" } else { "entries" }
            );
        }

        let _ = writeln!(
            out,
            "Use the `{}` tool with an entry key to load its full value.",
            retrieval_tool
        );
        out
    }
}

/// Per-tier totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStat {
    pub count: usize,
    pub size_bytes: u64,
}

/// Totals for every tier, plus entries whose key has no tier prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    pub raw: TierStat,
    pub summary: TierStat,
    pub findings: TierStat,
    pub untiered: TierStat,
}

impl TierStats {
    /// Tally entries by derived tier.
    pub fn collect<'a>(entries: impl IntoIterator<Item = &'a MemoryEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            let slot = match entry.tier() {
                Some(Tier::Raw) => &mut stats.raw,
                Some(Tier::Summary) => &mut stats.summary,
                Some(Tier::Findings) => &mut stats.findings,
                None => &mut stats.untiered,
            };
            slot.count += 1;
            slot.size_bytes += entry.size_bytes;
        }
        stats
    }

    /// Totals for one tier.
    pub fn get(&self, tier: Tier) -> TierStat {
        match tier {
            Tier::Raw => self.raw,
            Tier::Summary => self.summary,
            Tier::Findings => self.findings,
        }
    }
}

pub(crate) fn utilization_percent(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return if used == 0 { 0.0 } else { 100.0 };
    }
    used as f64 / limit as f64 * 100.0
}

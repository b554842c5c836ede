//! Store side-effect events.

use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why entries were evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionReason {
    /// Least-recently-used eviction.
    Lru,
    /// Largest-first eviction.
    Size,
    /// Entry count exceeded the configured maximum.
    Count,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lru => "lru",
            Self::Size => "size",
            Self::Count => "count",
        })
    }
}

/// Something the store did that operators may want to audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEvent {
    /// An entry was written.
    Stored {
        key: String,
        size_bytes: u64,
        tier: Option<Tier>,
    },
    /// Entries were evicted.
    Evicted {
        keys: Vec<String>,
        reason: EvictionReason,
    },
    /// Utilization crossed the soft limit.
    LimitWarning {
        utilization_percent: f64,
        total_size_bytes: u64,
        limit_bytes: u64,
    },
}

//! Memory entries and write options.

use crate::tier::{default_priority_for_key, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Base priority of an entry. Ordered from least to most important.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    /// Never evicted by ranked eviction.
    Critical,
}

impl Priority {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Lifetime of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tasks", rename_all = "lowercase")]
pub enum MemoryScope {
    /// Lives for the current session.
    #[default]
    Session,
    /// Survives across sessions.
    Persistent,
    /// Bound to one or more task identifiers.
    Tasks(BTreeSet<String>),
}

impl MemoryScope {
    /// Scope bound to a single task.
    pub fn task(id: impl Into<String>) -> Self {
        Self::Tasks(BTreeSet::from([id.into()]))
    }

    /// Scope bound to several tasks.
    pub fn tasks<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tasks(ids.into_iter().map(Into::into).collect())
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent)
    }
}

/// A stored memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique key; its prefix determines the tier.
    pub key: String,

    /// Short description shown to the model in the index.
    pub description: String,

    /// Opaque value.
    pub value: Value,

    /// Size of the value's compact JSON form.
    pub size_bytes: u64,

    /// Lifetime.
    #[serde(default)]
    pub scope: MemoryScope,

    /// Base priority.
    pub priority: Priority,

    /// Pinned entries are never evicted.
    #[serde(default)]
    pub pinned: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,

    /// Last read or write timestamp.
    pub last_accessed_at: DateTime<Utc>,

    /// Number of reads.
    #[serde(default)]
    pub access_count: u64,

    /// Keys this entry was derived from. Advisory only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,
}

impl MemoryEntry {
    /// Create an entry with the key's default priority and session scope.
    pub fn new(key: impl Into<String>, description: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        let now = Utc::now();
        Self {
            priority: default_priority_for_key(&key),
            key,
            description: description.into(),
            size_bytes: Self::measure(&value),
            value,
            scope: MemoryScope::Session,
            pinned: false,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
            derived_from: Vec::new(),
        }
    }

    /// Size in bytes a value is charged against the store's cap.
    pub fn measure(value: &Value) -> u64 {
        value.to_string().len() as u64
    }

    /// Tier derived from the key.
    pub fn tier(&self) -> Option<Tier> {
        Tier::parse_key(&self.key)
    }

    /// Pinned or critical entries are exempt from ranked eviction.
    pub fn is_protected(&self) -> bool {
        self.pinned || self.priority == Priority::Critical
    }

    /// The value as text: strings verbatim, anything else as compact JSON.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Record a read.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Utc::now();
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: MemoryScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the pinned flag.
    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Set the last access time.
    pub fn with_last_accessed(mut self, at: DateTime<Utc>) -> Self {
        self.last_accessed_at = at;
        self
    }

    /// Set lineage keys.
    pub fn with_derived_from(mut self, keys: Vec<String>) -> Self {
        self.derived_from = keys;
        self
    }
}

/// Options for [`TieredMemoryStore::store`](crate::TieredMemoryStore::store).
///
/// Unset fields keep the existing entry's value on overwrite and fall back
/// to defaults (session scope, tier priority, unpinned) on first write.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub scope: Option<MemoryScope>,
    pub priority: Option<Priority>,
    pub pinned: Option<bool>,
    /// Qualifies an unprefixed key with this tier.
    pub tier: Option<Tier>,
    /// Advisory lineage.
    pub derived_from: Vec<String>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options targeting a tier.
    pub fn tier(tier: Tier) -> Self {
        Self {
            tier: Some(tier),
            ..Self::default()
        }
    }

    pub fn with_scope(mut self, scope: MemoryScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = Some(true);
        self
    }

    pub fn with_derived_from<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derived_from = keys.into_iter().map(Into::into).collect();
        self
    }
}

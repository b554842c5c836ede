//! Memory tiers and key handling.
//!
//! A tier is never stored on an entry. It is read off the key prefix
//! (`raw.search` is raw, `findings.main` is findings) by [`Tier::parse_key`]
//! and written onto a bare name by [`Tier::qualify`]; every other piece of
//! tier logic goes through these two functions.

use crate::entry::Priority;
use crate::error::MemoryError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum key length in characters.
pub const MAX_KEY_LEN: usize = 128;

/// Separator between a tier prefix and the entry name.
pub const TIER_SEPARATOR: char = '.';

/// Semantic maturity level of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Unprocessed tool output.
    Raw,
    /// Condensed form of raw data.
    Summary,
    /// Conclusions worth keeping for the whole session.
    Findings,
}

impl Tier {
    /// All tiers, from least to most mature.
    pub const ALL: [Tier; 3] = [Tier::Raw, Tier::Summary, Tier::Findings];

    /// Key prefix for this tier.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Summary => "summary",
            Self::Findings => "findings",
        }
    }

    /// Priority given to entries of this tier unless overridden.
    pub fn default_priority(self) -> Priority {
        match self {
            Self::Raw => Priority::Low,
            Self::Summary => Priority::Normal,
            Self::Findings => Priority::High,
        }
    }

    /// Derive the tier from a key's prefix. Keys without a tier prefix are untiered.
    pub fn parse_key(key: &str) -> Option<Tier> {
        let (prefix, rest) = key.split_once(TIER_SEPARATOR)?;
        if rest.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|tier| tier.prefix() == prefix)
    }

    /// Build the key for `name` in this tier. `name` must not carry a tier prefix.
    pub fn qualify(self, name: &str) -> String {
        format!("{}{}{}", self.prefix(), TIER_SEPARATOR, name)
    }

    /// The key with any tier prefix removed.
    pub fn base_name(key: &str) -> &str {
        match Self::parse_key(key) {
            Some(tier) => &key[tier.prefix().len() + TIER_SEPARATOR.len_utf8()..],
            None => key,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.prefix() == s)
            .ok_or_else(|| format!("unknown tier '{}', expected raw, summary or findings", s))
    }
}

/// Default priority for a key: its tier's default, or normal when untiered.
pub fn default_priority_for_key(key: &str) -> Priority {
    Tier::parse_key(key)
        .map(Tier::default_priority)
        .unwrap_or(Priority::Normal)
}

/// Check key format: non-empty, bounded length, `[A-Za-z0-9._-]` only,
/// starting with an alphanumeric character, with no empty `.` segments.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(MemoryError::invalid_key(key, "key cannot be empty"));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(MemoryError::invalid_key(
            key,
            format!("key exceeds {} characters", MAX_KEY_LEN),
        ));
    }
    if let Some(bad) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(MemoryError::invalid_key(
            key,
            format!("character '{}' is not allowed", bad),
        ));
    }
    if !key.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(MemoryError::invalid_key(
            key,
            "key must start with a letter or digit",
        ));
    }
    if key.split(TIER_SEPARATOR).any(str::is_empty) {
        return Err(MemoryError::invalid_key(key, "key has an empty segment"));
    }
    Ok(())
}

/// Resolve the final key for a write: qualify a bare name with `tier`, and
/// reject a key whose own prefix names a different tier.
pub fn resolve_key(key: &str, tier: Option<Tier>) -> Result<String> {
    validate_key(key)?;
    let resolved = match (Tier::parse_key(key), tier) {
        (Some(existing), Some(requested)) if existing != requested => {
            return Err(MemoryError::invalid_key(
                key,
                format!("key is in tier '{}' but '{}' was requested", existing, requested),
            ));
        }
        (None, Some(requested)) => requested.qualify(key),
        _ => key.to_string(),
    };
    validate_key(&resolved)?;
    Ok(resolved)
}

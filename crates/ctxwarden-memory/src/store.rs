//! The tiered memory store.

use crate::access::MemoryAccess;
use crate::backend::MemoryBackend;
use crate::entry::{MemoryEntry, MemoryScope, Priority, StoreOptions};
use crate::error::MemoryError;
use crate::events::{EvictionReason, MemoryEvent};
use crate::index::{utilization_percent, MemoryIndex, TierStats};
use crate::ranking::{eviction_candidates, EvictionPolicy};
use crate::tier::{default_priority_for_key, resolve_key, validate_key, Tier};
use crate::Result;
use chrono::Utc;
use ctxwarden_core::config::MemoryConfig;
use ctxwarden_core::{EventObserver, NoopObserver};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreReceipt {
    /// Final (tier-qualified) key.
    pub key: String,
    /// Size of the stored value.
    pub size_bytes: u64,
    /// Keys evicted because the entry cap was exceeded.
    pub evicted: Vec<String>,
    /// Store utilization after the write.
    pub utilization_percent: f64,
}

#[derive(Debug, Default)]
struct StoreState {
    total_size: u64,
    entry_count: usize,
}

/// Keyed working memory with tiers, priorities, pinning, and caps.
///
/// Every public operation holds the store's lock for its whole duration,
/// so a promotion or eviction pass is never interleaved with another
/// mutation from the same session.
pub struct TieredMemoryStore {
    backend: Arc<dyn MemoryBackend>,
    config: MemoryConfig,
    observer: Arc<dyn EventObserver<MemoryEvent>>,
    state: Mutex<StoreState>,
}

impl TieredMemoryStore {
    /// Open a store over `backend`, tallying whatever it already holds.
    pub async fn open(backend: Arc<dyn MemoryBackend>, config: MemoryConfig) -> Result<Self> {
        let existing = backend.list().await?;
        let state = StoreState {
            total_size: existing.iter().map(|e| e.size_bytes).sum(),
            entry_count: existing.len(),
        };
        debug!(
            "Opened memory store with {} entries ({} bytes)",
            state.entry_count, state.total_size
        );

        Ok(Self {
            backend,
            config,
            observer: Arc::new(NoopObserver),
            state: Mutex::new(state),
        })
    }

    /// Set the observer that receives store events.
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver<MemoryEvent>>) -> Self {
        self.observer = observer;
        self
    }

    /// Store limits.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// A get/set/delete view for sandboxed tool execution.
    pub fn access(self: &Arc<Self>) -> MemoryAccess {
        MemoryAccess::new(Arc::clone(self))
    }

    /// Summed size of all stored values.
    pub async fn total_size_bytes(&self) -> u64 {
        self.state.lock().await.total_size
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entry_count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Size utilization against the hard byte cap.
    pub async fn utilization_percent(&self) -> f64 {
        let state = self.state.lock().await;
        utilization_percent(state.total_size, self.config.max_size_bytes)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write `value` under `key`.
    ///
    /// Fails with [`MemoryError::MemoryLimitExceeded`] without touching the
    /// store if the write would push the total past the byte cap. When the
    /// entry cap is exceeded afterwards, the lowest-ranked unprotected
    /// entries are evicted before returning.
    pub async fn store(
        &self,
        key: &str,
        description: &str,
        value: Value,
        options: StoreOptions,
    ) -> Result<StoreReceipt> {
        let key = resolve_key(key, options.tier)?;
        self.check_description(description)?;

        let mut state = self.state.lock().await;
        let existing = self.backend.get(&key).await?;

        let size_bytes = MemoryEntry::measure(&value);
        let previous_size = existing.as_ref().map(|e| e.size_bytes).unwrap_or(0);
        let candidate_total = state.total_size - previous_size + size_bytes;
        if candidate_total > self.config.max_size_bytes {
            debug!(
                "Rejected write of '{}': {} bytes would exceed limit {}",
                key, candidate_total, self.config.max_size_bytes
            );
            return Err(MemoryError::MemoryLimitExceeded {
                key,
                required: candidate_total,
                limit: self.config.max_size_bytes,
            });
        }

        let now = Utc::now();
        let is_new = existing.is_none();
        let entry = match existing {
            Some(mut current) => {
                current.description = description.to_string();
                current.value = value;
                current.size_bytes = size_bytes;
                current.updated_at = now;
                current.last_accessed_at = now;
                if let Some(scope) = options.scope {
                    current.scope = scope;
                }
                if let Some(priority) = options.priority {
                    current.priority = priority;
                }
                if let Some(pinned) = options.pinned {
                    current.pinned = pinned;
                }
                if !options.derived_from.is_empty() {
                    current.derived_from = options.derived_from;
                }
                current
            }
            None => MemoryEntry::new(key.clone(), description, value)
                .with_scope(options.scope.unwrap_or_default())
                .with_priority(
                    options
                        .priority
                        .unwrap_or_else(|| default_priority_for_key(&key)),
                )
                .with_pinned(options.pinned.unwrap_or(false))
                .with_derived_from(options.derived_from),
        };
        let tier = entry.tier();

        self.backend.set(entry).await?;

        let before_percent = utilization_percent(state.total_size, self.config.max_size_bytes);
        state.total_size = candidate_total;
        if is_new {
            state.entry_count += 1;
        }
        let after_percent = utilization_percent(state.total_size, self.config.max_size_bytes);

        debug!("Stored '{}' ({} bytes)", key, size_bytes);
        self.observer.notify(&MemoryEvent::Stored {
            key: key.clone(),
            size_bytes,
            tier,
        });

        let warn_at = f64::from(self.config.warn_percent);
        if before_percent < warn_at && after_percent >= warn_at {
            warn!(
                "Memory store at {:.1}% of {} bytes",
                after_percent, self.config.max_size_bytes
            );
            self.observer.notify(&MemoryEvent::LimitWarning {
                utilization_percent: after_percent,
                total_size_bytes: state.total_size,
                limit_bytes: self.config.max_size_bytes,
            });
        }

        let mut evicted = Vec::new();
        if let Some(max_entries) = self.config.max_entries {
            if state.entry_count > max_entries {
                let excess = state.entry_count - max_entries;
                evicted = self
                    .evict_locked(&mut state, excess, EvictionPolicy::Lru, EvictionReason::Count)
                    .await?
                    .into_iter()
                    .map(|e| e.key)
                    .collect();
            }
        }

        Ok(StoreReceipt {
            key,
            size_bytes,
            evicted,
            utilization_percent: utilization_percent(state.total_size, self.config.max_size_bytes),
        })
    }

    /// Store unprocessed data in the raw tier (low priority).
    pub async fn store_raw(&self, name: &str, description: &str, value: Value) -> Result<StoreReceipt> {
        self.store(name, description, value, StoreOptions::tier(Tier::Raw))
            .await
    }

    /// Store condensed data in the summary tier (normal priority).
    ///
    /// `derived_from` records which keys the summary came from. It is kept
    /// for provenance only.
    pub async fn store_summary(
        &self,
        name: &str,
        description: &str,
        value: Value,
        derived_from: &[&str],
    ) -> Result<StoreReceipt> {
        let options = StoreOptions::tier(Tier::Summary).with_derived_from(derived_from.iter().copied());
        self.store(name, description, value, options).await
    }

    /// Store conclusions in the findings tier (high priority).
    pub async fn store_findings(
        &self,
        name: &str,
        description: &str,
        value: Value,
        derived_from: &[&str],
    ) -> Result<StoreReceipt> {
        let options = StoreOptions::tier(Tier::Findings).with_derived_from(derived_from.iter().copied());
        self.store(name, description, value, options).await
    }

    fn check_description(&self, description: &str) -> Result<()> {
        let len = description.chars().count();
        if len > self.config.max_description_len {
            return Err(MemoryError::DescriptionTooLong {
                len,
                max: self.config.max_description_len,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read a value, recording the access. Missing keys yield `None`.
    pub async fn retrieve(&self, key: &str) -> Result<Option<Value>> {
        let _state = self.state.lock().await;
        self.retrieve_locked(key).await
    }

    /// Read several values in request order, omitting missing keys.
    pub async fn retrieve_many(&self, keys: &[&str]) -> Result<Vec<(String, Value)>> {
        let _state = self.state.lock().await;
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.retrieve_locked(key).await? {
                found.push((key.to_string(), value));
            }
        }
        Ok(found)
    }

    async fn retrieve_locked(&self, key: &str) -> Result<Option<Value>> {
        let Some(mut entry) = self.backend.get(key).await? else {
            return Ok(None);
        };
        entry.touch();
        let value = entry.value.clone();
        self.backend.set(entry).await?;
        Ok(Some(value))
    }

    /// Full entry without recording an access.
    pub async fn peek(&self, key: &str) -> Result<Option<MemoryEntry>> {
        let _state = self.state.lock().await;
        Ok(self.backend.get(key).await?)
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Delete an entry. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.delete_locked(&mut state, key).await
    }

    async fn delete_locked(&self, state: &mut StoreState, key: &str) -> Result<bool> {
        let Some(entry) = self.backend.get(key).await? else {
            return Ok(false);
        };
        let removed = self.backend.delete(key).await?;
        if removed {
            state.total_size = state.total_size.saturating_sub(entry.size_bytes);
            state.entry_count = state.entry_count.saturating_sub(1);
            debug!("Deleted '{}'", key);
        }
        Ok(removed)
    }

    /// Remove every entry. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let removed = state.entry_count;
        self.backend.clear().await?;
        *state = StoreState::default();
        info!("Cleared memory store ({} entries)", removed);
        Ok(removed)
    }

    /// Remove entries in `scope`. Returns how many entries were deleted.
    ///
    /// For a task scope, the listed task ids are unbound from task-scoped
    /// entries; entries left with no task are deleted.
    pub async fn clear_scope(&self, scope: &MemoryScope) -> Result<usize> {
        let mut state = self.state.lock().await;
        let mut deleted = 0;

        for mut entry in self.backend.list().await? {
            let mut rebound = None;
            let delete = match (scope, &entry.scope) {
                (MemoryScope::Session, MemoryScope::Session)
                | (MemoryScope::Persistent, MemoryScope::Persistent) => true,
                (MemoryScope::Tasks(cleared), MemoryScope::Tasks(bound)) => {
                    let remaining: BTreeSet<String> = bound.difference(cleared).cloned().collect();
                    if remaining.len() != bound.len() && !remaining.is_empty() {
                        rebound = Some(remaining.clone());
                    }
                    remaining.is_empty()
                }
                _ => false,
            };

            if delete {
                if self.delete_locked(&mut state, &entry.key).await? {
                    deleted += 1;
                }
            } else if let Some(tasks) = rebound {
                entry.scope = MemoryScope::Tasks(tasks);
                self.backend.set(entry).await?;
            }
        }

        info!("Cleared scope {:?}: {} entries deleted", scope, deleted);
        Ok(deleted)
    }

    /// Delete the raw-tier subset of `keys`. Returns how many were removed.
    pub async fn cleanup_raw_data(&self, keys: &[&str]) -> Result<usize> {
        let mut state = self.state.lock().await;
        let mut removed = 0;
        for key in keys {
            if Tier::parse_key(key) != Some(Tier::Raw) {
                continue;
            }
            if self.delete_locked(&mut state, key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Cleaned up {} raw entries", removed);
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Protection and lifetime
    // ------------------------------------------------------------------

    /// Pin an entry, exempting it from all eviction. Returns whether it exists.
    pub async fn pin(&self, key: &str) -> Result<bool> {
        let _state = self.state.lock().await;
        let Some(mut entry) = self.backend.get(key).await? else {
            return Ok(false);
        };
        if !entry.pinned {
            entry.pinned = true;
            entry.updated_at = Utc::now();
            self.backend.set(entry).await?;
            debug!("Pinned '{}'", key);
        }
        Ok(true)
    }

    /// Unpin an entry and set its priority to `priority`, or the tier
    /// default when `None`. Returns whether it exists.
    pub async fn unpin(&self, key: &str, priority: Option<Priority>) -> Result<bool> {
        let _state = self.state.lock().await;
        let Some(mut entry) = self.backend.get(key).await? else {
            return Ok(false);
        };
        entry.pinned = false;
        entry.priority = priority.unwrap_or_else(|| default_priority_for_key(key));
        entry.updated_at = Utc::now();
        self.backend.set(entry).await?;
        debug!("Unpinned '{}'", key);
        Ok(true)
    }

    /// Make an entry persistent. Idempotent.
    pub async fn persist(&self, key: &str) -> Result<()> {
        let _state = self.state.lock().await;
        let mut entry = self
            .backend
            .get(key)
            .await?
            .ok_or_else(|| MemoryError::KeyNotFound(key.to_string()))?;
        if entry.scope.is_persistent() {
            return Ok(());
        }
        entry.scope = MemoryScope::Persistent;
        entry.updated_at = Utc::now();
        self.backend.set(entry).await?;
        debug!("Persisted '{}'", key);
        Ok(())
    }

    /// Move an entry to `target`, returning its new key.
    ///
    /// The entry is re-created under the target-prefixed key with the target
    /// tier's default priority; description, scope, pin and lineage carry
    /// over. Promoting to the current tier returns the key unchanged.
    pub async fn promote(&self, key: &str, target: Tier) -> Result<String> {
        let mut state = self.state.lock().await;
        let entry = self
            .backend
            .get(key)
            .await?
            .ok_or_else(|| MemoryError::KeyNotFound(key.to_string()))?;

        if entry.tier() == Some(target) {
            return Ok(key.to_string());
        }

        let new_key = target.qualify(Tier::base_name(key));
        validate_key(&new_key)?;

        if new_key != key {
            // The target key may already hold another entry, which the promoted one replaces.
            self.delete_locked(&mut state, &new_key).await?;
        }
        self.delete_locked(&mut state, key).await?;

        let mut promoted = entry;
        promoted.key = new_key.clone();
        promoted.priority = target.default_priority();
        promoted.updated_at = Utc::now();
        let size_bytes = promoted.size_bytes;
        self.backend.set(promoted).await?;
        state.total_size += size_bytes;
        state.entry_count += 1;

        info!("Promoted '{}' to '{}'", key, new_key);
        self.observer.notify(&MemoryEvent::Stored {
            key: new_key.clone(),
            size_bytes,
            tier: Some(target),
        });
        Ok(new_key)
    }

    // ------------------------------------------------------------------
    // Eviction
    // ------------------------------------------------------------------

    /// Evict up to `count` entries, lowest priority then least recently used first.
    pub async fn evict_lru(&self, count: usize) -> Result<Vec<String>> {
        let entries = self.evict_entries(count, EvictionPolicy::Lru).await?;
        Ok(entries.into_iter().map(|e| e.key).collect())
    }

    /// Evict up to `count` entries, lowest priority then largest first.
    pub async fn evict_by_size(&self, count: usize) -> Result<Vec<String>> {
        let entries = self.evict_entries(count, EvictionPolicy::Size).await?;
        Ok(entries.into_iter().map(|e| e.key).collect())
    }

    /// Evict up to `count` entries under `policy`, returning the removed entries.
    pub async fn evict_entries(&self, count: usize, policy: EvictionPolicy) -> Result<Vec<MemoryEntry>> {
        let reason = match policy {
            EvictionPolicy::Lru => EvictionReason::Lru,
            EvictionPolicy::Size => EvictionReason::Size,
        };
        let mut state = self.state.lock().await;
        self.evict_locked(&mut state, count, policy, reason).await
    }

    async fn evict_locked(
        &self,
        state: &mut StoreState,
        count: usize,
        policy: EvictionPolicy,
        reason: EvictionReason,
    ) -> Result<Vec<MemoryEntry>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let candidates = eviction_candidates(self.backend.list().await?, policy);
        let mut removed = Vec::new();
        for entry in candidates.into_iter().take(count) {
            if self.backend.delete(&entry.key).await? {
                state.total_size = state.total_size.saturating_sub(entry.size_bytes);
                state.entry_count = state.entry_count.saturating_sub(1);
                removed.push(entry);
            }
        }

        if !removed.is_empty() {
            let keys: Vec<String> = removed.iter().map(|e| e.key.clone()).collect();
            info!("Evicted {} entries ({}): {:?}", keys.len(), reason, keys);
            self.observer.notify(&MemoryEvent::Evicted { keys, reason });
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Ranked index of stored entries, capped at `max_index_entries`.
    pub async fn index(&self) -> Result<MemoryIndex> {
        let state = self.state.lock().await;
        let entries = self.backend.list().await?;
        Ok(MemoryIndex::build(
            entries,
            self.config.max_index_entries,
            state.total_size,
            self.config.max_size_bytes,
        ))
    }

    /// Rendered index text, naming the configured retrieval tool.
    pub async fn render_index(&self) -> Result<String> {
        Ok(self.index().await?.render(&self.config.retrieval_tool))
    }

    /// Per-tier counts and sizes.
    pub async fn tier_stats(&self) -> Result<TierStats> {
        let _state = self.state.lock().await;
        let entries = self.backend.list().await?;
        Ok(TierStats::collect(&entries))
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let _state = self.state.lock().await;
        let mut keys: Vec<String> = self
            .backend
            .list()
            .await?
            .into_iter()
            .map(|e| e.key)
            .collect();
        keys.sort();
        Ok(keys)
    }
}

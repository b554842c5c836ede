//! Storage backends.
//!
//! The store only needs a key/value contract over [`MemoryEntry`]; it behaves
//! the same against the in-process map and the JSON file implementation, and
//! any remote implementation owns its own timeouts and retries.

use crate::entry::MemoryEntry;
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Key/value contract the tiered store runs on.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Get an entry by key.
    async fn get(&self, key: &str) -> BackendResult<Option<MemoryEntry>>;

    /// Insert or replace an entry under its key.
    async fn set(&self, entry: MemoryEntry) -> BackendResult<()>;

    /// Delete an entry. Returns whether it existed.
    async fn delete(&self, key: &str) -> BackendResult<bool>;

    /// All entries, in no particular order.
    async fn list(&self) -> BackendResult<Vec<MemoryEntry>>;

    /// Remove every entry.
    async fn clear(&self) -> BackendResult<()>;
}

/// In-memory backend.
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a backend pre-populated with entries.
    pub fn with_entries(entries: impl IntoIterator<Item = MemoryEntry>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(|e| (e.key.clone(), e)).collect()),
        }
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<MemoryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, entry: MemoryEntry) -> BackendResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some())
    }

    async fn list(&self) -> BackendResult<Vec<MemoryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.values().cloned().collect())
    }

    async fn clear(&self) -> BackendResult<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        Ok(())
    }
}

/// File-backed store with JSON persistence.
///
/// All mutations are persisted to disk via atomic writes (write to tmp, then rename).
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl FileBackend {
    /// Open a file-backed store.
    ///
    /// If the file at `path` exists, its contents are deserialized into memory.
    /// If the file does not exist, the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> BackendResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically persist the current entries to disk.
    fn save(&self, entries: &HashMap<String, MemoryEntry>) -> BackendResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("tmp");
        let data = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for FileBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<MemoryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, entry: MemoryEntry) -> BackendResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.key.clone(), entry);
        self.save(&entries)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        let mut entries = self.entries.write().await;
        let existed = entries.remove(key).is_some();
        if existed {
            self.save(&entries)?;
        }
        Ok(existed)
    }

    async fn list(&self) -> BackendResult<Vec<MemoryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.values().cloned().collect())
    }

    async fn clear(&self) -> BackendResult<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.save(&entries)?;
        Ok(())
    }
}

//! Memory seen from the compaction orchestrator.

use async_trait::async_trait;
use ctxwarden_memory::{MemoryError, TieredMemoryStore};

/// What the orchestrator needs from working memory.
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Current index text for the context.
    async fn render_index(&self) -> Result<String, MemoryError>;

    /// Evict the lowest-ranked evictable entry. Returns its key, or `None`
    /// when nothing can be evicted.
    async fn evict_one(&self) -> Result<Option<String>, MemoryError>;
}

#[async_trait]
impl MemoryProvider for TieredMemoryStore {
    async fn render_index(&self) -> Result<String, MemoryError> {
        TieredMemoryStore::render_index(self).await
    }

    async fn evict_one(&self) -> Result<Option<String>, MemoryError> {
        Ok(self.evict_lru(1).await?.into_iter().next())
    }
}

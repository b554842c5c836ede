//! Narrow store view handed to sandboxed tool code.

use crate::entry::StoreOptions;
use crate::store::{StoreReceipt, TieredMemoryStore};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;

/// Get/set/delete over a [`TieredMemoryStore`].
///
/// Tool code gets no way to pin, promote, persist, or evict; those stay with
/// the agent runtime.
#[derive(Clone)]
pub struct MemoryAccess {
    store: Arc<TieredMemoryStore>,
}

impl MemoryAccess {
    pub(crate) fn new(store: Arc<TieredMemoryStore>) -> Self {
        Self { store }
    }

    /// Read a value.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.store.retrieve(key).await
    }

    /// Write a value with default options. A missing description is stored empty.
    pub async fn set(&self, key: &str, value: Value, description: Option<&str>) -> Result<StoreReceipt> {
        self.store
            .store(key, description.unwrap_or_default(), value, StoreOptions::new())
            .await
    }

    /// Delete a value. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.store.delete(key).await
    }
}

impl std::fmt::Debug for MemoryAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAccess").finish_non_exhaustive()
    }
}

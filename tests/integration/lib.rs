//! Shared fixtures for the ctxwarden integration tests.

use ctxwarden_core::config::MemoryConfig;
use ctxwarden_core::RecordingObserver;
use ctxwarden_memory::{InMemoryBackend, MemoryBackend, MemoryEvent, TieredMemoryStore};
use serde_json::Value;
use std::sync::Arc;

/// A store over `backend` with the given byte cap, no entry cap, and an
/// observer recording every event.
pub async fn store_over(
    backend: Arc<dyn MemoryBackend>,
    max_size_bytes: u64,
) -> (Arc<TieredMemoryStore>, Arc<RecordingObserver<MemoryEvent>>) {
    let config = MemoryConfig {
        max_size_bytes,
        max_entries: None,
        ..MemoryConfig::default()
    };
    let recorder = Arc::new(RecordingObserver::new());
    let store = TieredMemoryStore::open(backend, config)
        .await
        .expect("open store")
        .with_observer(recorder.clone());
    (Arc::new(store), recorder)
}

/// An empty in-memory store with the given byte cap.
pub async fn memory_store(max_size_bytes: u64) -> (Arc<TieredMemoryStore>, Arc<RecordingObserver<MemoryEvent>>) {
    store_over(Arc::new(InMemoryBackend::new()), max_size_bytes).await
}

/// A JSON string value of `chars` characters; it measures `chars + 2` bytes.
pub fn text_value(chars: usize) -> Value {
    Value::String("x".repeat(chars))
}

//! Tiered memory store scenarios across the public API.

use chrono::{Duration, Utc};
use ctxwarden_core::config::MemoryConfig;
use ctxwarden_integration_tests::{memory_store, store_over, text_value};
use ctxwarden_memory::{
    EvictionReason, FileBackend, InMemoryBackend, MemoryEntry, MemoryError, MemoryEvent, Priority,
    StoreOptions, Tier, TieredMemoryStore,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_limit_warning_then_hard_limit() {
    let (store, recorder) = memory_store(10 * 1024).await;

    store.store_raw("search", "web search results", text_value(3000)).await.unwrap();
    store.store_summary("ai", "summary of results", text_value(2000), &["raw.search"]).await.unwrap();
    store.store_findings("main", "key findings", text_value(1000), &["summary.ai"]).await.unwrap();
    assert!(store.pin("findings.main").await.unwrap());
    assert!(!recorder
        .events()
        .iter()
        .any(|e| matches!(e, MemoryEvent::LimitWarning { .. })));

    // 6006 + 2702 bytes crosses 80% of 10 KB
    store.store("notes", "scratch", text_value(2700), StoreOptions::new()).await.unwrap();
    let warnings: Vec<f64> = recorder
        .events()
        .iter()
        .filter_map(|e| match e {
            MemoryEvent::LimitWarning { utilization_percent, .. } => Some(*utilization_percent),
            _ => None,
        })
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0] >= 85.0 && warnings[0] < 86.0);

    let before = store.index().await.unwrap().total_size_bytes;
    assert_eq!(before, 8708);

    let err = store
        .store("more", "too much", text_value(2000), StoreOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MemoryError::MemoryLimitExceeded { required: 10710, limit: 10240, .. }
    ));
    assert_eq!(store.index().await.unwrap().total_size_bytes, before);
    assert!(store.peek("more").await.unwrap().is_none());
}

#[tokio::test]
async fn test_lru_eviction_prefers_stale_entries() {
    let now = Utc::now();
    let backend = InMemoryBackend::with_entries(vec![
        MemoryEntry::new("old", "", json!(1)).with_last_accessed(now - Duration::minutes(5)),
        MemoryEntry::new("new", "", json!(1)).with_last_accessed(now),
    ]);
    let (store, recorder) = store_over(Arc::new(backend), 1024).await;

    assert_eq!(store.evict_lru(1).await.unwrap(), vec!["old"]);
    assert_eq!(store.keys().await.unwrap(), vec!["new"]);
    assert_eq!(
        recorder.events(),
        vec![MemoryEvent::Evicted {
            keys: vec!["old".to_string()],
            reason: EvictionReason::Lru,
        }]
    );
}

#[tokio::test]
async fn test_priority_dominates_recency() {
    let now = Utc::now();
    let backend = InMemoryBackend::with_entries(vec![
        MemoryEntry::new("old", "", json!(1))
            .with_priority(Priority::Low)
            .with_last_accessed(now),
        MemoryEntry::new("new", "", json!(1))
            .with_priority(Priority::Critical)
            .with_last_accessed(now - Duration::minutes(5)),
    ]);
    let (store, _) = store_over(Arc::new(backend), 1024).await;

    assert_eq!(store.evict_lru(1).await.unwrap(), vec!["old"]);
    assert!(store.evict_lru(1).await.unwrap().is_empty());
    assert!(store.evict_by_size(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_promote_raw_to_summary() {
    let (store, _) = memory_store(10 * 1024).await;
    store.store_raw("x", "extracted table", json!({"rows": 12})).await.unwrap();

    let key = store.promote("raw.x", Tier::Summary).await.unwrap();
    assert_eq!(key, "summary.x");
    assert!(store.peek("raw.x").await.unwrap().is_none());
    let entry = store.peek("summary.x").await.unwrap().unwrap();
    assert_eq!(entry.priority, Priority::Normal);
    assert_eq!(entry.value, json!({"rows": 12}));

    let again = store.promote("summary.x", Tier::Summary).await.unwrap();
    assert_eq!(again, "summary.x");
    assert_eq!(store.peek("summary.x").await.unwrap().unwrap(), entry);
}

async fn four_priorities(store: &TieredMemoryStore) {
    store.store_raw("low", "low priority", json!(1)).await.unwrap();
    store.store_summary("normal", "normal priority", json!(2), &[]).await.unwrap();
    store.store_findings("high", "high priority", json!(3), &[]).await.unwrap();
    store
        .store("critical", "critical", json!(4), StoreOptions::new().with_priority(Priority::Critical))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_index_cap_with_auto_eviction() {
    let config = MemoryConfig {
        max_entries: Some(2),
        max_index_entries: 2,
        ..MemoryConfig::default()
    };
    let store = TieredMemoryStore::open(Arc::new(InMemoryBackend::new()), config)
        .await
        .unwrap();
    four_priorities(&store).await;

    let index = store.index().await.unwrap();
    assert_eq!(index.total_entry_count, 2);
    assert_eq!(index.omitted_count, 0);
    let keys: Vec<&str> = index.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["critical", "findings.high"]);
}

#[tokio::test]
async fn test_index_cap_without_auto_eviction() {
    let config = MemoryConfig {
        max_entries: None,
        max_index_entries: 2,
        ..MemoryConfig::default()
    };
    let store = TieredMemoryStore::open(Arc::new(InMemoryBackend::new()), config)
        .await
        .unwrap();
    four_priorities(&store).await;

    let index = store.index().await.unwrap();
    assert_eq!(index.total_entry_count, 4);
    assert_eq!(index.omitted_count, 2);
    let rendered = store.render_index().await.unwrap();
    assert!(rendered.contains("(2 more entries omitted from this index)"));
    assert!(rendered.contains("`critical`"));
    assert!(rendered.contains("`findings.high`"));
    assert!(!rendered.contains("`raw.low`"));
}

#[tokio::test]
async fn test_persist_is_idempotent() {
    let (store, _) = memory_store(1024).await;
    store.store("k", "", json!("v"), StoreOptions::new()).await.unwrap();
    store.persist("k").await.unwrap();
    let once = store.peek("k").await.unwrap().unwrap();
    store.persist("k").await.unwrap();
    assert_eq!(store.peek("k").await.unwrap().unwrap(), once);
}

#[tokio::test]
async fn test_cleanup_removes_exactly_raw_subset() {
    let (store, _) = memory_store(10 * 1024).await;
    for name in ["a", "b", "c"] {
        store.store_raw(name, "", json!(name)).await.unwrap();
        store.store_summary(name, "", json!(name), &[]).await.unwrap();
    }

    let removed = store
        .cleanup_raw_data(&["raw.a", "raw.c", "summary.b", "raw.zzz"])
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(
        store.keys().await.unwrap(),
        vec!["raw.b", "summary.a", "summary.b", "summary.c"]
    );
}

#[tokio::test]
async fn test_store_retrieve_delete_roundtrip() {
    let (store, _) = memory_store(10 * 1024).await;
    let values = [json!(null), json!(3.5), json!("text"), json!([1, {"a": [true]}])];
    for (i, value) in values.iter().enumerate() {
        let key = format!("item{}", i);
        store.store(&key, "", value.clone(), StoreOptions::new()).await.unwrap();
        assert_eq!(store.retrieve(&key).await.unwrap().as_ref(), Some(value));
        assert!(store.delete(&key).await.unwrap());
        assert_eq!(store.retrieve(&key).await.unwrap(), None);
    }
    assert_eq!(store.total_size_bytes().await, 0);
}

#[tokio::test]
async fn test_file_backend_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("memory.json");

    {
        let backend = FileBackend::open(&path).unwrap();
        let (store, _) = store_over(Arc::new(backend), 10 * 1024).await;
        store.store_findings("answer", "final answer", json!(42), &["raw.calc"]).await.unwrap();
        store.pin("findings.answer").await.unwrap();
    }

    let backend = FileBackend::open(&path).unwrap();
    let (store, _) = store_over(Arc::new(backend), 10 * 1024).await;
    assert_eq!(store.len().await, 1);
    assert_eq!(store.total_size_bytes().await, 2);
    let entry = store.peek("findings.answer").await.unwrap().unwrap();
    assert!(entry.pinned);
    assert_eq!(entry.derived_from, vec!["raw.calc"]);
}

#[tokio::test]
async fn test_access_view_shares_store() {
    let (store, _) = memory_store(1024).await;
    let access = store.access();

    access.set("scratch", json!([1, 2]), None).await.unwrap();
    assert_eq!(store.len().await, 1);
    assert_eq!(access.get("scratch").await.unwrap(), Some(json!([1, 2])));
    assert!(access.delete("scratch").await.unwrap());
    assert!(store.is_empty().await);
}

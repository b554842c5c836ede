//! Budget and compaction scenarios over a real memory store.

use ctxwarden_context::{
    BudgetCalculator, BudgetStatus, CompactionOrchestrator, CompactionStrategy, ContextComponents,
    ContextError, MemoryResource, RecencyHistoryProvider, ResourceCompactor, StaticInstructions,
    StaticToolCatalog, ToolCategoryLoader, ToolCategoryResource,
};
use ctxwarden_core::config::{BudgetConfig, CompactionCategory};
use ctxwarden_core::{ContentType, Message, ToolDefinition};
use ctxwarden_integration_tests::memory_store;
use ctxwarden_memory::{StoreOptions, TieredMemoryStore};
use serde_json::json;
use std::sync::Arc;

/// 1000-token window, no reserve, compaction at 75%, hard limit at 90%.
fn calculator() -> BudgetCalculator {
    BudgetCalculator::new(BudgetConfig {
        total_tokens: 1000,
        reserve_fraction: 0.0,
        compaction_threshold_percent: 75.0,
        hard_limit_percent: 90.0,
    })
}

/// Prose system prompt of exactly `tokens` tokens.
fn prose(tokens: usize) -> String {
    "p".repeat(tokens * 4)
}

async fn seeded_store() -> Arc<TieredMemoryStore> {
    let (store, _) = memory_store(64 * 1024).await;
    store.store_raw("search", "web search results for the query", json!("r".repeat(400))).await.unwrap();
    store.store_summary("search", "condensed search results", json!("s".repeat(120)), &["raw.search"]).await.unwrap();
    store.store_findings("answer", "current best answer", json!("a".repeat(60)), &[]).await.unwrap();
    store
}

#[tokio::test]
async fn test_budget_with_memory_index_below_threshold() {
    let store = seeded_store().await;
    let index = store.render_index().await.unwrap();
    let calculator = calculator();
    let index_tokens = calculator.estimate(&index, ContentType::Prose);

    let components = ContextComponents::new()
        .with_system_prompt(prose(600 - index_tokens))
        .with_memory_index(index.clone());
    let orchestrator = CompactionOrchestrator::new(calculator, CompactionStrategy::default());

    let prepared = orchestrator
        .prepare_context(components, store.as_ref(), &RecencyHistoryProvider::new())
        .await
        .unwrap();

    assert!(!prepared.compacted);
    assert_eq!(prepared.snapshot.used, 600);
    assert_eq!(prepared.snapshot.available, 400);
    assert_eq!(prepared.snapshot.utilization_percent, 60.0);
    assert_eq!(prepared.snapshot.status, BudgetStatus::Ok);
    assert_eq!(prepared.components.memory_index, index);
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn test_overflow_when_nothing_is_compactable() {
    let (store, _) = memory_store(64 * 1024).await;
    store
        .store("rules", "house rules", json!("always cite sources"), StoreOptions::new().pinned())
        .await
        .unwrap();
    let index = store.render_index().await.unwrap();
    let calculator = calculator();
    let index_tokens = calculator.estimate(&index, ContentType::Prose);

    let components = ContextComponents::new()
        .with_system_prompt(prose(960 - index_tokens))
        .with_memory_index(index);
    let orchestrator = CompactionOrchestrator::new(calculator, CompactionStrategy::default());

    let err = orchestrator
        .prepare_context(components, store.as_ref(), &RecencyHistoryProvider::new())
        .await
        .unwrap_err();

    match err {
        ContextError::ContextOverflow { used, limit, utilization_percent, log } => {
            assert_eq!(used, 960);
            assert_eq!(limit, 1000);
            assert_eq!(utilization_percent, 96.0);
            assert_eq!(log.len(), 3);
            assert!(log.iter().all(|step| step.tokens_freed() == 0));
        }
        other => panic!("expected overflow, got {:?}", other),
    }
    assert_eq!(store.keys().await.unwrap(), vec!["rules"]);
}

#[tokio::test]
async fn test_memory_eviction_keeps_pinned_entries() {
    let (store, _) = memory_store(64 * 1024).await;
    store
        .store("rules", "house rules", json!("always cite sources"), StoreOptions::new().pinned())
        .await
        .unwrap();
    let calculator = calculator();
    let pinned_only = calculator.estimate(&store.render_index().await.unwrap(), ContentType::Prose);

    for i in 0..8 {
        store
            .store_raw(
                &format!("page{}", i),
                &format!("fetched page {} with a long descriptive summary line", i),
                json!("x".repeat(200)),
            )
            .await
            .unwrap();
    }
    let index = store.render_index().await.unwrap();

    // ends at 740 tokens once only the pinned entry remains
    let components = ContextComponents::new()
        .with_system_prompt(prose(740 - pinned_only))
        .with_memory_index(index);
    let strategy = CompactionStrategy::default().with_categories([CompactionCategory::Memory]);
    let orchestrator = CompactionOrchestrator::new(calculator, strategy);
    assert_ne!(orchestrator.snapshot(&components).status, BudgetStatus::Ok);

    let prepared = orchestrator
        .prepare_context(components, store.as_ref(), &RecencyHistoryProvider::new())
        .await
        .unwrap();

    assert!(prepared.compacted);
    assert_eq!(prepared.snapshot.status, BudgetStatus::Ok);
    assert_eq!(prepared.log.len(), 1);
    assert_eq!(prepared.log[0].category, CompactionCategory::Memory);
    assert!(store.keys().await.unwrap().contains(&"rules".to_string()));
    assert!(store.len().await < 9);
    assert_eq!(prepared.components.memory_index, store.render_index().await.unwrap());
}

#[tokio::test]
async fn test_history_and_tool_outputs_compact_in_order() {
    let history: Vec<Message> = (0..20)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {} {}", i, "q".repeat(120)))
            } else {
                Message::assistant(format!("answer {} {}", i, "a".repeat(120)))
            }
        })
        .collect();
    let components = ContextComponents::new()
        .with_system_prompt(prose(300))
        .with_history(history)
        .with_tool_output("fetch", json!("f".repeat(3000)));

    let mut strategy = CompactionStrategy::default();
    strategy.max_tool_output_tokens = 100;
    let orchestrator = CompactionOrchestrator::new(calculator(), strategy);
    let before = orchestrator.snapshot(&components);
    assert_eq!(before.status, BudgetStatus::Critical);

    let (store, _) = memory_store(1024).await;
    let prepared = orchestrator
        .prepare_context(components, store.as_ref(), &RecencyHistoryProvider::new())
        .await
        .unwrap();

    assert!(prepared.compacted);
    assert_eq!(prepared.snapshot.status, BudgetStatus::Ok);
    assert_eq!(prepared.log[0].category, CompactionCategory::ToolOutputs);
    assert!(prepared.log[0].tokens_freed() > 0);
    assert_eq!(prepared.log.len(), 2);
    assert_eq!(prepared.log[1].category, CompactionCategory::History);
    assert!(prepared.components.history.len() < 20);
    assert_eq!(
        prepared.components.history.last().map(|m| m.content.clone()),
        Some(format!("answer 19 {}", "a".repeat(120)))
    );
    assert!(prepared.snapshot.used < before.used);
}

#[tokio::test]
async fn test_resource_compactor_over_memory_and_tools() {
    let (store, _) = memory_store(64 * 1024).await;
    store.store_raw("dump", "", json!("d".repeat(700))).await.unwrap();
    store
        .store("keep", "", json!("k".repeat(700)), StoreOptions::new().pinned())
        .await
        .unwrap();

    let schema = json!({"type": "object", "properties": {"query": {"type": "string"}}});
    let catalog = StaticToolCatalog::new()
        .with_category("search", vec![ToolDefinition::new("web_search", "Search the web", schema.clone())])
        .with_category("mail", vec![ToolDefinition::new("send_mail", "Send an email", schema)]);
    let loader = Arc::new(ToolCategoryLoader::new(Arc::new(catalog)));
    let search_tokens = loader.load("search").unwrap();
    loader.load("mail").unwrap();
    loader.pin("mail");

    let compactor = ResourceCompactor::new()
        .with_resource(Arc::new(StaticInstructions::new("instructions", "Be concise.")))
        .with_resource(Arc::new(MemoryResource::new(store.clone())))
        .with_resource(Arc::new(ToolCategoryResource::new(loader.clone())));

    // 700 chars of mixed content is 200 tokens
    let report = compactor.compact(210).await.unwrap();
    assert!(report.is_satisfied());
    assert_eq!(report.freed_tokens, 200 + search_tokens);
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes[0].skipped);
    assert_eq!(report.outcomes[1].freed_tokens, 200);
    assert_eq!(report.outcomes[2].freed_tokens, search_tokens);

    assert_eq!(store.keys().await.unwrap(), vec!["keep"]);
    assert_eq!(loader.loaded_categories(), vec!["mail"]);
}

//! CLI routing integration tests.
//!
//! These tests parse real argument vectors and run them against temporary
//! store and config files.

use clap::Parser;
use ctxwarden_cli::{load_config, run, Cli};
use ctxwarden_core::config::Config;
use ctxwarden_memory::{FileBackend, Priority, TieredMemoryStore};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

async fn run_args(args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["ctxwarden"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;
    run(cli, Config::default()).await
}

async fn reopen(path: &Path) -> TieredMemoryStore {
    let backend = FileBackend::open(path).unwrap();
    TieredMemoryStore::open(Arc::new(backend), Config::default().memory)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_memory_lifecycle_through_cli() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("memory.json");
    let store_arg = store.to_str().unwrap();

    run_args(&["memory", "--store", store_arg, "put", "search", "{\"hits\": 3}", "--tier", "raw", "-d", "search hits"])
        .await
        .unwrap();
    run_args(&["memory", "--store", store_arg, "put", "note", "plain text", "--priority", "high"])
        .await
        .unwrap();
    run_args(&["memory", "--store", store_arg, "promote", "raw.search", "findings"])
        .await
        .unwrap();
    run_args(&["memory", "--store", store_arg, "pin", "findings.search"])
        .await
        .unwrap();

    let reopened = reopen(&store).await;
    assert_eq!(reopened.keys().await.unwrap(), vec!["findings.search", "note"]);
    let findings = reopened.peek("findings.search").await.unwrap().unwrap();
    assert_eq!(findings.value, json!({"hits": 3}));
    assert!(findings.pinned);
    let note = reopened.peek("note").await.unwrap().unwrap();
    assert_eq!(note.value, json!("plain text"));
    assert_eq!(note.priority, Priority::High);
    drop(reopened);

    // only the unpinned entry is evictable
    run_args(&["memory", "--store", store_arg, "evict", "5"]).await.unwrap();
    assert_eq!(reopen(&store).await.keys().await.unwrap(), vec!["findings.search"]);

    run_args(&["memory", "--store", store_arg, "clear"]).await.unwrap();
    assert!(reopen(&store).await.is_empty().await);
}

#[tokio::test]
async fn test_memory_errors_surface() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("memory.json");
    let store_arg = store.to_str().unwrap();

    assert!(run_args(&["memory", "--store", store_arg, "get", "missing"]).await.is_err());
    assert!(run_args(&["memory", "--store", store_arg, "promote", "missing", "summary"]).await.is_err());
    assert!(run_args(&["memory", "--store", store_arg, "put", "k", "v", "--persistent", "--task", "t1"])
        .await
        .is_err());
}

#[tokio::test]
async fn test_task_scoped_clear() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("memory.json");
    let store_arg = store.to_str().unwrap();

    run_args(&["memory", "--store", store_arg, "put", "a", "1", "--task", "t1"]).await.unwrap();
    run_args(&["memory", "--store", store_arg, "put", "b", "2", "--task", "t1", "--task", "t2"])
        .await
        .unwrap();
    run_args(&["memory", "--store", store_arg, "put", "c", "3", "--persistent"]).await.unwrap();

    run_args(&["memory", "--store", store_arg, "clear", "--task", "t1"]).await.unwrap();
    assert_eq!(reopen(&store).await.keys().await.unwrap(), vec!["b", "c"]);
}

#[tokio::test]
async fn test_config_init_and_validate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ctxwarden.json5");
    let path_arg = path.to_str().unwrap();

    run_args(&["--config", path_arg, "config", "init"]).await.unwrap();
    assert!(path.exists());
    assert!(run_args(&["--config", path_arg, "config", "init"]).await.is_err());
    run_args(&["--config", path_arg, "config", "init", "--force"]).await.unwrap();
    run_args(&["--config", path_arg, "config", "validate"]).await.unwrap();

    std::fs::write(&path, "{ budget: { total_tokens: 0 } }").unwrap();
    assert!(run_args(&["--config", path_arg, "config", "validate"]).await.is_err());
    assert_eq!(load_config(Some(&path)).unwrap().budget.total_tokens, 0);
}

#[tokio::test]
async fn test_estimate_and_truncate_files() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.md");
    std::fs::write(&notes, "Remember to cite sources.").unwrap();
    let output = dir.path().join("output.json");
    std::fs::write(&output, json!({"rows": vec![1; 500]}).to_string()).unwrap();

    run_args(&["estimate", notes.to_str().unwrap(), "-t", "prose"]).await.unwrap();
    run_args(&["truncate", output.to_str().unwrap(), "--max-tokens", "20"]).await.unwrap();
    assert!(run_args(&["estimate", "-t", "poetry", notes.to_str().unwrap()]).await.is_err());
}

#[tokio::test]
async fn test_budget_over_sections() {
    let dir = TempDir::new().unwrap();
    let prompt = dir.path().join("prompt.txt");
    std::fs::write(&prompt, "p".repeat(400)).unwrap();
    let history = dir.path().join("history.txt");
    std::fs::write(&history, "user: hi\nassistant: hello").unwrap();

    run_args(&[
        "budget",
        "-s",
        &format!("system={}", prompt.display()),
        "-s",
        &format!("history={}", history.display()),
        "-t",
        "system=prose",
        "--total-tokens",
        "1000",
        "--json",
    ])
    .await
    .unwrap();
    assert!(run_args(&["budget", "-s", "missing-separator"]).await.is_err());
}

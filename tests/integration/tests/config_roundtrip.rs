//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to disk,
//! and loaded back with identical field values.

use ctxwarden_core::config::{CompactionCategory, Config, ConfigBuilder, HistoryMode, LogLevel};
use ctxwarden_core::ConfigError;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.budget.total_tokens, config.budget.total_tokens);
    assert_eq!(loaded.memory.max_size_bytes, config.memory.max_size_bytes);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json5");

    let mut config = ConfigBuilder::new()
        .total_tokens(32_000)
        .thresholds(70.0, 85.0)
        .memory_max_bytes(4096)
        .memory_max_entries(Some(50))
        .log_level(LogLevel::Debug)
        .build();
    config.compaction.history_mode = HistoryMode::Summarize;
    config.compaction.categories = vec![CompactionCategory::Memory, CompactionCategory::History];
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.budget.total_tokens, 32_000);
    assert_eq!(loaded.budget.compaction_threshold_percent, 70.0);
    assert_eq!(loaded.memory.max_entries, Some(50));
    assert_eq!(loaded.compaction.history_mode, HistoryMode::Summarize);
    assert_eq!(
        loaded.compaction.categories,
        vec![CompactionCategory::Memory, CompactionCategory::History]
    );
    assert_eq!(loaded.logging.level, LogLevel::Debug);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/config.json5"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_config_parse_invalid() {
    assert!(Config::parse("not valid json").is_err());
    assert!(Config::parse("{ budget: { total_tokens: \"many\" } }").is_err());
}

#[test]
fn test_partial_file_fills_defaults() {
    let config = Config::parse("{ memory: { max_size_bytes: 2048 } }").unwrap();
    assert_eq!(config.memory.max_size_bytes, 2048);
    assert_eq!(config.budget, Config::default().budget);
    assert_eq!(config.compaction, Config::default().compaction);
}

#[test]
fn test_invalid_values_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");
    std::fs::write(
        &path,
        "{ budget: { compaction_threshold_percent: 95, hard_limit_percent: 90 }, memory: { warn_percent: 0 } }",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    match config.validate() {
        Err(ConfigError::Validation(message)) => {
            assert!(message.contains("hard_limit_percent"));
            assert!(message.contains("warn_percent"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

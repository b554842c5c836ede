//! Tool output truncation command.

use super::{parse_json_or_string, read_input};
use clap::Args;
use ctxwarden_context::{should_auto_store, truncate_tool_output_with};
use ctxwarden_core::config::Config;
use ctxwarden_core::HeuristicEstimator;
use std::path::PathBuf;

/// Truncate command arguments.
#[derive(Args)]
pub struct TruncateArgs {
    /// JSON file holding the tool output (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Token limit (defaults to compaction.max_tool_output_tokens)
    #[arg(short, long)]
    pub max_tokens: Option<usize>,
}

/// Run the truncate command.
pub async fn run(args: TruncateArgs, config: &Config) -> anyhow::Result<()> {
    let raw = read_input(args.file.as_deref()).await?;
    let value = parse_json_or_string(raw.trim_end());
    let max_tokens = args
        .max_tokens
        .unwrap_or(config.compaction.max_tool_output_tokens);

    if should_auto_store(&value, config.compaction.auto_store_threshold_tokens) {
        eprintln!(
            "note: output exceeds the auto-store threshold of {} tokens; consider writing it to memory",
            config.compaction.auto_store_threshold_tokens
        );
    }

    let estimator = HeuristicEstimator::with_calibration(config.tokens.chars_per_token);
    let truncated = truncate_tool_output_with(&estimator, &value, max_tokens);
    println!("{}", serde_json::to_string_pretty(&truncated)?);
    Ok(())
}

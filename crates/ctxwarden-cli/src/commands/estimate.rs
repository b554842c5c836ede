//! Token estimation command.

use super::read_input;
use clap::Args;
use ctxwarden_core::config::Config;
use ctxwarden_core::{ContentType, HeuristicEstimator, TokenEstimator};
use std::path::PathBuf;

/// Estimate command arguments.
#[derive(Args)]
pub struct EstimateArgs {
    /// File to estimate (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Content type: code, prose or mixed
    #[arg(short = 't', long)]
    pub content_type: Option<ContentType>,
}

/// Run the estimate command.
pub async fn run(args: EstimateArgs, config: &Config) -> anyhow::Result<()> {
    let text = read_input(args.file.as_deref()).await?;
    let content_type = args.content_type.unwrap_or(config.tokens.default_content_type);
    let estimator = HeuristicEstimator::with_calibration(config.tokens.chars_per_token);

    let tokens = estimator.estimate(&text, content_type);
    println!(
        "{} tokens ({} chars, {})",
        tokens,
        text.chars().count(),
        content_type
    );
    Ok(())
}

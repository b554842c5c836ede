//! Token budget command.

use super::{parse_named_path, read_input, split_key_value};
use crate::render;
use clap::Args;
use ctxwarden_context::{BudgetCalculator, ContentSection};
use ctxwarden_core::config::Config;
use ctxwarden_core::{ContentType, HeuristicEstimator};
use std::path::PathBuf;
use std::sync::Arc;

/// Budget command arguments.
#[derive(Args)]
pub struct BudgetArgs {
    /// Content section as NAME=PATH (repeatable)
    #[arg(short, long = "section", value_parser = parse_named_path, required = true)]
    pub sections: Vec<(String, PathBuf)>,

    /// Content type for a section as NAME=TYPE (repeatable)
    #[arg(short = 't', long = "content-type", value_parser = parse_section_type)]
    pub content_types: Vec<(String, ContentType)>,

    /// Override the configured total token budget
    #[arg(long)]
    pub total_tokens: Option<usize>,

    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_section_type(raw: &str) -> Result<(String, ContentType), String> {
    let (name, content_type) = split_key_value(raw)?;
    Ok((name, content_type.parse()?))
}

/// Run the budget command.
pub async fn run(args: BudgetArgs, config: &Config) -> anyhow::Result<()> {
    let mut budget = config.budget.clone();
    if let Some(total) = args.total_tokens {
        budget.total_tokens = total;
    }
    let calculator = BudgetCalculator::new(budget).with_estimator(Arc::new(
        HeuristicEstimator::with_calibration(config.tokens.chars_per_token),
    ));

    let mut sections = Vec::with_capacity(args.sections.len());
    for (name, path) in &args.sections {
        let text = read_input(Some(path)).await?;
        let content_type = args
            .content_types
            .iter()
            .find(|(section, _)| section == name)
            .map(|(_, content_type)| *content_type)
            .unwrap_or(config.tokens.default_content_type);
        sections.push(ContentSection::new(name.clone(), text, content_type));
    }

    let snapshot = calculator.estimate_budget(&sections);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        render::print_budget(&snapshot);
    }
    Ok(())
}

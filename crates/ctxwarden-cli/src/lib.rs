//! ctxwarden command-line interface.

pub mod commands;
pub mod render;

use clap::{Parser, Subcommand};
use ctxwarden_core::config::{Config, LogLevel};
use ctxwarden_core::paths;
use std::path::{Path, PathBuf};

/// ctxwarden - token budgets and working memory for LLM agents
#[derive(Parser)]
#[command(name = "ctxwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "CTXWARDEN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Estimate the token count of a file or stdin
    Estimate(commands::estimate::EstimateArgs),

    /// Show the token budget for a set of content sections
    Budget(commands::budget::BudgetArgs),

    /// Truncate a JSON tool output to a token limit
    Truncate(commands::truncate::TruncateArgs),

    /// Inspect and edit a working memory store
    Memory(commands::memory::MemoryArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Load configuration from `path`, or from the default location when `None`.
///
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?.with_env_overrides()),
        None => Ok(Config::load_or_default()),
    }
}

/// Resolve the config file path the CLI operates on.
pub fn config_path(path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

/// `EnvFilter` directive for the given `-v` count.
pub fn logging_directive(verbose: u8, configured: LogLevel) -> String {
    let level = match verbose {
        0 => configured.as_directive(),
        1 => LogLevel::Debug.as_directive(),
        _ => LogLevel::Trace.as_directive(),
    };
    format!("ctxwarden={}", level)
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Estimate(args) => commands::estimate::run(args, &config).await,
        Commands::Budget(args) => commands::budget::run(args, &config).await,
        Commands::Truncate(args) => commands::truncate::run(args, &config).await,
        Commands::Memory(args) => commands::memory::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref(), config).await,
        Commands::Version => {
            println!("ctxwarden {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

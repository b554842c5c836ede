//! Configuration management commands.

use crate::config_path;
use clap::Args;
use ctxwarden_core::config::Config;
use std::path::Path;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Walk a dot-separated key path through a JSON value.
fn lookup<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.').try_fold(json, |value, part| value.get(part))
}

/// Run the config command.
pub async fn run(args: ConfigArgs, path: Option<&Path>, config: Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", config.to_json5()?);
        }

        ConfigCommand::Get { key } => {
            let json = serde_json::to_value(&config)?;
            match lookup(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Init { force } => {
            let path = config_path(path)?;

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            Config::default().save(&path)?;
            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Path => {
            println!("{}", config_path(path)?.display());
        }

        ConfigCommand::Validate => {
            let path = config_path(path)?;
            let loaded = Config::load(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            match loaded.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => anyhow::bail!("Configuration error: {}", e),
            }
        }
    }

    Ok(())
}

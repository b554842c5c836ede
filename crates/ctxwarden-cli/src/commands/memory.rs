//! Working memory commands.

use super::parse_json_or_string;
use crate::render;
use anyhow::Context;
use clap::{Args, Subcommand};
use ctxwarden_core::config::Config;
use ctxwarden_core::{paths, EventObserver};
use ctxwarden_memory::{
    FileBackend, MemoryEvent, MemoryScope, Priority, StoreOptions, Tier, TieredMemoryStore,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Memory command arguments.
#[derive(Args)]
pub struct MemoryArgs {
    /// Store file (defaults to ~/.ctxwarden/memory.json)
    #[arg(long, env = "CTXWARDEN_MEMORY_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: MemoryCommand,
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Show the ranked memory index
    Index {
        /// Print the index as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an entry's value
    Get {
        key: String,

        /// Print the full entry instead of just the value
        #[arg(long)]
        entry: bool,
    },

    /// Store a value (parsed as JSON, or kept as a string)
    Put {
        key: String,

        value: String,

        /// Description shown in the index
        #[arg(short, long, default_value = "")]
        description: String,

        /// Tier to store under: raw, summary or findings
        #[arg(long)]
        tier: Option<Tier>,

        /// Priority: low, normal, high or critical
        #[arg(long)]
        priority: Option<Priority>,

        /// Pin the entry
        #[arg(long)]
        pin: bool,

        /// Keep the entry across sessions
        #[arg(long, conflicts_with = "tasks")]
        persistent: bool,

        /// Bind the entry to a task (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,

        /// Key this entry was derived from (repeatable)
        #[arg(long = "derived-from")]
        derived_from: Vec<String>,
    },

    /// Delete an entry
    Delete { key: String },

    /// Pin an entry
    Pin { key: String },

    /// Unpin an entry
    Unpin {
        key: String,

        /// Priority to restore (defaults to the tier's default)
        #[arg(long)]
        priority: Option<Priority>,
    },

    /// Make an entry persistent
    Persist { key: String },

    /// Move an entry to another tier
    Promote { key: String, tier: Tier },

    /// Evict the lowest-ranked entries
    Evict {
        /// Number of entries to evict
        #[arg(default_value_t = 1)]
        count: usize,

        /// Evict largest entries first instead of least recently used
        #[arg(long)]
        by_size: bool,
    },

    /// Show per-tier statistics
    Stats,

    /// Delete the raw-tier entries among the given keys
    CleanupRaw {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Clear entries: everything, the session scope, or given tasks
    Clear {
        /// Only clear session-scoped entries
        #[arg(long, conflicts_with = "tasks")]
        session: bool,

        /// Only clear entries bound to this task (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
}

/// Reports store events on stderr.
struct StderrObserver;

impl EventObserver<MemoryEvent> for StderrObserver {
    fn notify(&self, event: &MemoryEvent) {
        match event {
            MemoryEvent::LimitWarning {
                utilization_percent,
                total_size_bytes,
                limit_bytes,
            } => eprintln!(
                "warning: memory store at {:.1}% ({} of {} bytes)",
                utilization_percent, total_size_bytes, limit_bytes
            ),
            MemoryEvent::Evicted { keys, reason } => {
                eprintln!("evicted ({}): {}", reason, keys.join(", "))
            }
            MemoryEvent::Stored { .. } => {}
        }
    }
}

async fn open_store(path: Option<PathBuf>, config: &Config) -> anyhow::Result<TieredMemoryStore> {
    let path = match path {
        Some(path) => path,
        None => paths::memory_store_file()?,
    };
    let backend = FileBackend::open(&path)
        .with_context(|| format!("Failed to open memory store {}", path.display()))?;
    let store = TieredMemoryStore::open(Arc::new(backend), config.memory.clone())
        .await?
        .with_observer(Arc::new(StderrObserver));
    Ok(store)
}

/// Run the memory command.
pub async fn run(args: MemoryArgs, config: &Config) -> anyhow::Result<()> {
    let store = open_store(args.store, config).await?;

    match args.command {
        MemoryCommand::Index { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&store.index().await?)?);
            } else {
                print!("{}", store.render_index().await?);
            }
        }

        MemoryCommand::Get { key, entry } => {
            if entry {
                match store.peek(&key).await? {
                    Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                    None => anyhow::bail!("Key not found: {}", key),
                }
            } else {
                match store.retrieve(&key).await? {
                    Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                    None => anyhow::bail!("Key not found: {}", key),
                }
            }
        }

        MemoryCommand::Put {
            key,
            value,
            description,
            tier,
            priority,
            pin,
            persistent,
            tasks,
            derived_from,
        } => {
            let mut options = StoreOptions::new().with_derived_from(derived_from);
            options.tier = tier;
            options.priority = priority;
            if pin {
                options = options.pinned();
            }
            if persistent {
                options = options.with_scope(MemoryScope::Persistent);
            } else if !tasks.is_empty() {
                options = options.with_scope(MemoryScope::tasks(tasks));
            }

            let receipt = store
                .store(&key, &description, parse_json_or_string(&value), options)
                .await?;
            println!(
                "Stored {} ({} bytes, {:.1}% of store used)",
                receipt.key, receipt.size_bytes, receipt.utilization_percent
            );
        }

        MemoryCommand::Delete { key } => {
            if !store.delete(&key).await? {
                anyhow::bail!("Key not found: {}", key);
            }
            println!("Deleted {}", key);
        }

        MemoryCommand::Pin { key } => {
            if !store.pin(&key).await? {
                anyhow::bail!("Key not found: {}", key);
            }
            println!("Pinned {}", key);
        }

        MemoryCommand::Unpin { key, priority } => {
            if !store.unpin(&key, priority).await? {
                anyhow::bail!("Key not found: {}", key);
            }
            println!("Unpinned {}", key);
        }

        MemoryCommand::Persist { key } => {
            store.persist(&key).await?;
            println!("Persisted {}", key);
        }

        MemoryCommand::Promote { key, tier } => {
            let new_key = store.promote(&key, tier).await?;
            println!("Promoted {} to {}", key, new_key);
        }

        MemoryCommand::Evict { count, by_size } => {
            let evicted = if by_size {
                store.evict_by_size(count).await?
            } else {
                store.evict_lru(count).await?
            };
            if evicted.is_empty() {
                println!("Nothing evictable");
            }
        }

        MemoryCommand::Stats => {
            let stats = store.tier_stats().await?;
            render::print_tier_stats(
                &stats,
                store.total_size_bytes().await,
                config.memory.max_size_bytes,
            );
        }

        MemoryCommand::CleanupRaw { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            let removed = store.cleanup_raw_data(&keys).await?;
            println!("Removed {} raw entries", removed);
        }

        MemoryCommand::Clear { session, tasks } => {
            let removed = if session {
                store.clear_scope(&MemoryScope::Session).await?
            } else if !tasks.is_empty() {
                store.clear_scope(&MemoryScope::tasks(tasks)).await?
            } else {
                store.clear().await?
            };
            println!("Removed {} entries", removed);
        }
    }

    Ok(())
}

//! Tiered working memory for ctxwarden.
//!
//! This crate provides:
//! - [`TieredMemoryStore`]: keyed storage with raw/summary/findings tiers,
//!   priorities, pinning, byte and entry caps, and ranked eviction
//! - [`MemoryBackend`]: the key/value contract the store runs on, with
//!   in-memory and JSON-file implementations
//! - [`MemoryIndex`]: the ranked, LLM-facing listing of stored entries
//! - [`MemoryAccess`]: a get/set/delete view for sandboxed tool execution

pub mod access;
pub mod backend;
pub mod entry;
pub mod error;
pub mod events;
pub mod index;
pub mod ranking;
pub mod store;
pub mod tier;

pub use access::MemoryAccess;
pub use backend::{FileBackend, InMemoryBackend, MemoryBackend};
pub use entry::{MemoryEntry, MemoryScope, Priority, StoreOptions};
pub use error::{BackendError, MemoryError};
pub use events::{EvictionReason, MemoryEvent};
pub use index::{IndexEntry, MemoryIndex, TierStat, TierStats};
pub use ranking::EvictionPolicy;
pub use store::{StoreReceipt, TieredMemoryStore};
pub use tier::Tier;

/// Result type for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;

//! The compactable-resource protocol.
//!
//! Memory, loaded tool categories, and fixed instructions all answer the
//! same two questions: can you give tokens back, and how many did you free
//! when asked for `target`. [`ResourceCompactor`] asks each in turn.

use crate::tool_loader::ToolCategoryLoader;
use crate::Result;
use async_trait::async_trait;
use ctxwarden_core::{ContentType, HeuristicEstimator, TokenEstimator};
use ctxwarden_memory::{EvictionPolicy, TieredMemoryStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Something that can give tokens back under pressure.
#[async_trait]
pub trait CompactableResource: Send + Sync {
    /// Name used in reports and logs.
    fn name(&self) -> &str;

    /// Whether asking this resource to compact can free anything.
    fn is_compactable(&self) -> bool;

    /// Free up to roughly `target_tokens`, returning the tokens actually freed.
    async fn compact(&self, target_tokens: usize) -> Result<usize>;
}

/// Working memory as a compactable resource. Frees tokens by ranked eviction.
pub struct MemoryResource {
    store: Arc<TieredMemoryStore>,
    policy: EvictionPolicy,
    estimator: Arc<dyn TokenEstimator>,
}

impl MemoryResource {
    pub fn new(store: Arc<TieredMemoryStore>) -> Self {
        Self {
            store,
            policy: EvictionPolicy::Lru,
            estimator: Arc::new(HeuristicEstimator::new()),
        }
    }

    pub fn with_policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }
}

#[async_trait]
impl CompactableResource for MemoryResource {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_compactable(&self) -> bool {
        true
    }

    async fn compact(&self, target_tokens: usize) -> Result<usize> {
        let mut freed = 0;
        while freed < target_tokens {
            let Some(entry) = self.store.evict_entries(1, self.policy).await?.pop() else {
                break;
            };
            freed += self.estimator.estimate(&entry.value_text(), ContentType::Mixed);
        }
        Ok(freed)
    }
}

/// Loaded tool categories as a compactable resource. Frees tokens by
/// dropping the least recently used unpinned category.
pub struct ToolCategoryResource {
    loader: Arc<ToolCategoryLoader>,
}

impl ToolCategoryResource {
    pub fn new(loader: Arc<ToolCategoryLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl CompactableResource for ToolCategoryResource {
    fn name(&self) -> &str {
        "tool_categories"
    }

    fn is_compactable(&self) -> bool {
        self.loader.has_unpinned()
    }

    async fn compact(&self, target_tokens: usize) -> Result<usize> {
        let mut freed = 0;
        while freed < target_tokens {
            let Some((_, tokens)) = self.loader.unload_lru() else {
                break;
            };
            freed += tokens;
        }
        Ok(freed)
    }
}

/// Fixed instructions. Never compacted.
#[derive(Debug, Clone)]
pub struct StaticInstructions {
    name: String,
    text: String,
}

impl StaticInstructions {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[async_trait]
impl CompactableResource for StaticInstructions {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_compactable(&self) -> bool {
        false
    }

    async fn compact(&self, _target_tokens: usize) -> Result<usize> {
        Ok(0)
    }
}

/// What one resource contributed to a compaction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub name: String,
    pub freed_tokens: usize,
    /// The resource reported itself not compactable and was not asked.
    pub skipped: bool,
}

/// Result of [`ResourceCompactor::compact`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub target_tokens: usize,
    pub freed_tokens: usize,
    pub outcomes: Vec<ResourceOutcome>,
}

impl CompactionReport {
    /// Whether the target was met.
    pub fn is_satisfied(&self) -> bool {
        self.freed_tokens >= self.target_tokens
    }
}

/// Asks registered resources, in registration order, to free tokens.
#[derive(Default)]
pub struct ResourceCompactor {
    resources: Vec<Arc<dyn CompactableResource>>,
}

impl ResourceCompactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: Arc<dyn CompactableResource>) -> Self {
        self.register(resource);
        self
    }

    pub fn register(&mut self, resource: Arc<dyn CompactableResource>) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Free `target_tokens`, stopping as soon as the target is met.
    pub async fn compact(&self, target_tokens: usize) -> Result<CompactionReport> {
        let mut freed = 0;
        let mut outcomes = Vec::new();

        for resource in &self.resources {
            if freed >= target_tokens {
                break;
            }
            if !resource.is_compactable() {
                debug!("Skipping resource '{}': not compactable", resource.name());
                outcomes.push(ResourceOutcome {
                    name: resource.name().to_string(),
                    freed_tokens: 0,
                    skipped: true,
                });
                continue;
            }

            let got = resource.compact(target_tokens - freed).await?;
            info!("Resource '{}' freed {} tokens", resource.name(), got);
            freed += got;
            outcomes.push(ResourceOutcome {
                name: resource.name().to_string(),
                freed_tokens: got,
                skipped: false,
            });
        }

        Ok(CompactionReport {
            target_tokens,
            freed_tokens: freed,
            outcomes,
        })
    }
}

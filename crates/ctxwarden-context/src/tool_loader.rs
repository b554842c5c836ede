//! On-demand loading of tool categories.
//!
//! Tool definitions cost tokens on every call, so the agent loads whole
//! categories only when it needs them. Under pressure the least recently
//! used unpinned category is dropped first.

use crate::error::ContextError;
use crate::Result;
use ctxwarden_core::{ContentType, HeuristicEstimator, TokenEstimator, ToolDefinition};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Lookup of tool categories. Injected into the loader rather than global.
pub trait ToolCatalog: Send + Sync {
    /// Tools in the named category.
    fn category(&self, name: &str) -> Option<Vec<ToolDefinition>>;

    /// All category names, sorted.
    fn category_names(&self) -> Vec<String>;
}

/// A fixed, in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticToolCatalog {
    categories: BTreeMap<String, Vec<ToolDefinition>>,
}

impl StaticToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, name: impl Into<String>, tools: Vec<ToolDefinition>) -> Self {
        self.categories.insert(name.into(), tools);
        self
    }
}

impl ToolCatalog for StaticToolCatalog {
    fn category(&self, name: &str) -> Option<Vec<ToolDefinition>> {
        self.categories.get(name).cloned()
    }

    fn category_names(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }
}

#[derive(Debug)]
struct LoadedCategory {
    tools: Vec<ToolDefinition>,
    tokens: usize,
    last_used: u64,
    pinned: bool,
}

#[derive(Debug, Default)]
struct LoaderState {
    loaded: HashMap<String, LoadedCategory>,
    /// Logical clock; bumped on every load or use.
    tick: u64,
}

impl LoaderState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Tracks which tool categories are loaded into the context.
pub struct ToolCategoryLoader {
    catalog: Arc<dyn ToolCatalog>,
    estimator: Arc<dyn TokenEstimator>,
    state: Mutex<LoaderState>,
}

impl ToolCategoryLoader {
    pub fn new(catalog: Arc<dyn ToolCatalog>) -> Self {
        Self {
            catalog,
            estimator: Arc::new(HeuristicEstimator::new()),
            state: Mutex::new(LoaderState::default()),
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Load a category, returning its token cost. Loading an already loaded
    /// category only marks it used.
    pub fn load(&self, name: &str) -> Result<usize> {
        let mut state = self.state.lock();
        let tick = state.next_tick();
        if let Some(loaded) = state.loaded.get_mut(name) {
            loaded.last_used = tick;
            return Ok(loaded.tokens);
        }

        let tools = self
            .catalog
            .category(name)
            .ok_or_else(|| ContextError::UnknownToolCategory(name.to_string()))?;
        let tokens: usize = tools
            .iter()
            .map(|t| self.estimator.estimate(&t.to_wire_json(), ContentType::Code))
            .sum();

        debug!("Loaded tool category '{}' ({} tools, {} tokens)", name, tools.len(), tokens);
        state.loaded.insert(
            name.to_string(),
            LoadedCategory {
                tools,
                tokens,
                last_used: tick,
                pinned: false,
            },
        );
        Ok(tokens)
    }

    /// Mark a loaded category as used. Returns whether it is loaded.
    pub fn touch(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let tick = state.next_tick();
        match state.loaded.get_mut(name) {
            Some(loaded) => {
                loaded.last_used = tick;
                true
            }
            None => false,
        }
    }

    /// Unload a category, returning the tokens freed.
    pub fn unload(&self, name: &str) -> Option<usize> {
        let removed = self.state.lock().loaded.remove(name)?;
        debug!("Unloaded tool category '{}'", name);
        Some(removed.tokens)
    }

    /// Keep a loaded category from being dropped under pressure.
    pub fn pin(&self, name: &str) -> bool {
        self.set_pinned(name, true)
    }

    pub fn unpin(&self, name: &str) -> bool {
        self.set_pinned(name, false)
    }

    fn set_pinned(&self, name: &str, pinned: bool) -> bool {
        match self.state.lock().loaded.get_mut(name) {
            Some(loaded) => {
                loaded.pinned = pinned;
                true
            }
            None => false,
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state.lock().loaded.contains_key(name)
    }

    /// Loaded category names, sorted.
    pub fn loaded_categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().loaded.keys().cloned().collect();
        names.sort();
        names
    }

    /// Definitions of every loaded tool, grouped by category name.
    pub fn loaded_tools(&self) -> Vec<ToolDefinition> {
        let state = self.state.lock();
        let mut names: Vec<&String> = state.loaded.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| state.loaded[name].tools.iter().cloned())
            .collect()
    }

    /// Token cost of everything loaded.
    pub fn loaded_tokens(&self) -> usize {
        self.state.lock().loaded.values().map(|c| c.tokens).sum()
    }

    /// Whether some loaded category could be dropped.
    pub fn has_unpinned(&self) -> bool {
        self.state.lock().loaded.values().any(|c| !c.pinned)
    }

    /// Drop the least recently used unpinned category, returning its name
    /// and the tokens freed.
    pub fn unload_lru(&self) -> Option<(String, usize)> {
        let mut state = self.state.lock();
        let name = state
            .loaded
            .iter()
            .filter(|(_, c)| !c.pinned)
            .min_by(|(a_name, a), (b_name, b)| a.last_used.cmp(&b.last_used).then_with(|| a_name.cmp(b_name)))
            .map(|(name, _)| name.clone())?;
        let removed = state.loaded.remove(&name)?;
        info!("Dropped tool category '{}' ({} tokens)", name, removed.tokens);
        Some((name, removed.tokens))
    }

    /// Names available in the catalog.
    pub fn available_categories(&self) -> Vec<String> {
        self.catalog.category_names()
    }
}

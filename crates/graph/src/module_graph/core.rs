//! Core [`ModuleGraph`] struct: the nested graph a module loader feeds.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::Router;
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::block::{Block, BlockId};
use crate::declare::DeclarationIndex;
use crate::error::Result;
use crate::runtime::{GraphRuntime, ModuleArguments};

use super::handler;
use super::source::{compile, parse};

/// Currently loaded graph contents.
#[derive(Debug, Default)]
struct GraphState {
    blocks: IndexMap<BlockId, Block>,
    arguments: ModuleArguments,
    /// Number of successful loads.
    generation: u64,
}

/// Nested module graph built from YAML content.
///
/// Declarations are kept in a shared [`DeclarationIndex`] so that node
/// identity survives reloads; every other block is stored by ID.
pub struct ModuleGraph {
    id: String,
    declarations: Arc<DeclarationIndex>,
    state: RwLock<GraphState>,
}

impl ModuleGraph {
    /// Create an empty graph. `id` names the module in logs.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            declarations: Arc::new(DeclarationIndex::new()),
            state: RwLock::new(GraphState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared handle to the declaration index.
    pub fn declarations(&self) -> Arc<DeclarationIndex> {
        Arc::clone(&self.declarations)
    }

    /// Get a loaded block by ID.
    pub fn block(&self, id: &BlockId) -> Option<Block> {
        self.state
            .read()
            .expect("graph state lock poisoned")
            .blocks
            .get(id)
            .cloned()
    }

    /// IDs of all loaded blocks, in document order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.state
            .read()
            .expect("graph state lock poisoned")
            .blocks
            .keys()
            .cloned()
            .collect()
    }

    /// Resolved value of a module argument (supplied or defaulted).
    pub fn argument(&self, name: &str) -> Option<serde_yaml::Value> {
        self.state
            .read()
            .expect("graph state lock poisoned")
            .arguments
            .get(name)
            .cloned()
    }

    /// Number of successful loads so far.
    pub fn generation(&self) -> u64 {
        self.state.read().expect("graph state lock poisoned").generation
    }
}

#[async_trait]
impl GraphRuntime for ModuleGraph {
    fn load_content(&self, arguments: &ModuleArguments, content: &str) -> Result<()> {
        let compiled = compile(parse(content)?, arguments)?;

        let mut state = self.state.write().expect("graph state lock poisoned");
        let report = self.declarations.sync(compiled.declarations);
        state.blocks = compiled.blocks;
        state.arguments = compiled.arguments;
        state.generation += 1;

        info!(
            module = %self.id,
            generation = state.generation,
            blocks = state.blocks.len(),
            declarations_added = report.added.len(),
            declarations_replaced = report.replaced.len(),
            declarations_removed = report.removed.len(),
            "loaded module content"
        );
        Ok(())
    }

    async fn run(&self, shutdown: CancellationToken) {
        info!(module = %self.id, "module graph running");
        shutdown.cancelled().await;
        debug!(module = %self.id, "module graph stopped");
    }

    fn handler(&self) -> Router {
        handler::router(self.declarations())
    }
}

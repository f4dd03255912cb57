//! [`DeclarationIndex`]: node ID -> current [`DeclarationNode`].

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use super::node::{Declaration, DeclarationNode};

/// What a [`DeclarationIndex::sync`] pass changed, by node ID.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
}

impl SyncReport {
    /// Whether the pass left every node untouched.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty() && self.removed.is_empty()
    }
}

/// Index of declaration nodes keyed by node ID, in declaration order.
///
/// Call [`sync`](DeclarationIndex::sync) once per graph (re)construction pass.
/// Nodes whose ID survives a pass are kept, so `Arc<DeclarationNode>` handles
/// held by dependents stay valid and observe the new body.
#[derive(Debug, Default)]
pub struct DeclarationIndex {
    nodes: RwLock<IndexMap<String, Arc<DeclarationNode>>>,
}

impl DeclarationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronize the index with the declarations of one construction pass.
    ///
    /// - Adds nodes for new IDs.
    /// - Replaces the body of existing nodes whose block changed (identity preserved).
    /// - Removes nodes whose ID is absent from `declarations`.
    pub fn sync(&self, declarations: Vec<Declaration>) -> SyncReport {
        let mut report = SyncReport::default();
        let mut nodes = self.nodes.write().expect("declaration index lock poisoned");
        let mut next: IndexMap<String, Arc<DeclarationNode>> =
            IndexMap::with_capacity(declarations.len());

        for declaration in declarations {
            let id = declaration.block().id().to_string();

            // A repeated ID within one pass replaces the earlier body.
            if let Some(node) = next.get(&id) {
                node.swap(declaration);
                continue;
            }

            match nodes.shift_remove(&id) {
                Some(node) => {
                    if node.block() == *declaration.block() {
                        report.unchanged.push(id.clone());
                    } else {
                        node.swap(declaration);
                        debug!(node_id = %id, "replaced declaration body");
                        report.replaced.push(id.clone());
                    }
                    next.insert(id, node);
                }
                None => {
                    debug!(node_id = %id, "added declaration");
                    report.added.push(id.clone());
                    next.insert(id, Arc::new(DeclarationNode::new(declaration)));
                }
            }
        }

        report.removed = nodes.keys().cloned().collect();
        for id in &report.removed {
            debug!(node_id = %id, "removed declaration");
        }
        *nodes = next;
        report
    }

    /// Get a node by ID.
    pub fn get(&self, node_id: &str) -> Option<Arc<DeclarationNode>> {
        self.nodes
            .read()
            .expect("declaration index lock poisoned")
            .get(node_id)
            .cloned()
    }

    /// All node IDs, in declaration order.
    pub fn ids(&self) -> Vec<String> {
        self.nodes
            .read()
            .expect("declaration index lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// All nodes, in declaration order.
    pub fn nodes(&self) -> Vec<Arc<DeclarationNode>> {
        self.nodes
            .read()
            .expect("declaration index lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().expect("declaration index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

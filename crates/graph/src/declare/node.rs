//! [`Declaration`] and [`DeclarationNode`].

use std::sync::{Arc, RwLock};

use crate::block::Block;
use crate::error::{GraphError, Result};
use crate::node::{BlockNode, Scope};

/// An owned declaration body: a labelled block.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    label: String,
    block: Arc<Block>,
}

impl Declaration {
    /// Wrap a block as a declaration. The block must carry a label.
    pub fn new(block: Block) -> Result<Self> {
        let label = block
            .label
            .clone()
            .ok_or_else(|| GraphError::MissingLabel(block.name.clone()))?;
        Ok(Self {
            label,
            block: Arc::new(block),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn block(&self) -> &Arc<Block> {
        &self.block
    }
}

/// Graph node holding a named declaration.
///
/// `label`, `node_id` and `component_name` are fixed at construction. The
/// declaration itself sits behind the node's lock and may be replaced, as long
/// as the replacement has the same block identity.
#[derive(Debug)]
pub struct DeclarationNode {
    label: String,
    node_id: String,
    component_name: String,
    declaration: RwLock<Arc<Declaration>>,
}

impl DeclarationNode {
    pub fn new(declaration: Declaration) -> Self {
        Self {
            label: declaration.label.clone(),
            node_id: declaration.block.id().to_string(),
            component_name: declaration.block.name.clone(),
            declaration: RwLock::new(Arc::new(declaration)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stable ID used by the graph for dependency wiring (`declare.<label>`).
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Type tag of the declaring block.
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    /// The full declaration currently owned by this node.
    pub fn declaration(&self) -> Arc<Declaration> {
        Arc::clone(&self.declaration.read().expect("declaration lock poisoned"))
    }

    /// The current declaration body.
    pub fn block(&self) -> Arc<Block> {
        let guard = self.declaration.read().expect("declaration lock poisoned");
        Arc::clone(&guard.block)
    }

    /// Swap in a new declaration body, returning the previous one.
    ///
    /// Fails with [`GraphError::IdentityMismatch`] if the replacement's block ID
    /// differs from this node's ID.
    pub fn replace(&self, declaration: Declaration) -> Result<Arc<Declaration>> {
        let found = declaration.block.id().to_string();
        if found != self.node_id {
            return Err(GraphError::IdentityMismatch {
                expected: self.node_id.clone(),
                found,
            });
        }
        Ok(self.swap(declaration))
    }

    /// Swap without the identity check; callers have already matched the ID.
    pub(super) fn swap(&self, declaration: Declaration) -> Arc<Declaration> {
        let mut guard = self.declaration.write().expect("declaration lock poisoned");
        std::mem::replace(&mut *guard, Arc::new(declaration))
    }

    /// Declarations are not evaluated; they only publish identity and body.
    pub fn evaluate(&self, _scope: &Scope) -> Result<()> {
        Ok(())
    }
}

impl BlockNode for DeclarationNode {
    fn node_id(&self) -> &str {
        DeclarationNode::node_id(self)
    }

    fn block(&self) -> Arc<Block> {
        DeclarationNode::block(self)
    }

    fn evaluate(&self, scope: &Scope) -> Result<()> {
        DeclarationNode::evaluate(self, scope)
    }
}

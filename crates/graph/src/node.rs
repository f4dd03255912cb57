use std::collections::HashMap;
use std::sync::Arc;

use crate::block::Block;
use crate::error::Result;

/// Values visible to a node while it evaluates.
pub type Scope = HashMap<String, serde_yaml::Value>;

/// A graph node backed by a block of module content.
///
/// Dependents wire themselves to a node through [`node_id`](BlockNode::node_id),
/// so the ID must stay stable for the node's lifetime.
pub trait BlockNode: Send + Sync {
    fn node_id(&self) -> &str;

    /// The block currently backing this node.
    fn block(&self) -> Arc<Block>;

    /// Evaluate the node against `scope`.
    fn evaluate(&self, scope: &Scope) -> Result<()>;
}

/// Blanket implementation so `Arc<dyn BlockNode>` can be used directly.
impl<T: BlockNode + ?Sized> BlockNode for Arc<T> {
    fn node_id(&self) -> &str {
        (**self).node_id()
    }

    fn block(&self) -> Arc<Block> {
        (**self).block()
    }

    fn evaluate(&self, scope: &Scope) -> Result<()> {
        (**self).evaluate(scope)
    }
}

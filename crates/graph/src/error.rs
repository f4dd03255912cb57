//! Error types for module graph loading and declaration management.

use crate::block::BlockId;

/// Errors that can occur while loading module content or swapping declarations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Content is not a valid module document.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two blocks in the same document share an ID.
    #[error("duplicate block '{0}'")]
    DuplicateBlock(BlockId),

    /// A block that must be named has no label.
    #[error("'{0}' block must have a label")]
    MissingLabel(String),

    /// An `argument` block's body is malformed.
    #[error("invalid argument block '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// A required argument was not supplied by the loader.
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    /// The loader supplied an argument the module does not declare.
    #[error("unsupported argument '{0}'")]
    UnknownArgument(String),

    /// A replacement declaration does not share the node's identity.
    #[error("cannot replace declaration '{expected}' with '{found}'")]
    IdentityMismatch { expected: String, found: String },
}

/// Result alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

//! AST blocks that make up module content.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Block name of a reusable declaration.
pub const DECLARE_BLOCK: &str = "declare";

/// Block name of a module argument definition.
pub const ARGUMENT_BLOCK: &str = "argument";

/// A single block statement: a type tag, an optional label and an opaque body.
///
/// ```yaml
/// name: declare
/// label: scrape
/// body:
///   interval: 30s
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub body: serde_yaml::Value,
}

impl Block {
    pub fn new(name: impl Into<String>, label: Option<&str>, body: serde_yaml::Value) -> Self {
        Self {
            name: name.into(),
            label: label.map(str::to_string),
            body,
        }
    }

    /// Identity of this block within a module: kind plus label.
    pub fn id(&self) -> BlockId {
        BlockId {
            name: self.name.clone(),
            label: self.label.clone(),
        }
    }
}

/// Identity of a block: `name` or `name.label`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub name: String,
    pub label: Option<String>,
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{}.{}", self.name, label),
            None => f.write_str(&self.name),
        }
    }
}

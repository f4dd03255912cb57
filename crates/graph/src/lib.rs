//! Nested module graph for the weir runtime.
//!
//! This crate provides:
//! - The AST [`Block`] that module content is made of
//! - [`DeclarationNode`]: a named declaration referenced by identity
//! - [`DeclarationIndex`]: node ID -> current declaration, with hot-swap on reload
//! - The [`GraphRuntime`] contract consumed by module loaders
//! - [`ModuleGraph`]: the YAML-backed runtime with its HTTP handler

pub mod block;
pub mod declare;
pub mod error;
pub mod module_graph;
pub mod node;
pub mod runtime;

pub use block::{Block, BlockId, ARGUMENT_BLOCK, DECLARE_BLOCK};
pub use declare::{Declaration, DeclarationIndex, DeclarationNode, SyncReport};
pub use error::{GraphError, Result};
pub use module_graph::ModuleGraph;
pub use node::{BlockNode, Scope};
pub use runtime::{GraphRuntime, ModuleArguments};

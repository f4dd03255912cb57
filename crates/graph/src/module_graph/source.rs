//! Parsing and validation of module content.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::block::{Block, BlockId, ARGUMENT_BLOCK, DECLARE_BLOCK};
use crate::declare::Declaration;
use crate::error::{GraphError, Result};
use crate::runtime::ModuleArguments;

/// Top-level module document.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ModuleSource {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// Body of an `argument` block.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArgumentSpec {
    optional: bool,
    default: Option<serde_yaml::Value>,
}

/// A validated document, ready to replace the current graph.
#[derive(Debug)]
pub(super) struct CompiledSource {
    pub blocks: IndexMap<BlockId, Block>,
    pub declarations: Vec<Declaration>,
    /// Supplied arguments merged with declared defaults.
    pub arguments: ModuleArguments,
}

/// Parse raw content. Empty content is an empty module.
pub(super) fn parse(content: &str) -> Result<ModuleSource> {
    if content.trim().is_empty() {
        return Ok(ModuleSource::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Validate block identities and bind `supplied` arguments.
pub(super) fn compile(source: ModuleSource, supplied: &ModuleArguments) -> Result<CompiledSource> {
    let mut blocks: IndexMap<BlockId, Block> = IndexMap::with_capacity(source.blocks.len());
    let mut declarations = Vec::new();
    let mut arguments = ModuleArguments::new();

    for block in source.blocks {
        let id = block.id();
        if blocks.contains_key(&id) {
            return Err(GraphError::DuplicateBlock(id));
        }

        match block.name.as_str() {
            DECLARE_BLOCK => declarations.push(Declaration::new(block.clone())?),
            ARGUMENT_BLOCK => {
                let name = block
                    .label
                    .clone()
                    .ok_or_else(|| GraphError::MissingLabel(ARGUMENT_BLOCK.to_string()))?;
                let spec = argument_spec(&name, &block.body)?;
                match supplied.get(&name).cloned().or(spec.default) {
                    Some(value) => {
                        arguments.insert(name, value);
                    }
                    None if spec.optional => {}
                    None => return Err(GraphError::MissingArgument(name)),
                }
            }
            _ => {}
        }

        blocks.insert(id, block);
    }

    if let Some(unknown) = supplied.keys().find(|k| !argument_declared(&blocks, k)) {
        return Err(GraphError::UnknownArgument(unknown.clone()));
    }

    Ok(CompiledSource {
        blocks,
        declarations,
        arguments,
    })
}

fn argument_spec(name: &str, body: &serde_yaml::Value) -> Result<ArgumentSpec> {
    if body.is_null() {
        return Ok(ArgumentSpec::default());
    }
    serde_yaml::from_value(body.clone()).map_err(|e| GraphError::InvalidArgument {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn argument_declared(blocks: &IndexMap<BlockId, Block>, name: &str) -> bool {
    blocks.contains_key(&BlockId {
        name: ARGUMENT_BLOCK.to_string(),
        label: Some(name.to_string()),
    })
}

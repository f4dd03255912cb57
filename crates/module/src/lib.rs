//! Dynamic module loading for the weir runtime.
//!
//! This crate provides:
//! - The [`ContentWatcher`] contract and the [`LocalFile`] watcher (fsnotify or polling)
//! - [`ModuleLoader`]: feeds watched content into a nested [`GraphRuntime`](weir_graph::GraphRuntime)
//!   and reports each reconfiguration's outcome to the caller of `update`
//! - YAML loader arguments (`filename`, `detector`, ..., `arguments`)

pub mod arguments;
pub mod error;
pub mod loader;
pub mod watch;

pub use arguments::{LoaderArguments, ModuleFileArguments};
pub use error::{ModuleError, WatchError};
pub use loader::{LoaderOptions, ModuleFile, ModuleLoader};
pub use watch::{
    Change, ChangeSink, ContentWatcher, Cycle, Detector, FileArguments, LocalFile, Origin,
};

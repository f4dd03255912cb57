//! Error types for content watchers and module loaders.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use weir_graph::GraphError;

/// Errors raised by a [`ContentWatcher`](crate::ContentWatcher).
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Watch arguments failed validation.
    #[error("invalid watch arguments: {0}")]
    InvalidArguments(String),

    /// The watched source could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Errors surfaced by a [`ModuleLoader`](crate::ModuleLoader).
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The watcher rejected its configuration. Recoverable by a later update.
    #[error("failed to configure content watcher: {0}")]
    WatchConfig(#[source] WatchError),

    /// The nested graph rejected the content. Recoverable by a later update.
    #[error("failed to load module content: {0}")]
    Load(#[source] Arc<GraphError>),

    /// The watcher's run loop failed. Fatal to the loader's `run`.
    #[error("content watcher terminated: {0}")]
    WatchRuntime(#[source] WatchError),

    /// The watcher did not report within the configured update timeout.
    #[error("module update did not complete within {0:?}")]
    UpdateTimeout(Duration),

    /// The completion channel closed without a result, or `configure` panicked.
    #[error("module update was abandoned before completing")]
    UpdateAbandoned,
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, ModuleError>;

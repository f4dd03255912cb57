//! Content watchers: sources that report content changes to a loader.
//!
//! A watcher is configured with its own arguments and reports every content
//! read through a [`ChangeSink`]. The sink may be invoked synchronously from
//! inside [`configure`](ContentWatcher::configure) or later from the watcher's
//! run loop on another thread.

mod local_file;


use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use weir_core::OptionalSecret;

use crate::error::WatchError;

pub use self::local_file::{Detector, FileArguments, LocalFile};

/// A single change notification: new content, or the failure to read it.
pub type Change = Result<OptionalSecret, WatchError>;

/// Sequence number of a loader update. Each `configure` call gets a fresh one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cycle(u64);

impl Cycle {
    pub fn next(self) -> Self {
        Cycle(self.0 + 1)
    }
}

/// Where a change notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Read by `configure` for the given update cycle.
    Configure(Cycle),
    /// Noticed by the watcher's run loop.
    Watch,
}

/// Callback through which a watcher publishes changes.
#[derive(Clone)]
pub struct ChangeSink {
    callback: Arc<dyn Fn(Origin, Change) + Send + Sync>,
}

impl ChangeSink {
    pub fn new(callback: impl Fn(Origin, Change) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Publish a change noticed by the run loop.
    pub fn publish(&self, change: Change) {
        (self.callback)(Origin::Watch, change)
    }

    /// Publish the change produced by `configure` for `cycle`.
    pub fn publish_configured(&self, cycle: Cycle, change: Change) {
        (self.callback)(Origin::Configure(cycle), change)
    }
}

impl fmt::Debug for ChangeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSink").finish_non_exhaustive()
    }
}

/// Observes a content source and publishes its content through a [`ChangeSink`].
///
/// Contract relied on by loaders: a successful `configure` call publishes
/// exactly once through [`ChangeSink::publish_configured`] with the cycle it
/// was given, either before it returns or shortly after; a failed `configure`
/// publishes nothing. Run-loop changes go through [`ChangeSink::publish`].
#[async_trait]
pub trait ContentWatcher: Send + Sync + 'static {
    /// Watcher-specific arguments (path, polling options, ...).
    type Arguments: Clone + fmt::Debug + Send + Sync + 'static;

    /// Apply new arguments and publish the content they resolve to, tagged with `cycle`.
    ///
    /// May block on I/O; loaders call it off the async runtime.
    fn configure(&self, arguments: Self::Arguments, cycle: Cycle) -> Result<(), WatchError>;

    /// Watch for changes until `shutdown` is cancelled.
    ///
    /// Returns `Ok(())` on cancellation; an error means the watcher can no
    /// longer observe its source.
    async fn run(&self, shutdown: CancellationToken) -> Result<(), WatchError>;
}

//! Core [`ModuleLoader`] struct: watcher-driven module loading with a synchronous update contract.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use weir_core::config::ModuleConfig;
use weir_core::{Health, OptionalSecret};
use weir_graph::{GraphRuntime, ModuleArguments};

use crate::arguments::{LoaderArguments, ModuleFileArguments};
use crate::error::{ModuleError, Result, WatchError};
use crate::watch::{ChangeSink, ContentWatcher, LocalFile};

use super::state::Shared;

/// Tuning knobs for a [`ModuleLoader`].
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Name used in logs.
    pub id: String,
    /// Upper bound on how long `update` waits for the watcher to report (None = unbounded).
    pub update_timeout: Option<Duration>,
}

impl LoaderOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            update_timeout: None,
        }
    }

    /// Options for `id` using the process-wide module defaults.
    pub fn from_config(id: impl Into<String>, config: &ModuleConfig) -> Self {
        Self {
            id: id.into(),
            update_timeout: config.update_timeout,
        }
    }

    pub fn update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = Some(timeout);
        self
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::new("module")
    }
}

/// Loads a nested module from content observed by a [`ContentWatcher`].
///
/// Holds the watcher exclusively. Every [`update`](ModuleLoader::update)
/// reconfigures the watcher and returns the outcome of the reload it
/// triggered; [`run`](ModuleLoader::run) drives the watcher's loop and the
/// nested runtime until shutdown.
pub struct ModuleLoader<W: ContentWatcher> {
    shared: Arc<Shared>,
    watcher: Arc<W>,
    /// Serialises updates and holds the watch arguments last applied.
    update_gate: Mutex<W::Arguments>,
    update_timeout: Option<Duration>,
}

/// Loader for a module read from a local file.
pub type ModuleFile = ModuleLoader<LocalFile>;

impl ModuleLoader<LocalFile> {
    /// Create a file-backed loader and perform the initial load.
    ///
    /// Fails if the watcher cannot be built or the initial update fails.
    pub async fn new(
        config: ModuleFileArguments,
        runtime: Arc<dyn GraphRuntime>,
        options: LoaderOptions,
    ) -> Result<Self> {
        Self::with_watcher(config, runtime, options, LocalFile::new).await
    }
}

impl<W: ContentWatcher> ModuleLoader<W> {
    /// Create a loader around the watcher produced by `build`, then perform the initial load.
    ///
    /// `build` receives the initial watch arguments and the sink the watcher
    /// must publish changes to. An initial update error is returned to the caller.
    pub async fn with_watcher<F>(
        config: LoaderArguments<W::Arguments>,
        runtime: Arc<dyn GraphRuntime>,
        options: LoaderOptions,
        build: F,
    ) -> Result<Self>
    where
        F: FnOnce(W::Arguments, ChangeSink) -> std::result::Result<W, WatchError>,
    {
        let shared = Arc::new(Shared::new(options.id, runtime, config.arguments.clone()));
        let sink = {
            let shared = Arc::clone(&shared);
            ChangeSink::new(move |origin, change| shared.on_change(origin, change))
        };
        let watcher = build(config.watch.clone(), sink).map_err(ModuleError::WatchConfig)?;

        let loader = Self {
            shared,
            watcher: Arc::new(watcher),
            update_gate: Mutex::new(config.watch.clone()),
            update_timeout: options.update_timeout,
        };
        loader.update(config).await?;
        Ok(loader)
    }

    /// Apply new arguments and wait for the resulting reload.
    ///
    /// Returns the watcher's configuration error, or else the outcome of the
    /// load driven by the content this call's `configure` produced. Content
    /// identical to the last load (with unchanged module arguments) is not
    /// reloaded; the previous load's outcome is returned. Module arguments
    /// take effect only once `configure` has succeeded.
    pub async fn update(&self, args: LoaderArguments<W::Arguments>) -> Result<()> {
        let mut applied = self.update_gate.lock().await;

        let (cycle, rx) = self.shared.begin(args.arguments);

        let watcher = Arc::clone(&self.watcher);
        let watch = args.watch.clone();
        // `configure` may read from disk; keep it off the async workers.
        let configured = match tokio::task::spawn_blocking(move || watcher.configure(watch, cycle)).await {
            Ok(configured) => configured,
            Err(e) => {
                error!(module = %self.shared.id, error = %e, "content watcher configure task failed");
                self.shared.abandon(cycle);
                return Err(ModuleError::UpdateAbandoned);
            }
        };

        if let Err(err) = configured {
            warn!(module = %self.shared.id, error = %err, "failed to update the content watcher");
            self.shared.reject(cycle, &err);
            return Err(ModuleError::WatchConfig(err));
        }
        *applied = args.watch;

        let outcome = match self.update_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.shared.abandon(cycle);
                    warn!(module = %self.shared.id, timeout = ?limit, "module update timed out");
                    return Err(ModuleError::UpdateTimeout(limit));
                }
            },
            None => rx.await,
        };
        outcome.unwrap_or_else(|_| Err(ModuleError::UpdateAbandoned))
    }

    /// Run the watcher loop and the nested runtime until `shutdown` is cancelled.
    ///
    /// Returns `Ok(())` on cancellation, or [`ModuleError::WatchRuntime`] if the
    /// watcher loop fails first. Either way the nested runtime is stopped before
    /// returning.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let token = shutdown.child_token();
        info!(module = %self.shared.id, "module loader running");

        let watcher = async {
            self.watcher.run(token.clone()).await?;
            // A watcher that stops cleanly leaves the loader up until shutdown.
            token.cancelled().await;
            Ok::<(), WatchError>(())
        };

        let supervise = async {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Ok(()),
                res = watcher => res.map_err(ModuleError::WatchRuntime),
            };
            token.cancel();
            outcome
        };

        let (outcome, ()) = tokio::join!(supervise, self.shared.runtime.run(token.clone()));

        let mut state = self.shared.lock();
        match &outcome {
            Ok(()) => {
                info!(module = %self.shared.id, "module loader stopped");
                state.health = Health::exiting("module loader shut down");
            }
            Err(e) => {
                error!(module = %self.shared.id, error = %e, "module loader terminated");
                state.health = Health::unhealthy(e.to_string());
            }
        }
        drop(state);
        outcome
    }

    /// Last health snapshot.
    pub fn current_health(&self) -> Health {
        self.shared.lock().health.clone()
    }

    /// HTTP routes of the nested runtime.
    pub fn handler(&self) -> Router {
        self.shared.runtime.handler()
    }

    /// Module arguments of the most recent update.
    pub fn arguments(&self) -> ModuleArguments {
        self.shared.lock().arguments.clone()
    }

    /// Last content seen by the loader, if any.
    pub fn content(&self) -> Option<OptionalSecret> {
        self.shared.lock().content.clone()
    }

    /// Watch arguments of the last successfully configured update.
    pub async fn watch_arguments(&self) -> W::Arguments {
        self.update_gate.lock().await.clone()
    }

    #[cfg(test)]
    pub(crate) fn watcher(&self) -> &W {
        &self.watcher
    }
}

//! Loader state shared with the watcher's change callback.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use weir_core::{Health, OptionalSecret};
use weir_graph::{GraphError, GraphRuntime, ModuleArguments};

use crate::error::{ModuleError, Result, WatchError};
use crate::watch::{Change, Cycle, Origin};

/// An update waiting for the change its `configure` call produces.
#[derive(Debug)]
pub(super) struct PendingUpdate {
    pub cycle: Cycle,
    /// Module arguments committed when this cycle's content arrives.
    pub arguments: ModuleArguments,
    /// `None` once the caller stopped waiting.
    pub tx: Option<oneshot::Sender<Result<()>>>,
}

/// Everything an update reads or writes, under one lock.
#[derive(Debug, Default)]
pub(super) struct LoaderState {
    /// Arguments bound into the module on the next load.
    pub arguments: ModuleArguments,
    /// Arguments used by the most recent load attempt.
    pub loaded_arguments: Option<ModuleArguments>,
    /// Most recently accepted content.
    pub content: Option<OptionalSecret>,
    /// Outcome of the most recent load; `None` means it succeeded.
    pub last_load_error: Option<Arc<GraphError>>,
    /// Last cycle handed to the watcher.
    pub last_cycle: Cycle,
    pub pending: Option<PendingUpdate>,
    pub health: Health,
}

/// State plus the nested runtime, shared between the loader and the watcher callback.
pub(super) struct Shared {
    pub id: String,
    pub runtime: Arc<dyn GraphRuntime>,
    /// Serialises change application. Held across `load_content`, unlike `state`.
    apply: Mutex<()>,
    state: Mutex<LoaderState>,
}

impl Shared {
    pub fn new(id: String, runtime: Arc<dyn GraphRuntime>, arguments: ModuleArguments) -> Self {
        Self {
            id,
            runtime,
            apply: Mutex::new(()),
            state: Mutex::new(LoaderState {
                arguments,
                ..LoaderState::default()
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().expect("loader state lock poisoned")
    }

    /// Start a new update cycle. Any earlier pending update is superseded.
    pub fn begin(&self, arguments: ModuleArguments) -> (Cycle, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        let cycle = state.last_cycle.next();
        state.last_cycle = cycle;
        state.pending = Some(PendingUpdate {
            cycle,
            arguments,
            tx: Some(tx),
        });
        (cycle, rx)
    }

    /// Drop `cycle` after its `configure` failed. Its arguments are never committed.
    pub fn reject(&self, cycle: Cycle, err: &WatchError) {
        let mut state = self.lock();
        if state.pending.as_ref().is_some_and(|p| p.cycle == cycle) {
            state.pending = None;
        }
        state.health = Health::unhealthy(format!("failed to update the content watcher: {err}"));
    }

    /// Stop waiting on `cycle`. A late publish for it is still applied.
    pub fn abandon(&self, cycle: Cycle) {
        let mut state = self.lock();
        if let Some(pending) = state.pending.as_mut() {
            if pending.cycle == cycle {
                pending.tx = None;
            }
        }
    }

    /// Apply one change notification.
    ///
    /// Runs on whichever thread the watcher publishes from, possibly inside
    /// the watcher's `configure`. Only the `configure` publish of the pending
    /// cycle completes an update; run-loop changes update state and health
    /// only, and publishes from superseded cycles are dropped.
    pub fn on_change(&self, origin: Origin, change: Change) {
        let _apply = self.apply.lock().expect("loader apply lock poisoned");

        let (waiter, reload) = {
            let mut state = self.lock();

            let waiter = match origin {
                Origin::Watch => None,
                Origin::Configure(cycle) => match state.pending.take() {
                    Some(pending) if pending.cycle == cycle => {
                        state.arguments = pending.arguments;
                        pending.tx
                    }
                    other => {
                        state.pending = other;
                        debug!(module = %self.id, cycle = ?cycle, "dropping change from a superseded update");
                        return;
                    }
                },
            };

            let content = match change {
                Ok(content) => content,
                Err(err) => {
                    warn!(module = %self.id, error = %err, "content watcher reported an error");
                    state.health = Health::unhealthy(format!("failed to read module content: {err}"));
                    if let Some(tx) = waiter {
                        let _ = tx.send(Err(ModuleError::WatchConfig(err)));
                    }
                    return;
                }
            };

            let changed = state.content.as_ref() != Some(&content)
                || state.loaded_arguments.as_ref() != Some(&state.arguments);
            let reload = if changed {
                Some((state.arguments.clone(), content))
            } else {
                None
            };
            (waiter, reload)
        };

        let mut state = match reload {
            Some((arguments, content)) => {
                let result = self.runtime.load_content(&arguments, &content.value);
                match &result {
                    Ok(()) => info!(module = %self.id, bytes = content.value.len(), "reloaded module content"),
                    Err(e) => warn!(module = %self.id, error = %e, "module rejected new content"),
                }
                let mut state = self.lock();
                state.last_load_error = result.err().map(Arc::new);
                state.loaded_arguments = Some(arguments);
                state.content = Some(content);
                state
            }
            None => {
                debug!(module = %self.id, "module content unchanged, skipping reload");
                self.lock()
            }
        };

        state.health = match &state.last_load_error {
            None => Health::healthy("module content loaded"),
            Some(e) => Health::unhealthy(format!("failed to load module content: {e}")),
        };

        if let Some(tx) = waiter {
            let outcome = match &state.last_load_error {
                None => Ok(()),
                Some(e) => Err(ModuleError::Load(Arc::clone(e))),
            };
            let _ = tx.send(outcome);
        }
    }
}

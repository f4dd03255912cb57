//! Module loader: feeds watched content into a nested graph runtime.
//!
//! `update` hands new arguments to the watcher and waits until the watcher's
//! change notification for that call has been applied to the nested graph.
//! The notification may arrive synchronously from inside the watcher's
//! `configure` or later from another thread; each update registers a numbered
//! cycle and a one-shot completion channel before configuring, so both cases
//! resolve the same way. Run-loop changes never complete an update.

mod core;
mod state;

#[cfg(test)]
mod tests;

pub use self::core::{LoaderOptions, ModuleFile, ModuleLoader};

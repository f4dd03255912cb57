//! [`LocalFile`]: watches a single file via `notify` or by polling.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weir_core::config::DEFAULT_POLL_FREQUENCY;
use weir_core::OptionalSecret;

use crate::error::WatchError;

use super::{Change, ChangeSink, ContentWatcher, Cycle};

/// How [`LocalFile`] notices that its file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detector {
    /// Filesystem notifications for the file's directory.
    #[default]
    Fsnotify,
    /// Re-read the file every `poll_frequency`.
    Poll,
}

/// Arguments of the [`LocalFile`] watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileArguments {
    /// Path of the file to watch.
    pub filename: PathBuf,
    #[serde(default)]
    pub detector: Detector,
    #[serde(default = "default_poll_frequency", with = "weir_core::duration::serde_str")]
    pub poll_frequency: Duration,
    /// Mark the content as sensitive.
    #[serde(default)]
    pub is_secret: bool,
}

fn default_poll_frequency() -> Duration {
    DEFAULT_POLL_FREQUENCY
}

impl FileArguments {
    /// Arguments for `filename` with every other field at its default.
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            detector: Detector::default(),
            poll_frequency: default_poll_frequency(),
            is_secret: false,
        }
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_poll_frequency(mut self, poll_frequency: Duration) -> Self {
        self.poll_frequency = poll_frequency;
        self
    }

    pub fn secret(mut self, is_secret: bool) -> Self {
        self.is_secret = is_secret;
        self
    }

    pub fn validate(&self) -> Result<(), WatchError> {
        if self.filename.as_os_str().is_empty() {
            return Err(WatchError::InvalidArguments(
                "filename must not be empty".to_string(),
            ));
        }
        if self.poll_frequency.is_zero() {
            return Err(WatchError::InvalidArguments(
                "poll_frequency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Read the file into an [`OptionalSecret`] carrying the `is_secret` flag.
    fn read(&self) -> Result<OptionalSecret, WatchError> {
        let value = fs::read_to_string(&self.filename).map_err(|source| WatchError::Read {
            path: self.filename.clone(),
            source,
        })?;
        Ok(OptionalSecret::new(value, self.is_secret))
    }
}

/// Watches a single local file.
///
/// `configure` reads the file synchronously and publishes its content before
/// returning. `run` re-reads it whenever the configured detector fires. Reads
/// and publishes are serialised by the arguments lock, so a run-loop reload
/// never interleaves with a `configure` call.
pub struct LocalFile {
    sink: ChangeSink,
    arguments: Mutex<FileArguments>,
    /// Wakes the run loop so it re-arms its detector for new arguments.
    reconfigured: Notify,
}

impl LocalFile {
    /// Create a watcher for `arguments`. Nothing is read until `configure`.
    pub fn new(arguments: FileArguments, sink: ChangeSink) -> Result<Self, WatchError> {
        arguments.validate()?;
        Ok(Self {
            sink,
            arguments: Mutex::new(arguments),
            reconfigured: Notify::new(),
        })
    }

    /// Arguments currently in effect.
    pub fn arguments(&self) -> FileArguments {
        self.arguments.lock().expect("arguments lock poisoned").clone()
    }

    /// Re-read the file and publish the result.
    fn reload(&self) {
        let arguments = self.arguments.lock().expect("arguments lock poisoned");
        let change: Change = arguments.read();
        if let Err(e) = &change {
            warn!(path = %arguments.filename.display(), error = %e, "failed to re-read watched file");
        }
        self.sink.publish(change);
    }
}

#[async_trait]
impl ContentWatcher for LocalFile {
    type Arguments = FileArguments;

    /// Validate and read with the new arguments; they only take effect if the read succeeds.
    fn configure(&self, arguments: FileArguments, cycle: Cycle) -> Result<(), WatchError> {
        arguments.validate()?;

        let mut current = self.arguments.lock().expect("arguments lock poisoned");
        let content = arguments.read()?;
        let rearm = current.filename != arguments.filename
            || current.detector != arguments.detector
            || current.poll_frequency != arguments.poll_frequency;
        *current = arguments;
        if rearm {
            self.reconfigured.notify_one();
        }

        debug!(path = %current.filename.display(), bytes = content.value.len(), "read watched file");
        self.sink.publish_configured(cycle, Ok(content));
        Ok(())
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), WatchError> {
        loop {
            let arguments = self.arguments();
            let mut trigger = Trigger::start(&arguments)?;
            info!(
                path = %arguments.filename.display(),
                detector = ?arguments.detector,
                "watching file for changes"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = self.reconfigured.notified() => {
                        debug!("watch arguments changed, restarting detector");
                        break;
                    }
                    fired = trigger.fired() => {
                        fired?;
                        self.reload();
                    }
                }
            }
        }
    }
}

// ── Detectors ────────────────────────────────────────────────────────

/// An armed detector for one set of arguments.
enum Trigger {
    Fsnotify {
        /// Held to keep the OS watch alive.
        _watcher: RecommendedWatcher,
        events: mpsc::Receiver<Result<(), notify::Error>>,
    },
    Poll {
        ticker: Interval,
    },
}

impl Trigger {
    fn start(arguments: &FileArguments) -> Result<Self, WatchError> {
        match arguments.detector {
            Detector::Poll => {
                let period = arguments.poll_frequency;
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Ok(Trigger::Poll { ticker })
            }
            Detector::Fsnotify => {
                let target = arguments.filename.clone();
                let dir = watch_dir(&target);
                // Capacity 1: a pending wake-up already covers any burst of events.
                let (tx, events) = mpsc::channel(1);

                let mut watcher = notify::recommended_watcher(
                    move |res: std::result::Result<Event, notify::Error>| {
                        let wake = match res {
                            Ok(event) if touches(&event, &target) => Ok(()),
                            Ok(_) => return,
                            Err(e) => Err(e),
                        };
                        let _ = tx.try_send(wake);
                    },
                )?;

                // Watch the directory so that editors replacing the file by rename are seen.
                watcher.watch(&dir, RecursiveMode::NonRecursive)?;
                Ok(Trigger::Fsnotify {
                    _watcher: watcher,
                    events,
                })
            }
        }
    }

    /// Wait until the detector fires. Errors from the OS watcher are fatal.
    async fn fired(&mut self) -> Result<(), WatchError> {
        match self {
            Trigger::Poll { ticker } => {
                ticker.tick().await;
                Ok(())
            }
            Trigger::Fsnotify { events, .. } => match events.recv().await {
                Some(res) => res.map_err(WatchError::from),
                // The sender lives in the watcher we hold, so the channel never closes.
                None => std::future::pending().await,
            },
        }
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether a filesystem event concerns the watched file.
fn touches(event: &Event, target: &Path) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }
    let Some(name) = target.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

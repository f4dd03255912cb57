//! Tests for the module loader, driven by a scripted watcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;
use weir_core::{HealthType, OptionalSecret};
use weir_graph::{GraphError, GraphRuntime, ModuleArguments};

use super::{LoaderOptions, ModuleLoader};
use crate::arguments::LoaderArguments;
use crate::error::{ModuleError, WatchError};
use crate::watch::{ChangeSink, ContentWatcher, Cycle};

// ── Fixtures ─────────────────────────────────────────────────────────

/// When the scripted watcher publishes the content it was configured with.
#[derive(Debug, Clone, Copy)]
enum Delivery {
    /// Inside `configure`, on the caller's stack.
    Inline,
    /// From another thread after a delay.
    Deferred(Duration),
    /// Never.
    Silent,
}

#[derive(Debug, Clone)]
struct ScriptArgs {
    /// `None` makes `configure` fail.
    content: Option<String>,
    delivery: Delivery,
    /// Run-loop change landing from another thread while `configure` is in progress.
    concurrent_change: Option<Result<String, String>>,
}

impl ScriptArgs {
    fn inline(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            delivery: Delivery::Inline,
            concurrent_change: None,
        }
    }

    fn deferred(content: &str, delay: Duration) -> Self {
        Self {
            content: Some(content.to_string()),
            delivery: Delivery::Deferred(delay),
            concurrent_change: None,
        }
    }

    fn silent(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            delivery: Delivery::Silent,
            concurrent_change: None,
        }
    }

    fn failing() -> Self {
        Self {
            content: None,
            delivery: Delivery::Inline,
            concurrent_change: None,
        }
    }

    /// Have a run-loop reload of `content` land before this call publishes.
    fn with_concurrent_reload(mut self, content: &str) -> Self {
        self.concurrent_change = Some(Ok(content.to_string()));
        self
    }

    /// Have a run-loop read error land before this call publishes.
    fn with_concurrent_read_error(mut self, reason: &str) -> Self {
        self.concurrent_change = Some(Err(reason.to_string()));
        self
    }
}

struct ScriptedWatcher {
    sink: ChangeSink,
    fail_run: bool,
}

#[async_trait]
impl ContentWatcher for ScriptedWatcher {
    type Arguments = ScriptArgs;

    fn configure(&self, arguments: ScriptArgs, cycle: Cycle) -> Result<(), WatchError> {
        let content = arguments
            .content
            .ok_or_else(|| WatchError::InvalidArguments("no content".to_string()))?;
        if let Some(change) = arguments.concurrent_change {
            let sink = self.sink.clone();
            std::thread::spawn(move || {
                let change = change
                    .map(OptionalSecret::plain)
                    .map_err(WatchError::InvalidArguments);
                sink.publish(change);
            })
            .join()
            .unwrap();
        }
        match arguments.delivery {
            Delivery::Inline => self
                .sink
                .publish_configured(cycle, Ok(OptionalSecret::plain(content))),
            Delivery::Deferred(delay) => {
                let sink = self.sink.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    sink.publish_configured(cycle, Ok(OptionalSecret::plain(content)));
                });
            }
            Delivery::Silent => {}
        }
        Ok(())
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), WatchError> {
        if self.fail_run {
            return Err(WatchError::InvalidArguments("source vanished".to_string()));
        }
        shutdown.cancelled().await;
        Ok(())
    }
}

/// Records every load; rejects content starting with "bad", stalls on "slow".
#[derive(Default)]
struct RecordingRuntime {
    loads: Mutex<Vec<(ModuleArguments, String)>>,
    runs: AtomicUsize,
}

impl RecordingRuntime {
    fn loads(&self) -> Vec<(ModuleArguments, String)> {
        self.loads.lock().unwrap().clone()
    }

    fn contents(&self) -> Vec<String> {
        self.loads().into_iter().map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl GraphRuntime for RecordingRuntime {
    fn load_content(&self, arguments: &ModuleArguments, content: &str) -> Result<(), GraphError> {
        self.loads
            .lock()
            .unwrap()
            .push((arguments.clone(), content.to_string()));
        if content.starts_with("slow") {
            std::thread::sleep(Duration::from_millis(300));
        }
        if content.starts_with("bad") {
            return Err(GraphError::MissingArgument("target".to_string()));
        }
        Ok(())
    }

    async fn run(&self, shutdown: CancellationToken) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        shutdown.cancelled().await;
    }

    fn handler(&self) -> Router {
        Router::new()
    }
}

async fn loader_with(
    initial: ScriptArgs,
    runtime: &Arc<RecordingRuntime>,
    options: LoaderOptions,
    fail_run: bool,
) -> crate::error::Result<ModuleLoader<ScriptedWatcher>> {
    let runtime: Arc<dyn GraphRuntime> = runtime.clone();
    ModuleLoader::with_watcher(LoaderArguments::new(initial), runtime, options, move |_, sink| {
        Ok(ScriptedWatcher { sink, fail_run })
    })
    .await
}

async fn loader(initial: ScriptArgs, runtime: &Arc<RecordingRuntime>) -> ModuleLoader<ScriptedWatcher> {
    loader_with(initial, runtime, LoaderOptions::default(), false)
        .await
        .expect("initial load")
}

// ── Construction ─────────────────────────────────────────────────────

#[tokio::test]
async fn new_loads_initial_content_and_reports_healthy() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    assert_eq!(runtime.contents(), vec!["a=1"]);
    assert_eq!(loader.current_health().health, HealthType::Healthy);
    assert_eq!(loader.content(), Some(OptionalSecret::plain("a=1")));
}

#[tokio::test]
async fn new_propagates_watch_config_error() {
    let runtime = Arc::new(RecordingRuntime::default());
    let err = loader_with(ScriptArgs::failing(), &runtime, LoaderOptions::default(), false)
        .await
        .err()
        .expect("construction fails");

    assert!(matches!(err, ModuleError::WatchConfig(WatchError::InvalidArguments(_))));
    assert!(runtime.loads().is_empty());
}

#[tokio::test]
async fn new_propagates_initial_load_error() {
    let runtime = Arc::new(RecordingRuntime::default());
    let err = loader_with(ScriptArgs::inline("bad"), &runtime, LoaderOptions::default(), false)
        .await
        .err()
        .expect("construction fails");

    assert!(matches!(err, ModuleError::Load(_)));
}

// ── Update ───────────────────────────────────────────────────────────

#[tokio::test]
async fn update_with_changed_content_reloads_once() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    loader
        .update(LoaderArguments::new(ScriptArgs::inline("a=2")))
        .await
        .unwrap();

    assert_eq!(runtime.contents(), vec!["a=1", "a=2"]);
}

#[tokio::test]
async fn update_with_identical_content_skips_reload() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    for _ in 0..3 {
        loader
            .update(LoaderArguments::new(ScriptArgs::inline("a=1")))
            .await
            .unwrap();
    }

    assert_eq!(runtime.contents(), vec!["a=1"]);
    assert!(loader.current_health().is_healthy());
}

#[tokio::test]
async fn update_with_changed_arguments_reloads_same_content() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    loader
        .update(LoaderArguments::new(ScriptArgs::inline("a=1")).with_argument("target", "db:5432"))
        .await
        .unwrap();

    let loads = runtime.loads();
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[1].0["target"], serde_yaml::Value::from("db:5432"));
    assert_eq!(loader.arguments()["target"], serde_yaml::Value::from("db:5432"));
}

#[tokio::test]
async fn update_waits_for_deferred_publish() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    loader
        .update(LoaderArguments::new(ScriptArgs::deferred(
            "a=2",
            Duration::from_millis(50),
        )))
        .await
        .unwrap();

    // The reload happened before update returned.
    assert_eq!(runtime.contents(), vec!["a=1", "a=2"]);
}

#[tokio::test]
async fn update_reports_deferred_load_failure() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    let err = loader
        .update(LoaderArguments::new(ScriptArgs::deferred(
            "bad=1",
            Duration::from_millis(30),
        )))
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Load(_)));
    assert_eq!(loader.current_health().health, HealthType::Unhealthy);
}

#[tokio::test]
async fn load_failure_then_recovery_restores_health() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    let err = loader
        .update(LoaderArguments::new(ScriptArgs::inline("bad")))
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::Load(_)));
    assert_eq!(loader.current_health().health, HealthType::Unhealthy);

    // Same bad content again: no reload, same outcome.
    let err = loader
        .update(LoaderArguments::new(ScriptArgs::inline("bad")))
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::Load(_)));
    assert_eq!(runtime.contents(), vec!["a=1", "bad"]);

    loader
        .update(LoaderArguments::new(ScriptArgs::inline("a=3")))
        .await
        .unwrap();
    assert!(loader.current_health().is_healthy());
}

#[tokio::test]
async fn update_watch_config_error_marks_unhealthy_and_keeps_previous_arguments() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    let err = loader
        .update(LoaderArguments::new(ScriptArgs::failing()))
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::WatchConfig(_)));
    let health = loader.current_health();
    assert_eq!(health.health, HealthType::Unhealthy);
    assert!(health.message.contains("failed to update the content watcher"));
    assert_eq!(loader.watch_arguments().await.content.as_deref(), Some("a=1"));
    assert_eq!(runtime.contents(), vec!["a=1"]);
}

#[tokio::test]
async fn rejected_update_does_not_leak_module_arguments() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    let err = loader
        .update(LoaderArguments::new(ScriptArgs::failing()).with_argument("target", "rejected"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::WatchConfig(_)));
    assert!(loader.arguments().is_empty());

    // The run loop re-reading unchanged content must not reload with the rejected arguments.
    loader
        .watcher()
        .sink
        .publish(Ok(OptionalSecret::plain("a=1")));

    assert!(loader.arguments().is_empty());
    let loads = runtime.loads();
    assert_eq!(loads.len(), 1);
    assert!(loads[0].0.is_empty());
    assert!(loader.current_health().is_healthy());
}

#[tokio::test]
async fn concurrent_reload_does_not_answer_for_this_update() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("init"), &runtime).await;

    let err = loader
        .update(LoaderArguments::new(
            ScriptArgs::inline("bad=2").with_concurrent_reload("init-reread"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Load(_)), "got {err:?}");
    assert_eq!(runtime.contents(), vec!["init", "init-reread", "bad=2"]);
    assert_eq!(loader.current_health().health, HealthType::Unhealthy);
}

#[tokio::test]
async fn concurrent_read_error_does_not_answer_for_this_update() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    loader
        .update(LoaderArguments::new(
            ScriptArgs::deferred("a=2", Duration::from_millis(30))
                .with_concurrent_read_error("transient rename"),
        ))
        .await
        .unwrap();

    assert_eq!(runtime.contents(), vec!["a=1", "a=2"]);
    assert!(loader.current_health().is_healthy());
}

#[tokio::test]
async fn late_publish_from_timed_out_update_is_dropped() {
    let runtime = Arc::new(RecordingRuntime::default());
    let options = LoaderOptions::default().update_timeout(Duration::from_millis(30));
    let loader = loader_with(ScriptArgs::inline("a=1"), &runtime, options, false)
        .await
        .unwrap();

    let err = loader
        .update(LoaderArguments::new(ScriptArgs::deferred(
            "a=2",
            Duration::from_millis(150),
        )))
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::UpdateTimeout(_)));

    loader
        .update(LoaderArguments::new(ScriptArgs::inline("a=3")))
        .await
        .unwrap();

    // Let the superseded publish arrive.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(runtime.contents(), vec!["a=1", "a=3"]);
    assert_eq!(loader.content(), Some(OptionalSecret::plain("a=3")));
}

#[tokio::test]
async fn update_times_out_when_watcher_stays_silent() {
    let runtime = Arc::new(RecordingRuntime::default());
    let options = LoaderOptions::default().update_timeout(Duration::from_millis(50));
    let loader = loader_with(ScriptArgs::inline("a=1"), &runtime, options, false)
        .await
        .unwrap();

    let err = loader
        .update(LoaderArguments::new(ScriptArgs::silent("a=2")))
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::UpdateTimeout(d) if d == Duration::from_millis(50)));

    // A later update is not confused by the abandoned one.
    loader
        .update(LoaderArguments::new(ScriptArgs::inline("a=3")))
        .await
        .unwrap();
    assert_eq!(runtime.contents(), vec!["a=1", "a=3"]);
}

#[tokio::test]
async fn concurrent_updates_each_get_their_own_outcome() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = Arc::new(loader(ScriptArgs::inline("init"), &runtime).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let loader = Arc::clone(&loader);
        handles.push(tokio::spawn(async move {
            let content = if i % 2 == 0 {
                format!("ok={i}")
            } else {
                format!("bad={i}")
            };
            let args = ScriptArgs::deferred(&content, Duration::from_millis(5));
            (i, loader.update(LoaderArguments::new(args)).await)
        }));
    }

    for handle in handles {
        let (i, result) = handle.await.unwrap();
        if i % 2 == 0 {
            assert!(result.is_ok(), "update {i} should succeed: {result:?}");
        } else {
            assert!(matches!(result, Err(ModuleError::Load(_))), "update {i}: {result:?}");
        }
    }
    assert_eq!(runtime.loads().len(), 9);
}

#[tokio::test]
async fn health_is_readable_while_a_load_is_in_progress() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = Arc::new(loader(ScriptArgs::inline("a=1"), &runtime).await);

    let update = {
        let loader = Arc::clone(&loader);
        tokio::spawn(async move {
            loader
                .update(LoaderArguments::new(ScriptArgs::inline("slow=1")))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = std::time::Instant::now();
    assert!(loader.current_health().is_healthy());
    assert!(started.elapsed() < Duration::from_millis(100));

    update.await.unwrap().unwrap();
    assert_eq!(runtime.contents(), vec!["a=1", "slow=1"]);
}

#[tokio::test]
async fn watcher_error_change_marks_unhealthy_and_keeps_content() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader(ScriptArgs::inline("a=1"), &runtime).await;

    loader.watcher().sink.publish(Err(WatchError::InvalidArguments(
        "file disappeared".to_string(),
    )));

    let health = loader.current_health();
    assert_eq!(health.health, HealthType::Unhealthy);
    assert!(health.message.contains("file disappeared"));
    assert_eq!(loader.content(), Some(OptionalSecret::plain("a=1")));
    assert_eq!(runtime.contents(), vec!["a=1"]);
}

// ── Run ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_returns_promptly_on_cancel() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = Arc::new(loader(ScriptArgs::inline("a=1"), &runtime).await);

    let shutdown = CancellationToken::new();
    let handle = {
        let loader = Arc::clone(&loader);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { loader.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("run returns promptly after cancel")
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(runtime.runs.load(Ordering::SeqCst), 1);
    assert_eq!(loader.current_health().health, HealthType::Exiting);
}

#[tokio::test]
async fn run_fails_when_watcher_loop_fails() {
    let runtime = Arc::new(RecordingRuntime::default());
    let loader = loader_with(ScriptArgs::inline("a=1"), &runtime, LoaderOptions::default(), true)
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), loader.run(CancellationToken::new()))
        .await
        .expect("run returns once the watcher fails");

    assert!(matches!(result, Err(ModuleError::WatchRuntime(_))));
    assert_eq!(loader.current_health().health, HealthType::Unhealthy);
}

#[test]
fn options_from_config_copy_update_timeout() {
    let config = weir_core::config::ModuleConfig {
        update_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let options = LoaderOptions::from_config("scrape", &config);
    assert_eq!(options.id, "scrape");
    assert_eq!(options.update_timeout, Some(Duration::from_secs(5)));
}

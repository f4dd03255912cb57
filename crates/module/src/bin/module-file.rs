//! module-file: runs a single file-backed module and serves its HTTP routes.
//!
//! The loader arguments come either from a YAML file (`--config`) or from
//! flags (`--filename`, `--detector`). Routes:
//! - `GET /health` for the loader's current health
//! - everything the nested module graph exposes (`/declarations`, ...)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use weir_core::config::{load_dotenv, Config};
use weir_core::Health;
use weir_graph::{GraphRuntime, ModuleGraph};
use weir_module::{Detector, FileArguments, LoaderOptions, ModuleFile, ModuleFileArguments};

// ── CLI ─────────────────────────────────────────────────────────────

/// Load a module from a local file and keep it in sync with the file.
#[derive(Parser, Debug)]
#[command(name = "module-file", version, about)]
struct Cli {
    /// YAML file holding the loader arguments (filename, detector, arguments, ...).
    #[arg(long, env = "MODULE_CONFIG", conflicts_with = "filename")]
    config: Option<PathBuf>,

    /// Module file to load, when no --config is given.
    #[arg(long, env = "MODULE_FILENAME")]
    filename: Option<PathBuf>,

    /// Change detector used with --filename.
    #[arg(long, default_value = "fsnotify", value_parser = parse_detector)]
    detector: Detector,

    /// Name of the module in logs.
    #[arg(long, default_value = "module")]
    id: String,

    /// Listen address override (defaults to HOST:PORT from the environment).
    #[arg(long)]
    listen: Option<String>,
}

fn parse_detector(s: &str) -> Result<Detector, String> {
    match s {
        "fsnotify" => Ok(Detector::Fsnotify),
        "poll" => Ok(Detector::Poll),
        other => Err(format!("unknown detector '{other}', expected fsnotify or poll")),
    }
}

fn loader_arguments(cli: &Cli, config: &Config) -> anyhow::Result<ModuleFileArguments> {
    if let Some(path) = &cli.config {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let args = ModuleFileArguments::from_yaml(&yaml)
            .with_context(|| format!("invalid loader arguments in {}", path.display()))?;
        info!(path = %path.display(), "loaded module arguments");
        return Ok(args);
    }

    let filename = cli
        .filename
        .clone()
        .context("either --config or --filename is required")?;
    Ok(ModuleFileArguments::new(
        FileArguments::new(filename)
            .with_detector(cli.detector)
            .with_poll_frequency(config.module.poll_frequency),
    ))
}

async fn health(State(loader): State<Arc<ModuleFile>>) -> Json<Health> {
    Json(loader.current_health())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let arguments = loader_arguments(&cli, &config)?;
    let graph: Arc<dyn GraphRuntime> = Arc::new(ModuleGraph::new(cli.id.clone()));
    let options = LoaderOptions::from_config(cli.id.clone(), &config.module);

    let loader = Arc::new(
        ModuleFile::new(arguments, graph, options)
            .await
            .context("initial module load failed")?,
    );

    let app = Router::new()
        .route("/health", get(health))
        .with_state(Arc::clone(&loader))
        .merge(loader.handler());

    let addr = cli.listen.clone().unwrap_or_else(|| config.server.listen_addr());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "module-file listening");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
            shutdown.cancel();
        });
    }

    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    let outcome = loader.run(shutdown.clone()).await;
    shutdown.cancel();
    server.await.context("server task panicked")??;

    outcome?;
    info!("module-file exited cleanly");
    Ok(())
}

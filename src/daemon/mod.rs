// Daemon module: configuration, logging setup and the HTTP server lifecycle.
// Sub-modules hold the registry-facing halves of the status protocol.

pub mod callback;
pub mod reader;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;

use crate::models::RelayConfig;
use crate::pipeline::{HttpPipelineTransport, PipelineTransport};
use crate::server::{self, AppState};
use crate::storage::{InMemoryStatusStore, StatusStore};

/// Directory name under the platform config dir.
pub const APP_DIR_NAME: &str = "bmn-docgen";

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

fn read_config_file(path: &Path) -> Result<RelayConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Load the RelayConfig using this resolution order:
///   1. --config CLI flag (passed as config_path)
///   2. BMN_CONFIG_DIR environment variable
///   3. Platform config dir (dirs::config_dir()/bmn-docgen/config.json)
///   4. RelayConfig::default()
///
/// `N8N_WEBHOOK_URL` and `PUBLIC_BASE_URL` are applied on top of whichever
/// source won.
pub fn load_config(config_path: Option<&Path>) -> Result<RelayConfig> {
    let mut config = resolve_config_file(config_path)?;
    config.apply_env();
    Ok(config)
}

fn resolve_config_file(config_path: Option<&Path>) -> Result<RelayConfig> {
    if let Some(path) = config_path {
        if path.exists() {
            let config = read_config_file(path)?;
            tracing::info!("Loaded config from: {}", path.display());
            return Ok(config);
        }
        return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
    }

    if let Ok(config_dir) = std::env::var("BMN_CONFIG_DIR") {
        let path = PathBuf::from(&config_dir).join("config.json");
        if path.exists() {
            let config = read_config_file(&path)?;
            tracing::info!("Loaded config from BMN_CONFIG_DIR: {}", path.display());
            return Ok(config);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(APP_DIR_NAME).join("config.json");
        if path.exists() {
            let config = read_config_file(&path)?;
            tracing::info!("Loaded config from: {}", path.display());
            return Ok(config);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(RelayConfig::default())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install the global subscriber: stderr always, plus `log_file` when set.
///
/// The returned guard flushes the file writer; keep it alive for the life of
/// the process.
pub fn init_tracing(log_file: Option<&Path>, default_filter: &str) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file = log_file.map(|path| {
        (
            path,
            std::fs::OpenOptions::new().create(true).append(true).open(path),
        )
    });

    match file {
        Some((path, Ok(file))) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            if tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .is_ok()
            {
                tracing::info!("Logging to stderr and {}", path.display());
            }
            Some(guard)
        }
        Some((path, Err(e))) => {
            if tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .try_init()
                .is_ok()
            {
                tracing::warn!(
                    "Could not open log file {}: {}. Logging to stderr only.",
                    path.display(),
                    e
                );
            }
            None
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Server startup
// ---------------------------------------------------------------------------

/// Overrides supplied on the command line; they win over every config source.
#[derive(Debug, Default, Clone)]
pub struct ServeOptions {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub pipeline_url: Option<String>,
    pub public_base_url: Option<String>,
}

/// Build the shared state around a fresh in-memory registry and an HTTP
/// pipeline transport.
pub fn build_state(config: Arc<RelayConfig>) -> Result<Arc<AppState>> {
    let store: Arc<dyn StatusStore> = Arc::new(InMemoryStatusStore::new());
    let transport: Arc<dyn PipelineTransport> = Arc::new(HttpPipelineTransport::new(
        Duration::from_secs(config.forward_timeout_secs),
    )?);
    Ok(Arc::new(AppState::new(config, store, transport)))
}

/// Start the relay and serve until Ctrl+C or SIGTERM.
///
/// Steps:
/// 1. Load config and apply CLI overrides
/// 2. Set up tracing
/// 3. Build state and router
/// 4. Bind and serve with graceful shutdown
pub async fn start_server(opts: ServeOptions) -> Result<()> {
    let mut config = load_config(opts.config_path.as_deref())?;
    if let Some(h) = opts.host {
        config.host = h;
    }
    if let Some(p) = opts.port {
        config.port = p;
    }
    config.apply_overrides(opts.pipeline_url, opts.public_base_url);

    let _guard = init_tracing(config.log_file.as_deref(), "info");

    if config.pipeline_endpoint().is_none() {
        tracing::warn!("N8N_WEBHOOK_URL not configured; submissions will be rejected");
    }
    if config.public_base().is_none() {
        tracing::warn!("PUBLIC_BASE_URL not configured; submissions will be rejected");
    }

    let config = Arc::new(config);
    let state = build_state(Arc::clone(&config))?;
    let router = server::create_router(state);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context(format!("Failed to bind to {}", bind_addr))?;
    tracing::info!("Relay listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Relay exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C signal"),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                }
            }
            Err(e) => {
                tracing::warn!("Could not install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received Ctrl+C signal");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl+C signal");
    }
}

//! Audio Conform server entry point.
//!
//! Loads configuration, initializes logging, creates the working
//! directories and serves the HTTP API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use conform_core::config::ConfigManager;
use conform_core::logging::init_tracing_with_file;
use conform_core::orchestrator::ConformService;
use conform_server::{build_router, AppState};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "audio-conform")]
#[command(about = "Conforms audio clips to an exact duration")]
#[command(version)]
struct Args {
    /// Settings file (created with defaults if missing)
    #[arg(short, long, default_value = ".config/conform.toml", env = "CONFORM_CONFIG")]
    config: PathBuf,

    /// Listen address, overrides `server.bind_addr`
    #[arg(short, long, env = "CONFORM_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config_manager = ConfigManager::new(&args.config);
    if let Err(e) = config_manager.load_or_create() {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
    }
    config_manager.apply_env_overrides();

    config_manager
        .ensure_dirs_exist()
        .context("creating working directories")?;

    let logs_dir = config_manager.logs_folder();
    let _log_guard = init_tracing_with_file(config_manager.settings().logging.level, &logs_dir);

    tracing::info!("Audio Conform starting");
    tracing::info!("Config: {}", args.config.display());
    tracing::info!("Logs: {}", logs_dir.display());
    tracing::info!("Core version: {}", conform_core::version());

    let settings = config_manager.into_settings();
    let bind_addr = args
        .bind
        .unwrap_or_else(|| settings.server.bind_addr.clone());

    let service = ConformService::from_settings(settings).context("opening result store")?;
    let app = build_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);
    tracing::info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

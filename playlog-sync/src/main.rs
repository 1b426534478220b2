//! playlog-sync - game library import service
//!
//! Subcommands:
//! - `serve` (default): HTTP API with background imports
//! - `import`: one import run on the command line
//! - `check`: verify Steam credentials via the player summary endpoint

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlog_common::config::{
    default_config_path, ensure_root_folder, load_toml_config, resolve_root_folder, TomlConfig,
};
use playlog_sync::config::{resolve_credentials, SyncConfig};
use playlog_sync::models::JobStatus;
use playlog_sync::services::SteamCatalogClient;
use playlog_sync::tasks::TokioTaskExecutor;
use playlog_sync::AppState;

/// Command-line arguments for playlog-sync
#[derive(Parser, Debug)]
#[command(name = "playlog-sync")]
#[command(about = "Game library and play history import service")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "PLAYLOG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Listen address, overrides the config file
        #[arg(short, long, env = "PLAYLOG_BIND_ADDRESS")]
        bind: Option<String>,
    },
    /// Run one import and print its outcome
    Import {
        /// Owner recorded on the import job
        #[arg(long, default_value = "cli")]
        owner: String,
    },
    /// Test the configured Steam credentials
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_result = config_path
        .as_deref()
        .filter(|path| path.exists())
        .map(load_toml_config);
    let toml_config = match &toml_result {
        Some(Ok(config)) => config.clone(),
        _ => TomlConfig::default(),
    };

    init_tracing(&toml_config.logging.level);

    if let (Some(Err(e)), Some(path)) = (&toml_result, &config_path) {
        warn!("Ignoring config file {}: {}", path.display(), e);
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = ensure_root_folder(&root_folder)?;
    info!("Database: {}", db_path.display());

    let db = playlog_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let sync_config = SyncConfig::from_toml(&toml_config);

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            serve(db, sync_config, toml_config, config_path, bind).await
        }
        Command::Import { owner } => run_import(db, &sync_config, &toml_config, &owner).await,
        Command::Check => check(db, &sync_config, &toml_config).await,
    }
}

fn init_tracing(default_level: &str) {
    let default_filter = format!(
        "playlog_sync={level},playlog_common={level},tower_http={level}",
        level = default_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(
    db: sqlx::SqlitePool,
    mut sync_config: SyncConfig,
    toml_config: TomlConfig,
    toml_path: Option<PathBuf>,
    bind: Option<String>,
) -> Result<()> {
    info!("Starting playlog-sync {}", env!("CARGO_PKG_VERSION"));

    if let Some(bind) = bind {
        sync_config.bind_address = bind;
    }

    let executor = Arc::new(TokioTaskExecutor::new());
    let jobs = Arc::new(playlog_sync::build_job_manager(db.clone(), &sync_config, executor)?);

    // Jobs left PENDING by a previous process have no executor anymore
    jobs.recover_stale().await?;

    let bind_address = sync_config.bind_address.clone();
    let state = AppState::new(db, sync_config, toml_config, toml_path, jobs);
    let app = playlog_sync::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_import(
    db: sqlx::SqlitePool,
    sync_config: &SyncConfig,
    toml_config: &TomlConfig,
    owner: &str,
) -> Result<()> {
    let credentials = resolve_credentials(&db, toml_config).await?;
    let jobs = playlog_sync::build_job_manager(
        db,
        sync_config,
        Arc::new(TokioTaskExecutor::new()),
    )?;

    println!("Importing games for {}...", credentials.steam_id);
    let job = jobs
        .run_to_completion(&credentials.steam_id, &credentials.api_key, owner)
        .await?;

    let result = job.result.unwrap_or_default();
    match job.status {
        JobStatus::Success => {
            println!(
                "Import complete: {} fetched, {} new, {} errors",
                result["fetched"], result["created"], result["errors"]
            );
            Ok(())
        }
        _ => bail!("Import failed: {}", result),
    }
}

async fn check(
    db: sqlx::SqlitePool,
    sync_config: &SyncConfig,
    toml_config: &TomlConfig,
) -> Result<()> {
    let credentials = resolve_credentials(&db, toml_config).await?;
    let client = SteamCatalogClient::new(
        sync_config.catalog_url.clone(),
        sync_config.player_summary_url.clone(),
        sync_config.request_timeout,
    )?;

    match client
        .fetch_player_name(&credentials.steam_id, &credentials.api_key)
        .await?
    {
        Some(name) => {
            println!("Connected to Steam as {}", name);
            Ok(())
        }
        None => bail!("No player found for Steam ID {}", credentials.steam_id),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

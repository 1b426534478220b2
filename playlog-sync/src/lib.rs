//! playlog-sync library interface
//!
//! Exposes the import pipeline, job tracking and HTTP API for the binary
//! and for integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod tasks;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use playlog_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::SyncConfig;
use crate::db::{SqliteItemRepository, SqliteJobRepository};
use crate::services::{
    ClientError, FetchMerger, JobManager, RateLimiter, Reconciler, SteamCatalogClient,
    StoreDetailClient,
};
use crate::tasks::TaskExecutor;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<SyncConfig>,
    /// TOML values used as the lowest-priority credential source
    pub toml_config: Arc<TomlConfig>,
    /// Where credential updates are mirrored; `None` disables write-back
    pub toml_path: Option<PathBuf>,
    pub jobs: Arc<JobManager>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: SyncConfig,
        toml_config: TomlConfig,
        toml_path: Option<PathBuf>,
        jobs: Arc<JobManager>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            toml_config: Arc::new(toml_config),
            toml_path,
            jobs,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Wire the Steam clients, merger and reconciler into a job manager
pub fn build_job_manager(
    db: SqlitePool,
    config: &SyncConfig,
    executor: Arc<dyn TaskExecutor>,
) -> Result<JobManager, ClientError> {
    let catalog = SteamCatalogClient::new(
        config.catalog_url.clone(),
        config.player_summary_url.clone(),
        config.request_timeout,
    )?;
    let rate_limiter = Arc::new(RateLimiter::new(config.detail_interval));
    let detail = StoreDetailClient::new(config.store_url.clone(), rate_limiter, config.request_timeout)?;

    let merger = FetchMerger::new(Arc::new(catalog), Arc::new(detail));
    let reconciler = Reconciler::new(Arc::new(SqliteItemRepository::new(db.clone())));

    Ok(JobManager::new(
        Arc::new(SqliteJobRepository::new(db)),
        executor,
        Arc::new(merger),
        Arc::new(reconciler),
    ))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::import_routes())
        .merge(api::library_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Configuration resolution for playlog-sync
//!
//! Endpoint and tuning values come from the TOML `[sync]` section with
//! compiled defaults. Steam credentials resolve Database → ENV → TOML.

use playlog_common::config::{write_toml_config, TomlConfig};
use playlog_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CATALOG_URL: &str =
    "https://api.steampowered.com/IPlayerService/GetOwnedGames/v0001/";
pub const DEFAULT_STORE_URL: &str = "https://store.steampowered.com/api/appdetails";
pub const DEFAULT_PLAYER_SUMMARY_URL: &str =
    "https://api.steampowered.com/ISteamUser/GetPlayerSummaries/v0002/";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";
pub const DEFAULT_DETAIL_INTERVAL_MS: u64 = 1200;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const ITEMS_PAGE_SIZE: i64 = 30;

pub const API_KEY_ENV: &str = "PLAYLOG_STEAM_API_KEY";
pub const STEAM_ID_ENV: &str = "PLAYLOG_STEAM_ID";

/// Effective import/service settings
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub catalog_url: String,
    pub store_url: String,
    pub player_summary_url: String,
    /// Minimum spacing between store detail calls
    pub detail_interval: Duration,
    /// Per-request timeout for every external call
    pub request_timeout: Duration,
    pub page_size: i64,
    pub bind_address: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            store_url: DEFAULT_STORE_URL.to_string(),
            player_summary_url: DEFAULT_PLAYER_SUMMARY_URL.to_string(),
            detail_interval: Duration::from_millis(DEFAULT_DETAIL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            page_size: ITEMS_PAGE_SIZE,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        let defaults = SyncConfig::default();
        let sync = &toml_config.sync;

        Self {
            catalog_url: sync.catalog_url.clone().unwrap_or(defaults.catalog_url),
            store_url: sync.store_url.clone().unwrap_or(defaults.store_url),
            player_summary_url: sync
                .player_summary_url
                .clone()
                .unwrap_or(defaults.player_summary_url),
            detail_interval: sync
                .detail_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.detail_interval),
            request_timeout: sync
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            page_size: defaults.page_size,
            bind_address: toml_config
                .bind_address
                .clone()
                .unwrap_or(defaults.bind_address),
        }
    }
}

/// Credentials for the catalog API
#[derive(Clone, PartialEq)]
pub struct SteamCredentials {
    pub api_key: String,
    pub steam_id: String,
}

impl std::fmt::Debug for SteamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteamCredentials")
            .field("api_key", &"<redacted>")
            .field("steam_id", &self.steam_id)
            .finish()
    }
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Pick the first valid value in priority order, warning on ambiguity
fn pick_setting(name: &str, candidates: [(&'static str, Option<String>); 3]) -> Option<String> {
    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, value)| value.as_deref().is_some_and(is_valid_key))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    candidates.into_iter().find_map(|(source, value)| {
        value.filter(|v| is_valid_key(v)).map(|v| {
            info!("{} loaded from {}", name, source);
            v.trim().to_string()
        })
    })
}

/// Resolve Steam credentials from database, environment and TOML
pub async fn resolve_credentials(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<SteamCredentials> {
    let api_key = pick_setting(
        "Steam API key",
        [
            ("database", crate::db::settings::get_steam_api_key(db).await?),
            ("environment", std::env::var(API_KEY_ENV).ok()),
            ("TOML", toml_config.steam_api_key.clone()),
        ],
    );
    let steam_id = pick_setting(
        "Steam ID",
        [
            ("database", crate::db::settings::get_steam_id(db).await?),
            ("environment", std::env::var(STEAM_ID_ENV).ok()),
            ("TOML", toml_config.steam_id.clone()),
        ],
    );

    match (api_key, steam_id) {
        (Some(api_key), Some(steam_id)) => Ok(SteamCredentials { api_key, steam_id }),
        (api_key, _) => {
            let missing = if api_key.is_none() { "Steam API key" } else { "Steam ID" };
            Err(Error::Config(format!(
                "{} not configured. Configure it using one of:\n\
                 1. API: PUT /settings/steam\n\
                 2. Environment: {} / {}\n\
                 3. TOML config: steam_api_key / steam_id",
                missing, API_KEY_ENV, STEAM_ID_ENV
            )))
        }
    }
}

/// Copy credentials into the TOML file as a backup of the database values
///
/// Best effort: a failed write is logged and otherwise ignored.
pub fn sync_credentials_to_toml(credentials: &SteamCredentials, toml_path: &Path) {
    let mut config = TomlConfig::load_or_default(toml_path);
    config.steam_api_key = Some(credentials.api_key.clone());
    config.steam_id = Some(credentials.steam_id.clone());

    match write_toml_config(&config, toml_path) {
        Ok(()) => info!("Credentials synced to TOML: {}", toml_path.display()),
        Err(e) => warn!("TOML write failed (database write succeeded): {}", e),
    }
}

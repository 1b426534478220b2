//! Configuration loading and root folder resolution
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: the caller gets
//! defaults and a warning in the log.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "PLAYLOG_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "playlog.db";

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Sync tuning section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncSection {
    /// Minimum spacing between store detail calls (milliseconds)
    pub detail_interval_ms: Option<u64>,
    /// Per-request timeout for external calls (seconds)
    pub request_timeout_secs: Option<u64>,
    /// Catalog (owned games) endpoint override
    pub catalog_url: Option<String>,
    /// Store detail endpoint override
    pub store_url: Option<String>,
    /// Player summary endpoint override
    pub player_summary_url: Option<String>,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub steam_api_key: Option<String>,
    pub steam_id: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sync: SyncSection,
}

impl TomlConfig {
    /// Load a TOML config, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> TomlConfig {
        if !path.exists() {
            return TomlConfig::default();
        }
        match load_toml_config(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config file, creating the parent directory if needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Default location of the user config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("playlog").join("config.toml"))
}

/// Resolve the root folder (see module docs for priority order)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("playlog"))
        .unwrap_or_else(|| PathBuf::from("./playlog_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn ensure_root_folder(root_folder: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root_folder).map_err(|e| {
        Error::Config(format!(
            "Failed to create root folder {}: {}",
            root_folder.display(),
            e
        ))
    })?;
    Ok(root_folder.join(DATABASE_FILE))
}

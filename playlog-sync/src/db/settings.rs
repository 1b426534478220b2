//! Settings database operations
//!
//! Key/value accessors for the `settings` table.

use playlog_common::{Error, Result};
use sqlx::SqlitePool;

pub const STEAM_API_KEY: &str = "steam_api_key";
pub const STEAM_ID: &str = "steam_id";

pub async fn get_steam_api_key(db: &SqlitePool) -> Result<Option<String>> {
    get_setting(db, STEAM_API_KEY).await
}

pub async fn set_steam_api_key(db: &SqlitePool, key: &str) -> Result<()> {
    set_setting(db, STEAM_API_KEY, key).await
}

pub async fn get_steam_id(db: &SqlitePool) -> Result<Option<String>> {
    get_setting(db, STEAM_ID).await
}

pub async fn set_steam_id(db: &SqlitePool, steam_id: &str) -> Result<()> {
    set_setting(db, STEAM_ID, steam_id).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

//! Steam credential settings
//!
//! PUT /settings/steam writes the database (authoritative) and mirrors the
//! values into the TOML file when one is configured.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AuthenticatedOwner;
use crate::config::{is_valid_key, sync_credentials_to_toml, SteamCredentials};
use crate::db::settings;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetSteamSettingsRequest {
    pub api_key: String,
    pub steam_id: String,
}

/// Stored Steam settings; the key itself is never returned
#[derive(Debug, Serialize)]
pub struct SteamSettingsResponse {
    pub steam_id: Option<String>,
    pub api_key_configured: bool,
}

/// GET /settings/steam
pub async fn get_steam_settings(
    State(state): State<AppState>,
    _owner: AuthenticatedOwner,
) -> ApiResult<Json<SteamSettingsResponse>> {
    let api_key = settings::get_steam_api_key(&state.db).await?;
    Ok(Json(SteamSettingsResponse {
        steam_id: settings::get_steam_id(&state.db).await?,
        api_key_configured: api_key.as_deref().is_some_and(is_valid_key),
    }))
}

/// PUT /settings/steam
pub async fn set_steam_settings(
    State(state): State<AppState>,
    _owner: AuthenticatedOwner,
    Json(payload): Json<SetSteamSettingsRequest>,
) -> ApiResult<Json<SteamSettingsResponse>> {
    if !is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }
    if !is_valid_key(&payload.steam_id) {
        return Err(ApiError::BadRequest(
            "Steam ID cannot be empty or whitespace-only".to_string(),
        ));
    }

    let credentials = SteamCredentials {
        api_key: payload.api_key.trim().to_string(),
        steam_id: payload.steam_id.trim().to_string(),
    };

    settings::set_steam_api_key(&state.db, &credentials.api_key).await?;
    settings::set_steam_id(&state.db, &credentials.steam_id).await?;
    info!(steam_id = %credentials.steam_id, "Steam credentials configured via API");

    if let Some(path) = &state.toml_path {
        sync_credentials_to_toml(&credentials, path);
    }

    Ok(Json(SteamSettingsResponse {
        steam_id: Some(credentials.steam_id),
        api_key_configured: true,
    }))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/settings/steam",
        get(get_steam_settings).put(set_steam_settings),
    )
}

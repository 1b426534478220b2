//! Owned-games catalog client
//!
//! One call per import. Failures are logged and reported as an empty
//! library; the caller cannot tell "no games" from "request failed".

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::models::Attributes;
use crate::services::http_client::{build_http_client, ClientError};

/// Source of the base (owned items) records
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Owned items for `user_id`; empty on any failure
    async fn fetch_owned_items(&self, user_id: &str, api_key: &str) -> Vec<Attributes>;
}

#[derive(Debug, Deserialize)]
struct OwnedGamesEnvelope {
    #[serde(default)]
    response: OwnedGamesResponse,
}

#[derive(Debug, Default, Deserialize)]
struct OwnedGamesResponse {
    #[serde(default)]
    games: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummariesEnvelope {
    #[serde(default)]
    response: PlayerSummariesResponse,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerSummariesResponse {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
    personaname: Option<String>,
}

/// Steam Web API client for `GetOwnedGames`
pub struct SteamCatalogClient {
    http_client: reqwest::Client,
    catalog_url: String,
    player_summary_url: String,
}

impl SteamCatalogClient {
    pub fn new(
        catalog_url: impl Into<String>,
        player_summary_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            catalog_url: catalog_url.into(),
            player_summary_url: player_summary_url.into(),
        })
    }

    async fn request_owned_items(
        &self,
        user_id: &str,
        api_key: &str,
    ) -> Result<Vec<Attributes>, ClientError> {
        if user_id.trim().is_empty() {
            return Err(ClientError::MissingCredentials("user id"));
        }
        if api_key.trim().is_empty() {
            return Err(ClientError::MissingCredentials("api key"));
        }

        let params = [
            ("key", api_key),
            ("steamid", user_id),
            ("include_appinfo", "true"),
            ("include_played_free_games", "true"),
            ("format", "json"),
        ];

        tracing::debug!(user_id = %user_id, "Requesting owned games");

        let response = self
            .http_client
            .get(&self.catalog_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let envelope: OwnedGamesEnvelope = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let total = envelope.response.games.len();
        let records: Vec<Attributes> = envelope
            .response
            .games
            .into_iter()
            .filter_map(|game| match game {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect();

        if records.len() != total {
            tracing::warn!(
                skipped = total - records.len(),
                "Ignoring non-object entries in owned games response"
            );
        }

        Ok(records)
    }

    /// Persona name of `user_id`, used to verify credentials
    ///
    /// Unlike the catalog fetch this reports failures to the caller.
    pub async fn fetch_player_name(
        &self,
        user_id: &str,
        api_key: &str,
    ) -> Result<Option<String>, ClientError> {
        let response = self
            .http_client
            .get(&self.player_summary_url)
            .query(&[("key", api_key), ("steamids", user_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let envelope: PlayerSummariesEnvelope = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        Ok(envelope
            .response
            .players
            .into_iter()
            .next()
            .and_then(|player| player.personaname))
    }
}

#[async_trait]
impl CatalogSource for SteamCatalogClient {
    async fn fetch_owned_items(&self, user_id: &str, api_key: &str) -> Vec<Attributes> {
        match self.request_owned_items(user_id, api_key).await {
            Ok(records) => {
                tracing::info!(user_id = %user_id, count = records.len(), "Fetched owned games");
                records
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to get owned games");
                Vec::new()
            }
        }
    }
}

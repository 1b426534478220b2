//! Store detail client
//!
//! The store endpoint penalizes bursts, so every call first passes through
//! the shared [`RateLimiter`]. Any failure yields an empty mapping.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::models::Attributes;
use crate::services::http_client::{build_http_client, ClientError};
use crate::services::rate_limiter::RateLimiter;

/// Source of per-item extra attributes
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Extra attributes for one item; empty on any failure
    async fn fetch_detail(&self, item_id: &str) -> Attributes;
}

/// Steam store `appdetails` client
pub struct StoreDetailClient {
    http_client: reqwest::Client,
    store_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl StoreDetailClient {
    pub fn new(
        store_url: impl Into<String>,
        rate_limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            store_url: store_url.into(),
            rate_limiter,
        })
    }

    async fn request_detail(&self, item_id: &str) -> Result<Attributes, ClientError> {
        self.rate_limiter.wait().await;

        tracing::debug!(item_id = %item_id, "Requesting store details");

        let response = self
            .http_client
            .get(&self.store_url)
            .query(&[("appids", item_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        // {"<id>": {"success": true, "data": {...}}}
        match body.get(item_id).and_then(|entry| entry.get("data")) {
            Some(Value::Object(data)) => Ok(data.clone()),
            Some(_) => Err(ClientError::Parse("'data' is not an object".to_string())),
            None => Ok(Attributes::new()),
        }
    }
}

#[async_trait]
impl DetailSource for StoreDetailClient {
    async fn fetch_detail(&self, item_id: &str) -> Attributes {
        match self.request_detail(item_id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(item_id = %item_id, error = %e, "Failed to get store details");
                Attributes::new()
            }
        }
    }
}

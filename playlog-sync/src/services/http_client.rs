//! Shared HTTP client construction and error type for the external APIs

use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("playlog/", env!("CARGO_PKG_VERSION"));

/// External API client errors
///
/// These never leave the catalog/detail clients: the pipeline only sees an
/// empty result.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Build a client whose every request carries `timeout`
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::Network(e.to_string()))
}

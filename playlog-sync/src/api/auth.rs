//! Owner identity extraction
//!
//! Authentication happens upstream; the fronting proxy forwards the
//! authenticated owner in [`OWNER_HEADER`]. Requests without it are
//! rejected with 401.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HeaderMap, request::Parts},
};

use crate::error::ApiError;

pub const OWNER_HEADER: &str = "x-playlog-owner";

/// Owner of the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedOwner(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedOwner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_owner(&parts.headers)
    }
}

fn extract_owner(headers: &HeaderMap) -> Result<AuthenticatedOwner, ApiError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(|owner| AuthenticatedOwner(owner.to_string()))
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", OWNER_HEADER)))
}

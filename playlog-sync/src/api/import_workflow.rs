//! Import workflow API handlers
//!
//! POST /import/start, GET /import/status/:job_id, GET /import/latest

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::AuthenticatedOwner;
use crate::error::{ApiError, ApiResult};
use crate::models::JobStatus;
use crate::services::JobStatusReport;
use crate::AppState;

/// POST /import/start response
#[derive(Debug, Serialize)]
pub struct StartImportResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// POST /import/start
///
/// Schedules an import with the configured Steam credentials and returns
/// 202 Accepted immediately.
pub async fn start_import(
    State(state): State<AppState>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
) -> ApiResult<(StatusCode, Json<StartImportResponse>)> {
    let credentials = crate::config::resolve_credentials(&state.db, &state.toml_config)
        .await
        .map_err(|e| match e {
            playlog_common::Error::Config(msg) => ApiError::BadRequest(msg),
            other => ApiError::Common(other),
        })?;

    let job_id = match state
        .jobs
        .submit(&credentials.steam_id, &credentials.api_key, &owner)
        .await
    {
        Ok(job_id) => job_id,
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            return Err(e.into());
        }
    };

    tracing::info!(job_id = %job_id, owner = %owner, "Import requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartImportResponse {
            job_id,
            status: JobStatus::Pending,
        }),
    ))
}

/// GET /import/status/:job_id
///
/// 404 for unknown jobs and for jobs owned by someone else.
pub async fn get_import_status(
    State(state): State<AppState>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusReport>> {
    let report = state.jobs.status(&job_id, &owner).await?;
    tracing::debug!(job_id = %job_id, status = %report.status, "Status query");
    Ok(Json(report))
}

/// GET /import/latest
pub async fn get_latest_import(
    State(state): State<AppState>,
    AuthenticatedOwner(owner): AuthenticatedOwner,
) -> ApiResult<Json<JobStatusReport>> {
    state
        .jobs
        .latest(&owner)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No import jobs".to_string()))
}

pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import/start", post(start_import))
        .route("/import/status/:job_id", get(get_import_status))
        .route("/import/latest", get(get_latest_import))
}

//! Import job tracking
//!
//! A job is created PENDING when an import is submitted and moves exactly
//! once to SUCCESS or FAILED.

use chrono::{DateTime, Utc};
use playlog_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind label stored on catalog import jobs
pub const IMPORT_JOB_KIND: &str = "catalog_import";

/// Prefix of the placeholder id a job carries until the executor assigns one
pub const PROVISIONAL_PREFIX: &str = "provisional-";

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "PENDING" => Ok(JobStatus::Pending),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(Error::Internal(format!("Unknown job status: {}", other))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    /// Only PENDING → SUCCESS and PENDING → FAILED are allowed
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(self, JobStatus::Pending) && next.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted import job
#[derive(Debug, Clone, Serialize)]
pub struct ImportJob {
    /// Row id; the stable reference handed to the background work
    pub record_id: i64,
    /// Public job identifier (provisional until the executor assigns one)
    pub job_id: String,
    pub owner_id: String,
    pub kind: String,
    pub status: JobStatus,
    /// Result payload recorded with the terminal transition
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn is_provisional(&self) -> bool {
        self.job_id.starts_with(PROVISIONAL_PREFIX)
    }
}

/// Counts produced by reconciling one batch
///
/// `created` counts new items only. Records that updated an existing item
/// count toward neither field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub errors: usize,
}

/// Result payload of a successful import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Records returned by the fetch stage
    pub fetched: usize,
    pub created: usize,
    pub errors: usize,
}

//! Database access for playlog-sync
//!
//! The import core talks to storage only through [`ItemRepository`] and
//! [`JobRepository`]. The SQLite implementations live in [`items`] and
//! [`jobs`]; read-only library queries in [`library`] take the pool directly.

pub mod items;
pub mod jobs;
pub mod library;
pub mod settings;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playlog_common::Result;
use serde_json::Value;

use crate::models::{ImportJob, ItemDraft, JobStatus, UpsertOutcome, UsageRecord};

pub use items::SqliteItemRepository;
pub use jobs::SqliteJobRepository;

/// Item and usage-history storage used by reconciliation
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Create the item, or fully replace its derived fields and raw attributes
    async fn upsert_item(&self, draft: &ItemDraft, at: DateTime<Utc>) -> Result<UpsertOutcome>;

    /// Append one immutable usage observation
    async fn append_usage(
        &self,
        item_id: i64,
        usage_minutes: i64,
        at: DateTime<Utc>,
    ) -> Result<UsageRecord>;
}

/// Import job storage used by the job manager
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a PENDING job
    async fn create_pending(
        &self,
        job_id: &str,
        owner_id: &str,
        kind: &str,
        at: DateTime<Utc>,
    ) -> Result<ImportJob>;

    /// Swap the job's public identifier (provisional → durable)
    async fn replace_job_id(&self, record_id: i64, job_id: &str) -> Result<()>;

    /// Move a PENDING job to a terminal status
    ///
    /// Returns false when the job was no longer PENDING; the row is left
    /// untouched in that case.
    async fn transition(
        &self,
        record_id: i64,
        status: JobStatus,
        result: Option<&Value>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn find_for_owner(&self, job_id: &str, owner_id: &str) -> Result<Option<ImportJob>>;

    async fn find_by_record(&self, record_id: i64) -> Result<Option<ImportJob>>;

    async fn latest_for_owner(&self, owner_id: &str) -> Result<Option<ImportJob>>;

    /// Fail every job still PENDING (used at startup)
    async fn fail_stale_pending(&self, result: &Value, at: DateTime<Utc>) -> Result<u64>;
}

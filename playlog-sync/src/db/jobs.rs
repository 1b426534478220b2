//! Import job database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playlog_common::{time, Error, Result};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::db::JobRepository;
use crate::models::{ImportJob, JobStatus};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

const JOB_COLUMNS: &str =
    "id, job_id, owner_id, kind, status, result, created_at, updated_at";

/// SQLite-backed [`JobRepository`]
#[derive(Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create_pending(
        &self,
        job_id: &str,
        owner_id: &str,
        kind: &str,
        at: DateTime<Utc>,
    ) -> Result<ImportJob> {
        let timestamp = time::to_db(&at);

        let record_id = retry_on_lock("create_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query(
                r#"
                INSERT INTO import_jobs (job_id, owner_id, kind, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(job_id)
            .bind(owner_id)
            .bind(kind)
            .bind(JobStatus::Pending.as_str())
            .bind(&timestamp)
            .bind(&timestamp)
            .execute(&self.pool)
            .await?;
            Ok::<_, Error>(result.last_insert_rowid())
        })
        .await?;

        Ok(ImportJob {
            record_id,
            job_id: job_id.to_string(),
            owner_id: owner_id.to_string(),
            kind: kind.to_string(),
            status: JobStatus::Pending,
            result: None,
            created_at: at,
            updated_at: at,
        })
    }

    async fn replace_job_id(&self, record_id: i64, job_id: &str) -> Result<()> {
        let result = retry_on_lock("replace_job_id", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query("UPDATE import_jobs SET job_id = ? WHERE id = ?")
                .bind(job_id)
                .bind(record_id)
                .execute(&self.pool)
                .await?;
            Ok::<_, Error>(result.rows_affected())
        })
        .await?;

        if result == 0 {
            return Err(Error::NotFound(format!("Import job record {}", record_id)));
        }
        Ok(())
    }

    async fn transition(
        &self,
        record_id: i64,
        status: JobStatus,
        result: Option<&Value>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        if !JobStatus::Pending.can_transition_to(status) {
            return Err(Error::InvalidInput(format!(
                "Cannot transition a job to {}",
                status
            )));
        }

        let result_json = result
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::Internal(format!("Failed to serialize job result: {}", e)))?;
        let timestamp = time::to_db(&at);

        let rows = retry_on_lock("transition_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query(
                r#"
                UPDATE import_jobs
                SET status = ?, result = ?, updated_at = ?
                WHERE id = ? AND status = 'PENDING'
                "#,
            )
            .bind(status.as_str())
            .bind(&result_json)
            .bind(&timestamp)
            .bind(record_id)
            .execute(&self.pool)
            .await?;
            Ok::<_, Error>(result.rows_affected())
        })
        .await?;

        if rows == 0 {
            tracing::warn!(
                record_id,
                status = %status,
                "Import job not transitioned: missing or already terminal"
            );
        }
        Ok(rows > 0)
    }

    async fn find_for_owner(&self, job_id: &str, owner_id: &str) -> Result<Option<ImportJob>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM import_jobs WHERE job_id = ? AND owner_id = ?",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| job_from_row(&row)).transpose()
    }

    async fn find_by_record(&self, record_id: i64) -> Result<Option<ImportJob>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM import_jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| job_from_row(&row)).transpose()
    }

    async fn latest_for_owner(&self, owner_id: &str) -> Result<Option<ImportJob>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM import_jobs WHERE owner_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| job_from_row(&row)).transpose()
    }

    async fn fail_stale_pending(&self, result: &Value, at: DateTime<Utc>) -> Result<u64> {
        let result_json = serde_json::to_string(result)
            .map_err(|e| Error::Internal(format!("Failed to serialize job result: {}", e)))?;

        let outcome = sqlx::query(
            r#"
            UPDATE import_jobs
            SET status = 'FAILED', result = ?, updated_at = ?
            WHERE status = 'PENDING'
            "#,
        )
        .bind(result_json)
        .bind(time::to_db(&at))
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected())
    }
}

fn job_from_row(row: &SqliteRow) -> Result<ImportJob> {
    let status: String = row.get("status");
    let result: Option<String> = row.get("result");
    let result = result
        .map(|json| serde_json::from_str::<Value>(&json))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize job result: {}", e)))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(ImportJob {
        record_id: row.get("id"),
        job_id: row.get("job_id"),
        owner_id: row.get("owner_id"),
        kind: row.get("kind"),
        status: JobStatus::parse(&status)?,
        result,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IMPORT_JOB_KIND;
    use serde_json::json;

    async fn repo() -> SqliteJobRepository {
        SqliteJobRepository::new(playlog_common::db::init_memory_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_and_find_scoped_to_owner() {
        let repo = repo().await;
        repo.create_pending("job-1", "alice", IMPORT_JOB_KIND, Utc::now())
            .await
            .unwrap();

        let found = repo.find_for_owner("job-1", "alice").await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Pending);
        assert!(repo.find_for_owner("job-1", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_is_one_way() {
        let repo = repo().await;
        let job = repo
            .create_pending("job-1", "alice", IMPORT_JOB_KIND, Utc::now())
            .await
            .unwrap();

        let payload = json!({"fetched": 1, "created": 1, "errors": 0});
        assert!(repo
            .transition(job.record_id, JobStatus::Success, Some(&payload), Utc::now())
            .await
            .unwrap());
        assert!(!repo
            .transition(job.record_id, JobStatus::Failed, None, Utc::now())
            .await
            .unwrap());

        let stored = repo.find_by_record(job.record_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Success);
        assert_eq!(stored.result, Some(payload));
    }

    #[tokio::test]
    async fn test_transition_back_to_pending_rejected() {
        let repo = repo().await;
        let job = repo
            .create_pending("job-1", "alice", IMPORT_JOB_KIND, Utc::now())
            .await
            .unwrap();
        assert!(repo
            .transition(job.record_id, JobStatus::Pending, None, Utc::now())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_replace_job_id() {
        let repo = repo().await;
        let job = repo
            .create_pending("provisional-x", "alice", IMPORT_JOB_KIND, Utc::now())
            .await
            .unwrap();
        repo.replace_job_id(job.record_id, "durable-1").await.unwrap();

        assert!(repo.find_for_owner("provisional-x", "alice").await.unwrap().is_none());
        assert!(repo.find_for_owner("durable-1", "alice").await.unwrap().is_some());
        assert!(repo.replace_job_id(999, "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_fail_stale_pending_leaves_terminal_jobs() {
        let repo = repo().await;
        let done = repo
            .create_pending("a", "alice", IMPORT_JOB_KIND, Utc::now())
            .await
            .unwrap();
        repo.transition(done.record_id, JobStatus::Success, None, Utc::now())
            .await
            .unwrap();
        let stale = repo
            .create_pending("b", "alice", IMPORT_JOB_KIND, Utc::now())
            .await
            .unwrap();

        let failed = repo
            .fail_stale_pending(&json!({"reason": "restart"}), Utc::now())
            .await
            .unwrap();

        assert_eq!(failed, 1);
        let stale = repo.find_by_record(stale.record_id).await.unwrap().unwrap();
        assert_eq!(stale.status, JobStatus::Failed);
        let done = repo.find_by_record(done.record_id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_latest_for_owner() {
        let repo = repo().await;
        let t0 = Utc::now();
        repo.create_pending("old", "alice", IMPORT_JOB_KIND, t0).await.unwrap();
        repo.create_pending("new", "alice", IMPORT_JOB_KIND, t0 + chrono::Duration::seconds(1))
            .await
            .unwrap();
        repo.create_pending("other", "bob", IMPORT_JOB_KIND, t0 + chrono::Duration::seconds(2))
            .await
            .unwrap();

        let latest = repo.latest_for_owner("alice").await.unwrap().unwrap();
        assert_eq!(latest.job_id, "new");
        assert!(repo.latest_for_owner("carol").await.unwrap().is_none());
    }
}

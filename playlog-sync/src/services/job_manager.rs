//! Import job lifecycle: submit, track, report
//!
//! `submit` inserts the job under a provisional id, hands the import to the
//! executor and then swaps in the executor's durable id. Polls keyed on the
//! provisional id before the swap see a PENDING job with no execution yet.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use playlog_common::{time, Error, Result};

use crate::db::JobRepository;
use crate::models::import_job::PROVISIONAL_PREFIX;
use crate::models::{ImportJob, JobStatus, IMPORT_JOB_KIND};
use crate::services::{FetchMerger, Reconciler};
use crate::tasks::{ExecutionState, ImportTask, TaskExecutor};

/// Status of one job as reported to its owner
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub job_id: String,
    pub status: JobStatus,
    pub kind: String,
    /// Live executor state, only while the job is PENDING
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatusReport {
    fn from_job(job: ImportJob) -> Self {
        let error = job
            .result
            .as_ref()
            .and_then(|result| result.get("error").or_else(|| result.get("reason")))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            job_id: job.job_id,
            status: job.status,
            kind: job.kind,
            execution: None,
            result: job.result,
            error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

pub struct JobManager {
    jobs: Arc<dyn JobRepository>,
    executor: Arc<dyn TaskExecutor>,
    merger: Arc<FetchMerger>,
    reconciler: Arc<Reconciler>,
}

impl JobManager {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        executor: Arc<dyn TaskExecutor>,
        merger: Arc<FetchMerger>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            jobs,
            executor,
            merger,
            reconciler,
        }
    }

    fn import_task(&self, record_id: i64, user_id: &str, api_key: &str) -> ImportTask {
        ImportTask::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.merger),
            Arc::clone(&self.reconciler),
            record_id,
            user_id,
            api_key,
        )
    }

    /// Create a PENDING job and schedule the import; returns the durable id
    pub async fn submit(&self, user_id: &str, api_key: &str, owner_id: &str) -> Result<String> {
        let provisional_id = format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4());
        let job = self
            .jobs
            .create_pending(&provisional_id, owner_id, IMPORT_JOB_KIND, time::now())
            .await?;

        let task = self.import_task(job.record_id, user_id, api_key);
        let execution_id = match self.executor.submit(IMPORT_JOB_KIND, Box::pin(task.run())).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(record_id = job.record_id, error = %e, "Failed to schedule import");
                let payload = json!({ "error": format!("scheduling failed: {}", e) });
                self.jobs
                    .transition(job.record_id, JobStatus::Failed, Some(&payload), time::now())
                    .await?;
                return Err(Error::Internal(format!("Failed to schedule import: {}", e)));
            }
        };

        self.jobs.replace_job_id(job.record_id, &execution_id).await?;

        tracing::info!(
            job_id = %execution_id,
            owner_id = %owner_id,
            "Import job submitted"
        );

        Ok(execution_id)
    }

    /// Create a job and run the import on the calling task
    pub async fn run_to_completion(
        &self,
        user_id: &str,
        api_key: &str,
        owner_id: &str,
    ) -> Result<ImportJob> {
        let job_id = Uuid::new_v4().to_string();
        let job = self
            .jobs
            .create_pending(&job_id, owner_id, IMPORT_JOB_KIND, time::now())
            .await?;

        if let Err(e) = self.import_task(job.record_id, user_id, api_key).run().await {
            tracing::warn!(job_id = %job_id, error = %e, "Inline import failed");
        }

        self.jobs
            .find_by_record(job.record_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Import job {}", job_id)))
    }

    /// Status of `job_id`, visible only to its owner
    pub async fn status(&self, job_id: &str, owner_id: &str) -> Result<JobStatusReport> {
        let job = self
            .jobs
            .find_for_owner(job_id, owner_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Import job not found: {}", job_id)))?;

        self.report(job).await
    }

    /// The owner's most recently created job
    pub async fn latest(&self, owner_id: &str) -> Result<Option<JobStatusReport>> {
        match self.jobs.latest_for_owner(owner_id).await? {
            Some(job) => Ok(Some(self.report(job).await?)),
            None => Ok(None),
        }
    }

    /// Fail jobs left PENDING by a previous process
    pub async fn recover_stale(&self) -> Result<u64> {
        let payload = json!({ "error": "interrupted by service restart" });
        let count = self.jobs.fail_stale_pending(&payload, time::now()).await?;
        if count > 0 {
            tracing::warn!(count, "Marked interrupted import jobs as failed");
        }
        Ok(count)
    }

    async fn report(&self, job: ImportJob) -> Result<JobStatusReport> {
        if job.is_provisional() {
            return Ok(JobStatusReport::from_job(job));
        }
        if job.status.is_terminal() {
            // The stored outcome is final; the live snapshot is no longer needed
            self.executor.forget(&job.job_id).await;
            return Ok(JobStatusReport::from_job(job));
        }

        let Some(snapshot) = self.executor.poll(&job.job_id).await else {
            return Ok(JobStatusReport::from_job(job));
        };

        // A task that died without recording an outcome (panic) leaves the
        // job PENDING; settle it from the executor's view.
        if snapshot.state == ExecutionState::Failed {
            let payload = json!({
                "error": snapshot.error.clone().unwrap_or_else(|| "execution failed".to_string())
            });
            self.jobs
                .transition(job.record_id, JobStatus::Failed, Some(&payload), time::now())
                .await?;
            if let Some(settled) = self.jobs.find_by_record(job.record_id).await? {
                if settled.status.is_terminal() {
                    self.executor.forget(&settled.job_id).await;
                }
                return Ok(JobStatusReport::from_job(settled));
            }
        }

        let mut report = JobStatusReport::from_job(job);
        report.execution = Some(snapshot.state);
        if report.result.is_none() {
            report.result = snapshot.result;
        }
        if report.error.is_none() {
            report.error = snapshot.error;
        }
        Ok(report)
    }
}

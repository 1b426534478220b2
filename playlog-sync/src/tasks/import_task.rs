//! The deferred import unit: fetch, merge, reconcile, record the outcome

use anyhow::Context;
use serde_json::{json, Value};
use std::sync::Arc;

use playlog_common::time;

use crate::db::JobRepository;
use crate::models::{ImportSummary, JobStatus};
use crate::services::{FetchMerger, Reconciler};

/// Result reason stored on jobs whose catalog fetch came back empty
pub const EMPTY_CATALOG_REASON: &str = "no items returned by catalog";

/// One import run bound to a job row
///
/// The job is referenced by row id, so the public id may be swapped while
/// the task is already running.
pub struct ImportTask {
    jobs: Arc<dyn JobRepository>,
    merger: Arc<FetchMerger>,
    reconciler: Arc<Reconciler>,
    record_id: i64,
    user_id: String,
    api_key: String,
}

impl ImportTask {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        merger: Arc<FetchMerger>,
        reconciler: Arc<Reconciler>,
        record_id: i64,
        user_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            merger,
            reconciler,
            record_id,
            user_id: user_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Run to completion, leaving the job SUCCESS or FAILED
    ///
    /// An error is returned after the job has been marked FAILED so the
    /// executor can report it too. An empty catalog is not an error.
    pub async fn run(self) -> anyhow::Result<Value> {
        match self.execute().await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(record_id = self.record_id, error = %e, "Import run failed");

                let payload = json!({ "error": e.to_string() });
                if let Err(mark_error) = self
                    .jobs
                    .transition(self.record_id, JobStatus::Failed, Some(&payload), time::now())
                    .await
                {
                    tracing::error!(
                        record_id = self.record_id,
                        error = %mark_error,
                        "Failed to mark import job as failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(&self) -> anyhow::Result<Value> {
        tracing::info!(record_id = self.record_id, user_id = %self.user_id, "Starting import run");

        let records = self.merger.import(&self.user_id, &self.api_key).await;

        if records.is_empty() {
            let payload = json!({ "reason": EMPTY_CATALOG_REASON });
            self.jobs
                .transition(self.record_id, JobStatus::Failed, Some(&payload), time::now())
                .await
                .context("recording empty catalog failure")?;
            tracing::warn!(record_id = self.record_id, "Import failed: {}", EMPTY_CATALOG_REASON);
            return Ok(payload);
        }

        let outcome = self.reconciler.reconcile(&records).await;
        let summary = ImportSummary {
            fetched: records.len(),
            created: outcome.created,
            errors: outcome.errors,
        };
        let payload = serde_json::to_value(summary)?;

        self.jobs
            .transition(self.record_id, JobStatus::Success, Some(&payload), time::now())
            .await
            .context("recording import success")?;

        tracing::info!(
            record_id = self.record_id,
            fetched = summary.fetched,
            created = summary.created,
            errors = summary.errors,
            "Import run completed"
        );

        Ok(payload)
    }
}

//! Shared fakes and fixtures for playlog-sync integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use playlog_common::{Error, Result};
use playlog_sync::db::{ItemRepository, SqliteItemRepository, SqliteJobRepository};
use playlog_sync::models::{Attributes, ItemDraft, UpsertOutcome, UsageRecord};
use playlog_sync::services::{
    CatalogSource, DetailSource, FetchMerger, JobManager, JobStatusReport, RateLimiter, Reconciler,
};
use playlog_sync::tasks::{ExecutionSnapshot, TaskExecutor, TaskFuture, TokioTaskExecutor};

pub fn record(value: Value) -> Attributes {
    value.as_object().cloned().expect("fixture must be an object")
}

/// Catalog entry with the given id and usage in minutes
pub fn game(appid: u64, minutes: i64) -> Attributes {
    record(json!({
        "appid": appid,
        "name": format!("Game {}", appid),
        "playtime_forever": minutes,
        "img_icon_url": format!("icon{}", appid),
    }))
}

pub async fn test_db() -> SqlitePool {
    playlog_common::db::init_memory_database()
        .await
        .expect("in-memory database")
}

/// Catalog returning a fixed batch and counting calls
#[derive(Default)]
pub struct FakeCatalog {
    pub records: Vec<Attributes>,
    pub calls: Mutex<usize>,
}

impl FakeCatalog {
    pub fn new(records: Vec<Attributes>) -> Self {
        Self {
            records,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_owned_items(&self, _user_id: &str, _api_key: &str) -> Vec<Attributes> {
        *self.calls.lock().unwrap() += 1;
        self.records.clone()
    }
}

/// Catalog that panics, to simulate a task dying without an outcome
pub struct PanickingCatalog;

#[async_trait]
impl CatalogSource for PanickingCatalog {
    async fn fetch_owned_items(&self, _user_id: &str, _api_key: &str) -> Vec<Attributes> {
        panic!("catalog exploded");
    }
}

/// Detail source honoring a shared rate limiter and recording call times
pub struct FakeDetail {
    rate_limiter: Option<Arc<RateLimiter>>,
    pub calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeDetail {
    pub fn new() -> Self {
        Self {
            rate_limiter: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rate_limited(min_interval: Duration) -> Self {
        Self {
            rate_limiter: Some(Arc::new(RateLimiter::new(min_interval))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_ids(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl DetailSource for FakeDetail {
    async fn fetch_detail(&self, item_id: &str) -> Attributes {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((item_id.to_string(), Instant::now()));
        record(json!({
            "short_description": format!("About {}", item_id),
            "header_image": format!("https://example.test/{}.jpg", item_id),
        }))
    }
}

/// Item repository failing the upsert for selected external ids
pub struct FailingItemRepository {
    inner: SqliteItemRepository,
    failing: HashSet<String>,
}

impl FailingItemRepository {
    pub fn new(pool: SqlitePool, failing: &[&str]) -> Self {
        Self {
            inner: SqliteItemRepository::new(pool),
            failing: failing.iter().map(|id| id.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ItemRepository for FailingItemRepository {
    async fn upsert_item(&self, draft: &ItemDraft, at: DateTime<Utc>) -> Result<UpsertOutcome> {
        if self.failing.contains(&draft.external_id) {
            return Err(Error::Internal(format!("injected failure for {}", draft.external_id)));
        }
        self.inner.upsert_item(draft, at).await
    }

    async fn append_usage(
        &self,
        item_id: i64,
        usage_minutes: i64,
        at: DateTime<Utc>,
    ) -> Result<UsageRecord> {
        self.inner.append_usage(item_id, usage_minutes, at).await
    }
}

/// Executor that parks every submit until released
pub struct GatedExecutor {
    inner: TokioTaskExecutor,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedExecutor {
    pub fn new() -> Self {
        Self {
            inner: TokioTaskExecutor::new(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl TaskExecutor for GatedExecutor {
    async fn submit(&self, kind: &str, task: TaskFuture) -> anyhow::Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.submit(kind, task).await
    }

    async fn poll(&self, execution_id: &str) -> Option<ExecutionSnapshot> {
        self.inner.poll(execution_id).await
    }

    async fn forget(&self, execution_id: &str) {
        self.inner.forget(execution_id).await
    }
}

/// Executor that refuses all work
pub struct RejectingExecutor;

#[async_trait]
impl TaskExecutor for RejectingExecutor {
    async fn submit(&self, _kind: &str, _task: TaskFuture) -> anyhow::Result<String> {
        anyhow::bail!("executor unavailable")
    }

    async fn poll(&self, _execution_id: &str) -> Option<ExecutionSnapshot> {
        None
    }

    async fn forget(&self, _execution_id: &str) {}
}

pub fn job_manager(
    pool: &SqlitePool,
    catalog: Arc<dyn CatalogSource>,
    detail: Arc<dyn DetailSource>,
    items: Arc<dyn ItemRepository>,
    executor: Arc<dyn TaskExecutor>,
) -> JobManager {
    JobManager::new(
        Arc::new(SqliteJobRepository::new(pool.clone())),
        executor,
        Arc::new(FetchMerger::new(catalog, detail)),
        Arc::new(Reconciler::new(items)),
    )
}

/// Job manager over a fixed catalog, the SQLite item store and tokio executor
pub fn simple_job_manager(pool: &SqlitePool, records: Vec<Attributes>) -> JobManager {
    job_manager(
        pool,
        Arc::new(FakeCatalog::new(records)),
        Arc::new(FakeDetail::new()),
        Arc::new(SqliteItemRepository::new(pool.clone())),
        Arc::new(TokioTaskExecutor::new()),
    )
}

/// Poll until the job leaves PENDING
pub async fn wait_for_terminal(jobs: &JobManager, job_id: &str, owner: &str) -> JobStatusReport {
    for _ in 0..400 {
        let report = jobs.status(job_id, owner).await.expect("status");
        if report.status.is_terminal() {
            return report;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never finished", job_id);
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count")
}

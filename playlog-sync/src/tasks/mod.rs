//! Background task execution
//!
//! [`TaskExecutor`] is the seam between job tracking and whatever actually
//! runs the work. The service uses [`TokioTaskExecutor`]; tests substitute
//! their own executors to control when work runs.

pub mod import_task;
pub mod tokio_executor;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub use import_task::{ImportTask, EMPTY_CATALOG_REASON};
pub use tokio_executor::TokioTaskExecutor;

/// A deferred unit of work
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

/// Execution state as seen by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl ExecutionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, ExecutionState::Succeeded | ExecutionState::Failed)
    }
}

/// Live view of one execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSnapshot {
    pub state: ExecutionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionSnapshot {
    pub fn queued() -> Self {
        Self {
            state: ExecutionState::Queued,
            result: None,
            error: None,
        }
    }
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Schedule `task` and return its durable execution id without waiting
    async fn submit(&self, kind: &str, task: TaskFuture) -> anyhow::Result<String>;

    /// Current state of an execution, if the executor knows it
    async fn poll(&self, execution_id: &str) -> Option<ExecutionSnapshot>;

    /// Drop whatever the executor still holds for an execution
    ///
    /// Called once the job has a terminal outcome of its own; later polls
    /// for the id return `None`.
    async fn forget(&self, execution_id: &str);
}

//! In-process executor on the tokio runtime
//!
//! Each task runs inside its own spawned task so a panic is observed as a
//! failed execution instead of tearing down the supervisor.
//!
//! Snapshots live until the owner calls `forget`. Past the retention limit
//! ([`MAX_RETAINED_EXECUTIONS`] by default), succeeded snapshots are pruned
//! on submit. Failed ones are kept: a panicked run is only settled from them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ExecutionSnapshot, ExecutionState, TaskExecutor, TaskFuture};

/// Default snapshot count at which succeeded executions are pruned
pub const MAX_RETAINED_EXECUTIONS: usize = 1024;

/// Executor spawning every submitted task on the current runtime
#[derive(Clone)]
pub struct TokioTaskExecutor {
    executions: Arc<RwLock<HashMap<String, ExecutionSnapshot>>>,
    max_retained: usize,
}

impl Default for TokioTaskExecutor {
    fn default() -> Self {
        Self::with_retention(MAX_RETAINED_EXECUTIONS)
    }
}

impl TokioTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(max_retained: usize) -> Self {
        Self {
            executions: Arc::new(RwLock::new(HashMap::new())),
            max_retained,
        }
    }

    async fn register(&self, execution_id: &str) {
        let mut executions = self.executions.write().await;
        if executions.len() >= self.max_retained {
            executions.retain(|_, snapshot| snapshot.state != ExecutionState::Succeeded);
        }
        executions.insert(execution_id.to_string(), ExecutionSnapshot::queued());
    }

    /// Replace a snapshot; a forgotten execution stays forgotten
    async fn update(&self, execution_id: &str, snapshot: ExecutionSnapshot) {
        if let Some(entry) = self.executions.write().await.get_mut(execution_id) {
            *entry = snapshot;
        }
    }

    pub async fn retained(&self) -> usize {
        self.executions.read().await.len()
    }
}

#[async_trait]
impl TaskExecutor for TokioTaskExecutor {
    async fn submit(&self, kind: &str, task: TaskFuture) -> anyhow::Result<String> {
        let execution_id = Uuid::new_v4().to_string();
        self.register(&execution_id).await;

        let executor = self.clone();
        let id = execution_id.clone();
        let kind = kind.to_string();

        tokio::spawn(async move {
            executor
                .update(
                    &id,
                    ExecutionSnapshot {
                        state: ExecutionState::Running,
                        result: None,
                        error: None,
                    },
                )
                .await;
            tracing::info!(execution_id = %id, kind = %kind, "Background task started");

            let snapshot = match tokio::spawn(task).await {
                Ok(Ok(result)) => {
                    tracing::info!(execution_id = %id, kind = %kind, "Background task completed");
                    ExecutionSnapshot {
                        state: ExecutionState::Succeeded,
                        result: Some(result),
                        error: None,
                    }
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        execution_id = %id,
                        kind = %kind,
                        error = %e,
                        "Background task failed"
                    );
                    ExecutionSnapshot {
                        state: ExecutionState::Failed,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
                Err(join_error) => {
                    tracing::error!(
                        execution_id = %id,
                        kind = %kind,
                        error = %join_error,
                        "Background task panicked"
                    );
                    ExecutionSnapshot {
                        state: ExecutionState::Failed,
                        result: None,
                        error: Some(join_error.to_string()),
                    }
                }
            };

            executor.update(&id, snapshot).await;
        });

        Ok(execution_id)
    }

    async fn poll(&self, execution_id: &str) -> Option<ExecutionSnapshot> {
        self.executions.read().await.get(execution_id).cloned()
    }

    async fn forget(&self, execution_id: &str) {
        self.executions.write().await.remove(execution_id);
    }
}

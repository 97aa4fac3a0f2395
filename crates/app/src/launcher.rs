//! Fire-and-forget workflow launcher backed by the execution engine.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use autoflow_domain::id::WorkflowId;

use crate::engine::ExecutionEngine;
use crate::ports::{WorkflowLauncher, WorkflowRepository};

/// Loads a stored workflow and runs it on a spawned task.
///
/// Every run gets its own scope and a child of the launcher's cancellation
/// token. Missing or disabled workflows and run errors are logged, never
/// reported back to the caller.
pub struct EngineLauncher<R> {
    engine: Arc<ExecutionEngine>,
    workflows: Arc<R>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl<R> EngineLauncher<R> {
    #[must_use]
    pub fn new(engine: Arc<ExecutionEngine>, workflows: Arc<R>) -> Self {
        Self {
            engine,
            workflows,
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Cancel in-flight runs and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.drain().await;
    }

    /// Stop accepting runs and wait for the in-flight ones to complete.
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Number of runs still executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}

impl<R> WorkflowLauncher for EngineLauncher<R>
where
    R: WorkflowRepository + Send + Sync + 'static,
{
    fn launch(&self, workflow_id: WorkflowId, variables: Map<String, Value>) {
        if self.tasks.is_closed() {
            tracing::warn!(%workflow_id, "launcher is shutting down, dropping run");
            return;
        }
        let engine = Arc::clone(&self.engine);
        let workflows = Arc::clone(&self.workflows);
        let cancel = self.cancel.child_token();

        self.tasks.spawn(async move {
            let workflow = match workflows.get_by_id(workflow_id).await {
                Ok(Some(workflow)) if workflow.enabled => workflow,
                Ok(Some(_)) => {
                    tracing::info!(%workflow_id, "workflow disabled, skipping run");
                    return;
                }
                Ok(None) => {
                    tracing::warn!(%workflow_id, "workflow not found, skipping run");
                    return;
                }
                Err(err) => {
                    tracing::warn!(%workflow_id, %err, "failed to load workflow");
                    return;
                }
            };
            match engine.run(&workflow, variables, cancel).await {
                Ok(report) if report.is_complete() => {
                    tracing::info!(%workflow_id, run_id = %report.run_id, visits = report.visits.len(), "workflow run completed");
                }
                Ok(report) => {
                    tracing::warn!(
                        %workflow_id,
                        run_id = %report.run_id,
                        failures = report.failures.len(),
                        cancelled = report.cancelled,
                        "workflow run ended early"
                    );
                }
                Err(err) => {
                    tracing::warn!(%workflow_id, %err, "workflow run rejected");
                }
            }
        });
    }
}

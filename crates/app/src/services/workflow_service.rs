//! Workflow service: use-cases for managing and running workflows.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use autoflow_domain::error::{AutoflowError, NotFoundError};
use autoflow_domain::id::WorkflowId;
use autoflow_domain::workflow::Workflow;

use crate::engine::{ExecutionEngine, RunReport};
use crate::ports::WorkflowRepository;

/// Application service for workflow CRUD and manual runs.
pub struct WorkflowService<R> {
    repo: R,
    engine: Arc<ExecutionEngine>,
}

impl<R: WorkflowRepository> WorkflowService<R> {
    /// Create a new service backed by the given repository and engine.
    pub fn new(repo: R, engine: Arc<ExecutionEngine>) -> Self {
        Self { repo, engine }
    }

    /// Store a new workflow once its graph and node configs are valid.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::Validation`] if a graph invariant fails or a
    /// node type has no executor, or a storage error from the repository.
    #[tracing::instrument(skip(self, workflow), fields(workflow_name = %workflow.name))]
    pub async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow, AutoflowError> {
        self.check(&workflow)?;
        self.repo.create(workflow).await
    }

    /// Look up a workflow by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::NotFound`] when no workflow with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, AutoflowError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Workflow",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all workflows.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, AutoflowError> {
        self.repo.get_all().await
    }

    /// Replace an existing workflow.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::NotFound`] when the workflow does not exist,
    /// [`AutoflowError::Validation`] if it is invalid, or a storage error.
    #[tracing::instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub async fn update_workflow(&self, workflow: Workflow) -> Result<Workflow, AutoflowError> {
        self.check(&workflow)?;
        self.get_workflow(workflow.id).await?;
        self.repo.update(workflow).await
    }

    /// Delete a workflow by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_workflow(&self, id: WorkflowId) -> Result<(), AutoflowError> {
        self.repo.delete(id).await
    }

    /// Run a stored workflow now and wait for it.
    ///
    /// Manual runs ignore the `enabled` flag, which only gates background
    /// triggers. Without trigger variables, trigger executors report that
    /// the workflow cannot be started by hand.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::NotFound`] when the workflow does not exist,
    /// [`AutoflowError::Validation`] if a node type is not registered, or a
    /// storage error.
    #[tracing::instrument(skip(self, variables, cancel))]
    pub async fn run_workflow(
        &self,
        id: WorkflowId,
        variables: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<RunReport, AutoflowError> {
        let workflow = self.get_workflow(id).await?;
        self.engine.run(&workflow, variables, cancel).await
    }

    fn check(&self, workflow: &Workflow) -> Result<(), AutoflowError> {
        workflow.validate()?;
        self.engine.registry().validate_workflow(workflow)?;
        Ok(())
    }
}

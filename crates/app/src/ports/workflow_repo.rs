//! Workflow repository port: persistence for workflow graphs.

use std::future::Future;

use autoflow_domain::error::AutoflowError;
use autoflow_domain::id::WorkflowId;
use autoflow_domain::workflow::Workflow;

/// Repository for persisting and querying [`Workflow`]s.
pub trait WorkflowRepository {
    /// Create a new workflow in storage.
    fn create(
        &self,
        workflow: Workflow,
    ) -> impl Future<Output = Result<Workflow, AutoflowError>> + Send;

    /// Get a workflow by its unique identifier.
    fn get_by_id(
        &self,
        id: WorkflowId,
    ) -> impl Future<Output = Result<Option<Workflow>, AutoflowError>> + Send;

    /// Get all workflows.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Workflow>, AutoflowError>> + Send;

    /// Replace an existing workflow.
    fn update(
        &self,
        workflow: Workflow,
    ) -> impl Future<Output = Result<Workflow, AutoflowError>> + Send;

    /// Delete a workflow by its unique identifier.
    fn delete(&self, id: WorkflowId) -> impl Future<Output = Result<(), AutoflowError>> + Send;
}

impl<T: WorkflowRepository + Send + Sync> WorkflowRepository for std::sync::Arc<T> {
    fn create(
        &self,
        workflow: Workflow,
    ) -> impl Future<Output = Result<Workflow, AutoflowError>> + Send {
        (**self).create(workflow)
    }

    fn get_by_id(
        &self,
        id: WorkflowId,
    ) -> impl Future<Output = Result<Option<Workflow>, AutoflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Workflow>, AutoflowError>> + Send {
        (**self).get_all()
    }

    fn update(
        &self,
        workflow: Workflow,
    ) -> impl Future<Output = Result<Workflow, AutoflowError>> + Send {
        (**self).update(workflow)
    }

    fn delete(&self, id: WorkflowId) -> impl Future<Output = Result<(), AutoflowError>> + Send {
        (**self).delete(id)
    }
}

//! Launcher port: fire-and-forget start of a stored workflow.

use serde_json::{Map, Value};

use autoflow_domain::id::WorkflowId;

/// Starts workflow runs without waiting for them.
///
/// The geofence monitor calls this from its sample loop; an implementation
/// must return immediately and must never report a run failure back to the
/// caller.
pub trait WorkflowLauncher: Send + Sync {
    /// Schedule a run of `workflow_id` seeded with `variables`.
    fn launch(&self, workflow_id: WorkflowId, variables: Map<String, Value>);
}

impl<T: WorkflowLauncher + ?Sized> WorkflowLauncher for std::sync::Arc<T> {
    fn launch(&self, workflow_id: WorkflowId, variables: Map<String, Value>) {
        (**self).launch(workflow_id, variables);
    }
}

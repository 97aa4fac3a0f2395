//! Executor port: the uniform contract behind every node type.
//!
//! The engine never knows what a concrete node does. It hands the node's
//! raw config, the run's [`VariableScope`] and a cancellation token to the
//! executor registered for the node's type, and reads back only `success`,
//! the optional `branch` routing flag and the `stop` flag.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use autoflow_domain::error::AutoflowError;
use autoflow_domain::variables::VariableScope;

/// Result of one executor invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// Routes through the `true`/`false` ports instead of `default`
    /// (confirmation-style nodes).
    pub branch: Option<bool>,
    /// Ends the current branch without following any port.
    pub stop: bool,
    /// Extra output fields exposed to downstream nodes.
    pub fields: Map<String, Value>,
}

impl NodeOutcome {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            branch: None,
            stop: false,
            fields: Map::new(),
        }
    }

    /// An expected failure, surfaced to the user through the output variable.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            branch: None,
            stop: false,
            fields: Map::new(),
        }
    }

    /// A failure after which nothing downstream of the node runs.
    #[must_use]
    pub fn stopped(message: impl Into<String>) -> Self {
        Self {
            stop: true,
            ..Self::failed(message)
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_branch(mut self, branch: bool) -> Self {
        self.branch = Some(branch);
        self
    }

    /// `{success, error?, ...fields}` as stored in a node's output variable.
    #[must_use]
    pub fn to_output(&self) -> Value {
        let mut output = self.fields.clone();
        output.insert("success".to_string(), Value::Bool(self.success));
        if let Some(error) = &self.error {
            output.insert("error".to_string(), Value::String(error.clone()));
        }
        Value::Object(output)
    }
}

/// A pluggable node implementation.
///
/// Implementations catch every anticipated failure and return
/// [`NodeOutcome::failed`]. An `Err` or a panic aborts the current branch
/// of the run.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Run the node. Long-running executors should watch `cancel`.
    async fn execute(
        &self,
        config: &Value,
        vars: &mut VariableScope,
        cancel: CancellationToken,
    ) -> Result<NodeOutcome, AutoflowError>;

    /// Check a node config once, when the workflow is loaded.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the config is malformed.
    fn validate(&self, _config: &Value) -> Result<(), String> {
        Ok(())
    }
}

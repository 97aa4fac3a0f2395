//! Executor registry: maps node type tags to their executors.
//!
//! Built once by the composition root and read-only afterwards. Adding a
//! node type means registering one more executor, never touching the engine.

use std::collections::HashMap;
use std::sync::Arc;

use autoflow_domain::error::ValidationError;
use autoflow_domain::workflow::{NodeConfig, NodeType, Workflow};

use crate::ports::NodeExecutor;

/// Read-only map from [`NodeType`] to [`NodeExecutor`].
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    /// Create a builder for constructing an [`ExecutorRegistry`].
    #[must_use]
    pub fn builder() -> ExecutorRegistryBuilder {
        ExecutorRegistryBuilder::default()
    }

    /// Executor registered for `node_type`.
    #[must_use]
    pub fn get(&self, node_type: &NodeType) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(node_type).cloned()
    }

    #[must_use]
    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.executors.contains_key(node_type)
    }

    /// Registered type tags, sorted.
    #[must_use]
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.executors.keys().map(NodeType::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Check that every trigger and action node of `workflow` has an
    /// executor and that the executor accepts the node's config.
    ///
    /// `IF_ELSE` and `LOOP` nodes are handled by the engine and need no
    /// executor.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownNodeType`] or
    /// [`ValidationError::InvalidConfig`] for the first offending node.
    pub fn validate_workflow(&self, workflow: &Workflow) -> Result<(), ValidationError> {
        for node in workflow.nodes() {
            let (NodeConfig::Trigger(config) | NodeConfig::Action(config)) = &node.config else {
                continue;
            };
            let executor = self
                .executors
                .get(&node.node_type)
                .ok_or_else(|| ValidationError::UnknownNodeType(node.node_type.to_string()))?;
            executor
                .validate(config)
                .map_err(|reason| ValidationError::InvalidConfig {
                    node: node.id.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

/// Step-by-step builder for [`ExecutorRegistry`].
#[derive(Default)]
pub struct ExecutorRegistryBuilder {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistryBuilder {
    /// Register `executor` for `node_type`, replacing any previous one.
    #[must_use]
    pub fn register(self, node_type: &str, executor: impl NodeExecutor + 'static) -> Self {
        self.register_shared(node_type, Arc::new(executor))
    }

    /// Register an executor that is also held elsewhere.
    #[must_use]
    pub fn register_shared(mut self, node_type: &str, executor: Arc<dyn NodeExecutor>) -> Self {
        if self
            .executors
            .insert(NodeType::from(node_type), executor)
            .is_some()
        {
            tracing::debug!(node_type, "replacing registered executor");
        }
        self
    }

    #[must_use]
    pub fn build(self) -> ExecutorRegistry {
        ExecutorRegistry {
            executors: self.executors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autoflow_domain::error::AutoflowError;
    use autoflow_domain::variables::VariableScope;
    use autoflow_domain::workflow::{BranchConfig, Condition, Node, Operator, Port, kinds};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    use crate::ports::NodeOutcome;

    struct Noop;

    #[async_trait]
    impl NodeExecutor for Noop {
        async fn execute(
            &self,
            _config: &Value,
            _vars: &mut VariableScope,
            _cancel: CancellationToken,
        ) -> Result<NodeOutcome, AutoflowError> {
            Ok(NodeOutcome::ok())
        }
    }

    struct RequiresTitle;

    #[async_trait]
    impl NodeExecutor for RequiresTitle {
        async fn execute(
            &self,
            _config: &Value,
            _vars: &mut VariableScope,
            _cancel: CancellationToken,
        ) -> Result<NodeOutcome, AutoflowError> {
            Ok(NodeOutcome::ok())
        }

        fn validate(&self, config: &Value) -> Result<(), String> {
            if config.get("title").is_some() {
                Ok(())
            } else {
                Err("title is required".to_string())
            }
        }
    }

    fn registry() -> ExecutorRegistry {
        ExecutorRegistry::builder()
            .register(kinds::MANUAL_TRIGGER, Noop)
            .register(kinds::NOTIFICATION, RequiresTitle)
            .build()
    }

    fn workflow(action_type: &str, config: Value) -> Workflow {
        Workflow::builder()
            .name("wf")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::branch(
                "check",
                BranchConfig::all(vec![Condition::new("1", Operator::Equals, "1")]),
            ))
            .node(Node::action("act", action_type, config))
            .edge("start", "check", Port::Default)
            .edge("check", "act", Port::True)
            .build()
            .unwrap()
    }

    #[test]
    fn should_find_registered_executor() {
        let registry = registry();
        assert!(registry.get(&NodeType::from(kinds::NOTIFICATION)).is_some());
        assert!(registry.get(&NodeType::from(kinds::DELAY)).is_none());
        assert_eq!(
            registry.node_types(),
            vec![kinds::MANUAL_TRIGGER, kinds::NOTIFICATION]
        );
    }

    #[test]
    fn should_accept_workflow_when_every_node_type_is_registered() {
        let wf = workflow(kinds::NOTIFICATION, json!({"title": "hi"}));
        assert!(registry().validate_workflow(&wf).is_ok());
    }

    #[test]
    fn should_reject_workflow_when_node_type_is_unknown() {
        let wf = workflow("SEND_FAX", json!({}));
        assert_eq!(
            registry().validate_workflow(&wf),
            Err(ValidationError::UnknownNodeType("SEND_FAX".to_string()))
        );
    }

    #[test]
    fn should_reject_workflow_when_executor_refuses_config() {
        let wf = workflow(kinds::NOTIFICATION, json!({}));
        assert!(matches!(
            registry().validate_workflow(&wf),
            Err(ValidationError::InvalidConfig { node, .. }) if node == "act"
        ));
    }
}

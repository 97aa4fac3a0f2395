//! Node: a unit of work in a workflow graph.
//!
//! Nodes arrive from the editor as loosely shaped [`NodeDefinition`]s
//! (`{id, type, config, label}`) and are compiled once, at load time, into
//! [`Node`]s carrying a typed [`NodeConfig`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::branch::BranchConfig;
use super::loops::{LoopConfig, LoopKind};
use crate::error::ValidationError;
use crate::id::NodeId;

/// Well-known node type tags.
pub mod kinds {
    pub const IF_ELSE: &str = "IF_ELSE";
    pub const LOOP: &str = "LOOP";

    pub const MANUAL_TRIGGER: &str = "MANUAL_TRIGGER";
    pub const TIME_TRIGGER: &str = "TIME_TRIGGER";
    pub const GEOFENCE_TRIGGER: &str = "GEOFENCE_TRIGGER";
    pub const NOTIFICATION_TRIGGER: &str = "NOTIFICATION_TRIGGER";
    pub const SMS_TRIGGER: &str = "SMS_TRIGGER";
    pub const CALL_TRIGGER: &str = "CALL_TRIGGER";

    pub const SET_VARIABLE: &str = "SET_VARIABLE";
    pub const DELAY: &str = "DELAY";
    pub const LOG: &str = "LOG";
    pub const NOTIFICATION: &str = "NOTIFICATION";

    /// Suffix shared by every trigger type tag.
    pub const TRIGGER_SUFFIX: &str = "_TRIGGER";
}

/// Config key naming the variable that receives a node's output.
pub const OUTPUT_VARIABLE_KEY: &str = "outputVariable";

/// Type tag of a node (`IF_ELSE`, `GEOFENCE_TRIGGER`, `NOTIFICATION`, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeType(String);

impl NodeType {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trigger nodes are the entry points of a workflow.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.0.ends_with(kinds::TRIGGER_SUFFIX)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Typed node configuration, one variant per family of node types.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    /// Entry node; the raw config is handed to the trigger executor.
    Trigger(Value),
    /// `IF_ELSE`: evaluated by the engine itself.
    Branch(BranchConfig),
    /// `LOOP`: iteration is driven by the engine itself.
    Loop(LoopConfig),
    /// Any other node; the raw config is handed to its executor.
    Action(Value),
}

impl NodeConfig {
    /// The raw config handed to executors. Control-flow configs are re-encoded.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Trigger(value) | Self::Action(value) => value.clone(),
            Self::Branch(branch) => serde_json::to_value(branch).unwrap_or(Value::Null),
            Self::Loop(config) => serde_json::to_value(config).unwrap_or(Value::Null),
        }
    }
}

/// Editor wire shape of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub label: String,
}

/// A compiled, validated node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub label: String,
    pub config: NodeConfig,
    /// Variable receiving `{success, error?, ...}` once the node has run.
    pub output_variable: Option<String>,
}

impl Node {
    /// A trigger node with an empty config.
    #[must_use]
    pub fn trigger(id: impl Into<NodeId>, node_type: &str) -> Self {
        Self::plain(id, node_type, NodeConfig::Trigger(Value::Object(Map::new())))
    }

    /// An `IF_ELSE` node.
    #[must_use]
    pub fn branch(id: impl Into<NodeId>, config: BranchConfig) -> Self {
        Self::plain(id, kinds::IF_ELSE, NodeConfig::Branch(config))
    }

    /// A `LOOP` node.
    #[must_use]
    pub fn looping(id: impl Into<NodeId>, config: LoopConfig) -> Self {
        Self::plain(id, kinds::LOOP, NodeConfig::Loop(config))
    }

    /// An action node handled by the executor registered for `node_type`.
    #[must_use]
    pub fn action(id: impl Into<NodeId>, node_type: &str, config: Value) -> Self {
        Self::plain(id, node_type, NodeConfig::Action(config))
    }

    /// Name the variable receiving this node's output.
    #[must_use]
    pub fn with_output_variable(mut self, name: impl Into<String>) -> Self {
        self.output_variable = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn plain(id: impl Into<NodeId>, node_type: &str, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            node_type: NodeType::from(node_type),
            label: String::new(),
            config,
            output_variable: None,
        }
    }

    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.node_type.is_trigger()
    }

    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(self.config, NodeConfig::Loop(_))
    }

    /// Compile an editor definition, parsing control-flow configs.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyNodeId`] for a blank id,
    /// [`ValidationError::InvalidConfig`] when an `IF_ELSE`/`LOOP` config
    /// cannot be parsed and [`ValidationError::UnsupportedWhileLoop`] for
    /// `while` loops.
    pub fn compile(definition: NodeDefinition) -> Result<Self, ValidationError> {
        let NodeDefinition {
            id,
            node_type,
            config,
            label,
        } = definition;

        if id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyNodeId);
        }

        let output_variable = config
            .get(OUTPUT_VARIABLE_KEY)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let invalid = |reason: String| ValidationError::InvalidConfig {
            node: id.to_string(),
            reason,
        };

        let config = match node_type.as_str() {
            kinds::IF_ELSE => {
                let branch: BranchConfig =
                    serde_json::from_value(config).map_err(|err| invalid(err.to_string()))?;
                if branch.conditions.is_empty() {
                    return Err(invalid("at least one condition is required".to_string()));
                }
                NodeConfig::Branch(branch)
            }
            kinds::LOOP => {
                let config: LoopConfig =
                    serde_json::from_value(config).map_err(|err| invalid(err.to_string()))?;
                if matches!(config.kind, LoopKind::While { .. }) {
                    return Err(ValidationError::UnsupportedWhileLoop(id.to_string()));
                }
                NodeConfig::Loop(config)
            }
            _ if node_type.is_trigger() => NodeConfig::Trigger(config),
            _ => NodeConfig::Action(config),
        };

        Ok(Self {
            id,
            node_type,
            label,
            config,
            output_variable,
        })
    }

    /// Back to the editor wire shape.
    #[must_use]
    pub fn to_definition(&self) -> NodeDefinition {
        let mut config = self.config.to_value();
        if let (Some(name), Value::Object(map)) = (&self.output_variable, &mut config) {
            map.insert(OUTPUT_VARIABLE_KEY.to_string(), Value::String(name.clone()));
        }
        NodeDefinition {
            id: self.id.clone(),
            node_type: self.node_type.clone(),
            config,
            label: self.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(node_type: &str, config: Value) -> NodeDefinition {
        NodeDefinition {
            id: NodeId::new("n1"),
            node_type: NodeType::from(node_type),
            config,
            label: "Node".to_string(),
        }
    }

    #[test]
    fn should_classify_trigger_types_by_suffix() {
        assert!(NodeType::from(kinds::GEOFENCE_TRIGGER).is_trigger());
        assert!(!NodeType::from(kinds::NOTIFICATION).is_trigger());
    }

    #[test]
    fn should_compile_branch_config() {
        let node = Node::compile(definition(
            kinds::IF_ELSE,
            json!({"conditions": [{"left": "{{battery}}", "operator": "<", "right": "20"}]}),
        ))
        .unwrap();
        assert!(matches!(node.config, NodeConfig::Branch(_)));
    }

    #[test]
    fn should_reject_branch_without_conditions() {
        let result = Node::compile(definition(kinds::IF_ELSE, json!({"conditions": []})));
        assert!(matches!(result, Err(ValidationError::InvalidConfig { .. })));
    }

    #[test]
    fn should_reject_malformed_loop_config() {
        let result = Node::compile(definition(kinds::LOOP, json!({"loopType": "count"})));
        assert!(matches!(result, Err(ValidationError::InvalidConfig { .. })));
    }

    #[test]
    fn should_reject_while_loop() {
        let result = Node::compile(definition(kinds::LOOP, json!({"loopType": "while"})));
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedWhileLoop(id)) if id == "n1"
        ));
    }

    #[test]
    fn should_reject_blank_node_id() {
        let mut def = definition(kinds::LOG, json!({}));
        def.id = NodeId::new("  ");
        assert!(matches!(
            Node::compile(def),
            Err(ValidationError::EmptyNodeId)
        ));
    }

    #[test]
    fn should_extract_output_variable_from_config() {
        let node = Node::compile(definition(
            kinds::NOTIFICATION,
            json!({"title": "hi", "outputVariable": "notify_result"}),
        ))
        .unwrap();
        assert_eq!(node.output_variable.as_deref(), Some("notify_result"));
        assert!(matches!(node.config, NodeConfig::Action(_)));
    }

    #[test]
    fn should_keep_output_variable_when_converting_back_to_definition() {
        let node = Node::looping("loop", LoopConfig::count(2)).with_output_variable("out");
        let def = node.to_definition();
        assert_eq!(def.config["outputVariable"], json!("out"));
        assert_eq!(def.config["loopType"], json!("count"));
        let again = Node::compile(def).unwrap();
        assert_eq!(again, node);
    }
}

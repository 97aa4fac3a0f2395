//! Workflow: a graph of nodes connected by port-labelled edges.
//!
//! A workflow has at least one entry node (a trigger with no incoming
//! edge). There is no global node ordering: execution order follows the
//! edges. Cycles are only legal when a loop body returns to its `LOOP` node.

mod branch;
mod edge;
mod loops;
mod node;

pub use branch::{BranchConfig, Condition, LogicOperator, Operator};
pub use edge::{Edge, Port};
pub use loops::{LoopConfig, LoopKind};
pub use node::{Node, NodeConfig, NodeDefinition, NodeType, OUTPUT_VARIABLE_KEY, kinds};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AutoflowError, ValidationError};
use crate::id::{NodeId, WorkflowId};

/// Editor wire shape of a whole workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub id: WorkflowId,
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

fn enabled_by_default() -> bool {
    true
}

/// A compiled, validated workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WorkflowDefinition", into = "WorkflowDefinition")]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub enabled: bool,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
}

impl Workflow {
    /// Create a builder for constructing a [`Workflow`].
    #[must_use]
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    /// Compile and validate an editor definition.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found in the nodes, edges or
    /// overall graph shape.
    pub fn from_definition(definition: WorkflowDefinition) -> Result<Self, ValidationError> {
        let mut workflow = Self {
            id: definition.id,
            name: definition.name,
            enabled: definition.enabled,
            nodes: Vec::with_capacity(definition.nodes.len()),
            edges: Vec::with_capacity(definition.edges.len()),
            index: HashMap::new(),
        };
        for node in definition.nodes {
            workflow.add_node(Node::compile(node)?)?;
        }
        for edge in definition.edges {
            workflow.add_edge(edge)?;
        }
        workflow.check()?;
        Ok(workflow)
    }

    /// Back to the editor wire shape.
    #[must_use]
    pub fn to_definition(&self) -> WorkflowDefinition {
        WorkflowDefinition {
            id: self.id,
            name: self.name.clone(),
            enabled: self.enabled,
            nodes: self.nodes.iter().map(Node::to_definition).collect(),
            edges: self.edges.clone(),
        }
    }

    /// Nodes in the order they were added.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in the order they were added.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Add a node.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateNode`] when the id is taken.
    pub fn add_node(&mut self, node: Node) -> Result<(), ValidationError> {
        if self.index.contains_key(&node.id) {
            return Err(ValidationError::DuplicateNode(node.id.to_string()));
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Add an edge; adding an existing `(source, target, port)` connection
    /// again is a no-op.
    ///
    /// Returns `true` when the edge was inserted.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DanglingEdge`] when an endpoint does not exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool, ValidationError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.index.contains_key(endpoint) {
                return Err(ValidationError::DanglingEdge {
                    edge: edge.id.to_string(),
                    node: endpoint.to_string(),
                });
            }
        }
        if self.edges.iter().any(|e| e.same_connection(&edge)) {
            return Ok(false);
        }
        self.edges.push(edge);
        Ok(true)
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let position = self.index.remove(id)?;
        let node = self.nodes.remove(position);
        self.edges.retain(|e| &e.source != id && &e.target != id);
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Some(node)
    }

    /// Trigger nodes without incoming edges, in node order.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.is_trigger() && !self.edges.iter().any(|e| e.target == n.id))
            .collect()
    }

    /// Targets reachable from `source` through `port`, in edge order.
    pub fn targets<'a>(&'a self, source: &'a NodeId, port: Port) -> impl Iterator<Item = &'a NodeId> {
        self.edges
            .iter()
            .filter(move |e| &e.source == source && e.port == port)
            .map(|e| &e.target)
    }

    /// Whether `source` has at least one outgoing edge on `port`.
    #[must_use]
    pub fn has_port(&self, source: &NodeId, port: Port) -> bool {
        self.targets(source, port).next().is_some()
    }

    /// Check graph-level invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - there is no entry trigger ([`ValidationError::NoEntryNode`])
    /// - a cycle is not a loop body returning to its loop ([`ValidationError::CycleOutsideLoop`])
    pub fn validate(&self) -> Result<(), AutoflowError> {
        self.check().map_err(AutoflowError::from)
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.entry_nodes().is_empty() {
            return Err(ValidationError::NoEntryNode);
        }
        self.check_cycles()
    }

    /// Depth-first search for cycles with every loop node's `loop` port cut.
    ///
    /// A body may re-enter its own loop, but a path through `done` that
    /// leads back to the loop is a real cycle.
    fn check_cycles(&self) -> Result<(), ValidationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            let source = self.index[&edge.source];
            if edge.port == Port::Loop && self.nodes[source].is_loop() {
                continue;
            }
            adjacency[source].push(self.index[&edge.target]);
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::InProgress;
            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if let Some(&target) = adjacency[node].get(frame.1) {
                    frame.1 += 1;
                    match marks[target] {
                        Mark::InProgress => {
                            return Err(ValidationError::CycleOutsideLoop(
                                self.nodes[target].id.to_string(),
                            ));
                        }
                        Mark::Unvisited => {
                            marks[target] = Mark::InProgress;
                            stack.push((target, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<WorkflowDefinition> for Workflow {
    type Error = ValidationError;

    fn try_from(definition: WorkflowDefinition) -> Result<Self, Self::Error> {
        Self::from_definition(definition)
    }
}

impl From<Workflow> for WorkflowDefinition {
    fn from(workflow: Workflow) -> Self {
        workflow.to_definition()
    }
}

/// Step-by-step builder for [`Workflow`].
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    id: Option<WorkflowId>,
    name: Option<String>,
    enabled: Option<bool>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl WorkflowBuilder {
    #[must_use]
    pub fn id(mut self, id: WorkflowId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use]
    pub fn edge(mut self, source: &str, target: &str, port: Port) -> Self {
        self.edges.push(Edge::new(source, target, port));
        self
    }

    /// Consume the builder, validate, and return a [`Workflow`].
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::Validation`] if a node or edge is invalid
    /// or the graph violates an invariant.
    pub fn build(self) -> Result<Workflow, AutoflowError> {
        let mut workflow = Workflow {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
        };
        for node in self.nodes {
            workflow.add_node(node)?;
        }
        for edge in self.edges {
            workflow.add_edge(edge)?;
        }
        workflow.validate()?;
        Ok(workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linear() -> Workflow {
        Workflow::builder()
            .name("Linear")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::action("log", kinds::LOG, json!({"message": "hi"})))
            .edge("start", "log", Port::Default)
            .build()
            .unwrap()
    }

    #[test]
    fn should_ignore_duplicate_edge_when_added_twice() {
        let mut workflow = linear();
        let inserted = workflow
            .add_edge(Edge::new("start", "log", Port::Default))
            .unwrap();
        assert!(!inserted);
        let count = workflow
            .edges()
            .iter()
            .filter(|e| e.source.as_str() == "start" && e.target.as_str() == "log")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn should_keep_edges_on_different_ports_between_same_nodes() {
        let mut workflow = linear();
        assert!(
            workflow
                .add_edge(Edge::new("start", "log", Port::Error))
                .unwrap()
        );
        assert_eq!(workflow.edges().len(), 2);
    }

    #[test]
    fn should_reject_edge_with_missing_endpoint() {
        let mut workflow = linear();
        let result = workflow.add_edge(Edge::new("start", "ghost", Port::Default));
        assert!(matches!(
            result,
            Err(ValidationError::DanglingEdge { node, .. }) if node == "ghost"
        ));
    }

    #[test]
    fn should_reject_duplicate_node_id() {
        let result = Workflow::builder()
            .name("Dup")
            .node(Node::trigger("a", kinds::MANUAL_TRIGGER))
            .node(Node::trigger("a", kinds::MANUAL_TRIGGER))
            .build();
        assert!(matches!(
            result,
            Err(AutoflowError::Validation(ValidationError::DuplicateNode(_)))
        ));
    }

    #[test]
    fn should_require_an_entry_trigger() {
        let result = Workflow::builder()
            .name("No trigger")
            .node(Node::action("log", kinds::LOG, json!({})))
            .build();
        assert!(matches!(
            result,
            Err(AutoflowError::Validation(ValidationError::NoEntryNode))
        ));
    }

    #[test]
    fn should_require_a_name() {
        let result = Workflow::builder()
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .build();
        assert!(matches!(
            result,
            Err(AutoflowError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_reject_cycle_that_avoids_loop_nodes() {
        let result = Workflow::builder()
            .name("Cycle")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::action("a", kinds::LOG, json!({})))
            .node(Node::action("b", kinds::LOG, json!({})))
            .edge("start", "a", Port::Default)
            .edge("a", "b", Port::Default)
            .edge("b", "a", Port::Default)
            .build();
        assert!(matches!(
            result,
            Err(AutoflowError::Validation(ValidationError::CycleOutsideLoop(_)))
        ));
    }

    #[test]
    fn should_allow_cycle_through_loop_node() {
        let result = Workflow::builder()
            .name("Loop back")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::looping("loop", LoopConfig::count(3)))
            .node(Node::action("body", kinds::LOG, json!({})))
            .edge("start", "loop", Port::Default)
            .edge("loop", "body", Port::Loop)
            .edge("body", "loop", Port::Default)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn should_allow_nested_loop_bodies_to_reenter_their_loops() {
        let result = Workflow::builder()
            .name("Nested")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::looping("outer", LoopConfig::count(2)))
            .node(Node::looping("inner", LoopConfig::count(2)))
            .node(Node::action("body", kinds::LOG, json!({})))
            .edge("start", "outer", Port::Default)
            .edge("outer", "inner", Port::Loop)
            .edge("inner", "body", Port::Loop)
            .edge("body", "inner", Port::Default)
            .edge("inner", "outer", Port::Done)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn should_reject_cycle_through_loop_done_port() {
        let result = Workflow::builder()
            .name("Done cycle")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::looping("loop", LoopConfig::count(1)))
            .node(Node::action("after", kinds::LOG, json!({})))
            .edge("start", "loop", Port::Default)
            .edge("loop", "after", Port::Done)
            .edge("after", "loop", Port::Default)
            .build();
        assert!(matches!(
            result,
            Err(AutoflowError::Validation(ValidationError::CycleOutsideLoop(_)))
        ));
    }

    #[test]
    fn should_list_targets_in_edge_order() {
        let workflow = Workflow::builder()
            .name("Fan out")
            .node(Node::trigger("start", kinds::MANUAL_TRIGGER))
            .node(Node::action("b", kinds::LOG, json!({})))
            .node(Node::action("a", kinds::LOG, json!({})))
            .edge("start", "b", Port::Default)
            .edge("start", "a", Port::Default)
            .build()
            .unwrap();
        let start = NodeId::new("start");
        let targets: Vec<_> = workflow
            .targets(&start, Port::Default)
            .map(NodeId::as_str)
            .collect();
        assert_eq!(targets, vec!["b", "a"]);
        assert!(!workflow.has_port(&start, Port::True));
    }

    #[test]
    fn should_remove_node_and_its_edges() {
        let mut workflow = linear();
        let removed = workflow.remove_node(&NodeId::new("log"));
        assert!(removed.is_some());
        assert!(workflow.edges().is_empty());
        assert!(workflow.node(&NodeId::new("start")).is_some());
    }

    #[test]
    fn should_deserialize_editor_wire_shape() {
        let json = json!({
            "name": "Low battery",
            "nodes": [
                {"id": "t", "type": "TIME_TRIGGER", "config": {"schedule": "0 8 * * *"}, "label": "Every morning"},
                {"id": "if", "type": "IF_ELSE", "config": {
                    "conditions": [{"left": "{{battery}}", "operator": "<", "right": 20}],
                    "logic": "AND"
                }},
                {"id": "n", "type": "NOTIFICATION", "config": {"message": "low battery"}}
            ],
            "edges": [
                {"id": "e1", "sourceNodeId": "t", "targetNodeId": "if", "sourcePort": "default"},
                {"id": "e2", "sourceNodeId": "if", "targetNodeId": "n", "sourcePort": "true"}
            ]
        });
        let workflow: Workflow = serde_json::from_value(json).unwrap();
        assert_eq!(workflow.nodes().len(), 3);
        assert_eq!(workflow.entry_nodes()[0].id.as_str(), "t");
        assert!(workflow.enabled);
    }

    #[test]
    fn should_fail_deserialization_when_graph_is_invalid() {
        let json = json!({
            "name": "Broken",
            "nodes": [{"id": "t", "type": "MANUAL_TRIGGER"}],
            "edges": [{"id": "e1", "sourceNodeId": "t", "targetNodeId": "x"}]
        });
        assert!(serde_json::from_value::<Workflow>(json).is_err());
    }

    #[test]
    fn should_roundtrip_through_wire_shape() {
        let workflow = linear();
        let json = serde_json::to_value(&workflow).unwrap();
        let parsed: Workflow = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.id, workflow.id);
        assert_eq!(parsed.nodes(), workflow.nodes());
        assert_eq!(parsed.edges(), workflow.edges());
    }
}

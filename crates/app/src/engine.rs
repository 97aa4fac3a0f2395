//! Execution engine: walks a workflow graph and invokes executors.
//!
//! Traversal is depth-first and strictly sequential: every node is awaited
//! before the next one starts, and the targets of a port run in edge order.
//! Pending work lives on an explicit stack instead of the call stack, and
//! each active `LOOP` node owns an iteration frame so its body subgraph can
//! be re-entered once per iteration, nested loops included.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use autoflow_domain::error::{AutoflowError, ValidationError};
use autoflow_domain::id::{NodeId, RunId, WorkflowId};
use autoflow_domain::variables::VariableScope;
use autoflow_domain::workflow::{LoopConfig, LoopKind, Node, NodeConfig, Port, Workflow};

use crate::ports::NodeOutcome;
use crate::registry::ExecutorRegistry;

/// Node visits allowed per run unless configured otherwise.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// One node execution recorded in a [`RunReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeVisit {
    pub node_id: NodeId,
    /// Port followed afterwards; `None` when the branch was aborted.
    pub port: Option<Port>,
    pub success: bool,
}

/// A branch that stopped because its executor returned an error.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchFailure {
    pub node_id: NodeId,
    pub message: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    pub visits: Vec<NodeVisit>,
    pub failures: Vec<BranchFailure>,
    pub cancelled: bool,
    pub step_limit_reached: bool,
    /// Scope as it was when the run ended.
    pub variables: VariableScope,
}

impl RunReport {
    fn new(workflow_id: WorkflowId) -> Self {
        Self {
            run_id: RunId::new(),
            workflow_id,
            visits: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
            step_limit_reached: false,
            variables: VariableScope::new(),
        }
    }

    /// How many times `node_id` was executed.
    #[must_use]
    pub fn visit_count(&self, node_id: &str) -> usize {
        self.visits
            .iter()
            .filter(|v| v.node_id.as_str() == node_id)
            .count()
    }

    /// Node ids in execution order.
    #[must_use]
    pub fn trace(&self) -> Vec<&str> {
        self.visits.iter().map(|v| v.node_id.as_str()).collect()
    }

    /// Every branch ran to completion without an executor error.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled && !self.step_limit_reached
    }
}

enum Next {
    Follow(Port),
    EnterLoop,
    Stop,
}

enum Step {
    Visit(NodeId),
    /// Start the next iteration of a loop, or leave through `done`.
    LoopNext(NodeId),
}

struct LoopFrame {
    node_id: NodeId,
    index_variable: String,
    item_variable: Option<String>,
    total: usize,
    items: Vec<Value>,
    next: usize,
}

impl LoopFrame {
    fn open(node_id: NodeId, config: &LoopConfig, vars: &VariableScope) -> Self {
        let (total, items, item_variable) = match &config.kind {
            LoopKind::Count { count } => (*count as usize, Vec::new(), None),
            LoopKind::ForEach { item_variable, .. } => {
                let items = config.resolve_items(vars).unwrap_or_default();
                (items.len(), items, Some(item_variable.clone()))
            }
            // rejected when the workflow is compiled
            LoopKind::While { .. } => (0, Vec::new(), None),
        };
        Self {
            node_id,
            index_variable: config.index_variable.clone(),
            item_variable,
            total,
            items,
            next: 0,
        }
    }

    /// Expose the next iteration's variables; `false` once exhausted.
    fn advance(&mut self, vars: &mut VariableScope) -> bool {
        if self.next >= self.total {
            return false;
        }
        vars.set(self.index_variable.clone(), self.next);
        if let (Some(name), Some(item)) = (&self.item_variable, self.items.get(self.next)) {
            vars.set(name.clone(), item.clone());
        }
        self.next += 1;
        true
    }
}

/// Runs workflows against an [`ExecutorRegistry`].
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    registry: Arc<ExecutorRegistry>,
    max_steps: usize,
}

impl ExecutionEngine {
    #[must_use]
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Bound the number of node visits of a single run.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Run `workflow` from its entry nodes with a fresh scope seeded with
    /// `trigger_variables`.
    ///
    /// Executor failures never fail the run: they are recorded in the
    /// returned [`RunReport`] and only stop the branch they occurred on.
    /// Cancelling `cancel` stops scheduling further nodes.
    ///
    /// # Errors
    ///
    /// Returns [`AutoflowError::Validation`] when a node type has no
    /// registered executor or its config is rejected by the executor.
    #[tracing::instrument(skip_all, fields(workflow_id = %workflow.id, workflow = %workflow.name))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        trigger_variables: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<RunReport, AutoflowError> {
        self.registry.validate_workflow(workflow)?;

        let mut vars = VariableScope::from(trigger_variables);
        let mut report = RunReport::new(workflow.id);
        let mut frames: Vec<LoopFrame> = Vec::new();
        let mut stack: Vec<Step> = workflow
            .entry_nodes()
            .into_iter()
            .rev()
            .map(|node| Step::Visit(node.id.clone()))
            .collect();
        let mut steps = 0usize;

        tracing::debug!(run_id = %report.run_id, "starting run");

        while let Some(step) = stack.pop() {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %report.run_id, "run cancelled");
                report.cancelled = true;
                break;
            }
            match step {
                Step::Visit(node_id) => {
                    let Some(node) = workflow.node(&node_id) else {
                        continue;
                    };
                    steps += 1;
                    if steps > self.max_steps {
                        tracing::warn!(
                            run_id = %report.run_id,
                            max_steps = self.max_steps,
                            "step limit reached, stopping run"
                        );
                        report.step_limit_reached = true;
                        report.failures.push(BranchFailure {
                            node_id,
                            message: format!("step limit of {} reached", self.max_steps),
                        });
                        break;
                    }
                    match self
                        .visit(workflow, node, &mut vars, &mut frames, &mut report, &cancel)
                        .await
                    {
                        Next::Follow(port) => push_targets(&mut stack, workflow, &node.id, port),
                        Next::EnterLoop => stack.push(Step::LoopNext(node.id.clone())),
                        Next::Stop => {}
                    }
                }
                Step::LoopNext(loop_id) => {
                    let Some(position) = frames.iter().rposition(|f| f.node_id == loop_id) else {
                        continue;
                    };
                    if frames[position].advance(&mut vars) {
                        stack.push(Step::LoopNext(loop_id.clone()));
                        push_targets(&mut stack, workflow, &loop_id, Port::Loop);
                    } else {
                        frames.truncate(position);
                        tracing::debug!(node_id = %loop_id, "loop exhausted");
                        push_targets(&mut stack, workflow, &loop_id, Port::Done);
                    }
                }
            }
        }

        tracing::debug!(
            run_id = %report.run_id,
            visits = report.visits.len(),
            failures = report.failures.len(),
            "run finished"
        );
        report.variables = vars;
        Ok(report)
    }

    /// Execute one node and decide where traversal goes next.
    async fn visit(
        &self,
        workflow: &Workflow,
        node: &Node,
        vars: &mut VariableScope,
        frames: &mut Vec<LoopFrame>,
        report: &mut RunReport,
        cancel: &CancellationToken,
    ) -> Next {
        let (port, success) = match &node.config {
            NodeConfig::Branch(branch) => {
                let result = branch.evaluate(vars);
                store_output(
                    vars,
                    node,
                    &NodeOutcome::ok().with_field("result", result),
                );
                (Some(Port::from_bool(result)), true)
            }
            NodeConfig::Loop(config) => {
                if frames.iter().any(|f| f.node_id == node.id) {
                    // body edge leading back to its own loop
                    return Next::Stop;
                }
                frames.push(LoopFrame::open(node.id.clone(), config, vars));
                report.visits.push(NodeVisit {
                    node_id: node.id.clone(),
                    port: Some(Port::Loop),
                    success: true,
                });
                return Next::EnterLoop;
            }
            NodeConfig::Trigger(config) | NodeConfig::Action(config) => {
                match self.execute(node, config, vars, cancel).await {
                    Ok(outcome) => {
                        store_output(vars, node, &outcome);
                        (route(workflow, node, &outcome), outcome.success)
                    }
                    Err(err) => {
                        tracing::warn!(node_id = %node.id, %err, "executor failed, aborting branch");
                        report.failures.push(BranchFailure {
                            node_id: node.id.clone(),
                            message: err.to_string(),
                        });
                        (None, false)
                    }
                }
            }
        };
        tracing::debug!(node_id = %node.id, node_type = %node.node_type, ?port, success, "node executed");
        report.visits.push(NodeVisit {
            node_id: node.id.clone(),
            port,
            success,
        });
        port.map_or(Next::Stop, Next::Follow)
    }

    async fn execute(
        &self,
        node: &Node,
        config: &Value,
        vars: &mut VariableScope,
        cancel: &CancellationToken,
    ) -> Result<NodeOutcome, AutoflowError> {
        let executor = self
            .registry
            .get(&node.node_type)
            .ok_or_else(|| ValidationError::UnknownNodeType(node.node_type.to_string()))?;
        AssertUnwindSafe(executor.execute(config, vars, cancel.child_token()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(AutoflowError::Panicked(panic_message(&*payload))))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Port chosen from an executor outcome, `None` when the branch ends here.
///
/// A stop flag ends the branch and a routing flag wins over everything
/// else. An expected failure takes the `error` port only when the node
/// has one; everything else continues on `default`.
fn route(workflow: &Workflow, node: &Node, outcome: &NodeOutcome) -> Option<Port> {
    if outcome.stop {
        return None;
    }
    if let Some(branch) = outcome.branch {
        return Some(Port::from_bool(branch));
    }
    if !outcome.success && workflow.has_port(&node.id, Port::Error) {
        return Some(Port::Error);
    }
    Some(Port::Default)
}

fn store_output(vars: &mut VariableScope, node: &Node, outcome: &NodeOutcome) {
    if let Some(name) = &node.output_variable {
        vars.set(name.clone(), outcome.to_output());
    }
}

/// Schedule the targets of `port` so they pop in edge order.
fn push_targets(stack: &mut Vec<Step>, workflow: &Workflow, source: &NodeId, port: Port) {
    let targets: Vec<NodeId> = workflow.targets(source, port).cloned().collect();
    stack.extend(targets.into_iter().rev().map(Step::Visit));
}

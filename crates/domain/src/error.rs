//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AutoflowError`] via `#[from]`.

/// Top-level error shared by every crate of the workspace.
#[derive(Debug, thiserror::Error)]
pub enum AutoflowError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("operation timed out")]
    Timeout,

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("executor panicked: {0}")]
    Panicked(String),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("node id must not be empty")]
    EmptyNodeId,

    #[error("duplicate node id {0}")]
    DuplicateNode(String),

    #[error("edge {edge} references missing node {node}")]
    DanglingEdge { edge: String, node: String },

    #[error("workflow has no entry trigger node")]
    NoEntryNode,

    #[error("no executor registered for node type {0}")]
    UnknownNodeType(String),

    #[error("invalid config for node {node}: {reason}")]
    InvalidConfig { node: String, reason: String },

    #[error("while loops are not supported (node {0})")]
    UnsupportedWhileLoop(String),

    #[error("cycle through node {0} is not a loop body returning to its loop")]
    CycleOutsideLoop(String),

    #[error("latitude {0} is out of range")]
    InvalidLatitude(f64),

    #[error("longitude {0} is out of range")]
    InvalidLongitude(f64),

    #[error("radius {0} must be a positive number of meters")]
    InvalidRadius(f64),
}

/// A referenced resource does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

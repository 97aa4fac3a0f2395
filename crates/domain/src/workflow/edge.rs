//! Edge: a directed connection from one node's output port to another node.

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, NodeId};

/// Named outgoing connection point of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    /// Taken by ordinary nodes after execution.
    #[default]
    Default,
    /// Taken by branch nodes (and confirmation-style nodes) when the result is `true`.
    True,
    /// Taken by branch nodes (and confirmation-style nodes) when the result is `false`.
    False,
    /// Loop body, entered once per iteration.
    #[serde(alias = "body")]
    Loop,
    /// Taken once by a loop node after its last iteration.
    Done,
    /// Dedicated failure port, taken when an executor reports `success: false`.
    #[serde(alias = "failure")]
    Error,
}

impl Port {
    /// Port selected by a boolean routing result.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::True => "true",
            Self::False => "false",
            Self::Loop => "loop",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

/// A directed connection `source --port--> target`.
///
/// Two edges are considered the same connection when they share the
/// `(source, target, port)` triple, whatever their ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    #[serde(rename = "sourceNodeId")]
    pub source: NodeId,
    #[serde(rename = "targetNodeId")]
    pub target: NodeId,
    #[serde(rename = "sourcePort", default)]
    pub port: Port,
}

impl Edge {
    /// Create an edge with an id derived from its endpoints.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, port: Port) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: EdgeId::new(format!("{source}:{port}->{target}")),
            source,
            target,
            port,
        }
    }

    /// Whether both edges describe the same `(source, target, port)` connection.
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        self.source == other.source && self.target == other.target && self.port == other.port
    }
}

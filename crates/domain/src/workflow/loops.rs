//! Loop configuration: the iteration kinds carried by `LOOP` nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::variables::VariableScope;

fn default_index_variable() -> String {
    "index".to_string()
}

fn default_item_variable() -> String {
    "item".to_string()
}

/// What a loop iterates over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loopType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LoopKind {
    /// Run the body a fixed number of times.
    Count { count: u32 },
    /// Run the body once per element of a resolved list.
    ForEach {
        /// Template resolving to a list, e.g. `{{contacts}}`.
        list: String,
        #[serde(default = "default_item_variable")]
        item_variable: String,
    },
    /// Accepted by the parser so it can be rejected with a clear error.
    While {
        #[serde(default)]
        condition: Value,
    },
}

/// Config carried by a `LOOP` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    #[serde(flatten)]
    pub kind: LoopKind,
    #[serde(default = "default_index_variable")]
    pub index_variable: String,
}

impl LoopConfig {
    #[must_use]
    pub fn count(count: u32) -> Self {
        Self {
            kind: LoopKind::Count { count },
            index_variable: default_index_variable(),
        }
    }

    #[must_use]
    pub fn for_each(list: impl Into<String>) -> Self {
        Self {
            kind: LoopKind::ForEach {
                list: list.into(),
                item_variable: default_item_variable(),
            },
            index_variable: default_index_variable(),
        }
    }

    /// Items a `forEach` loop will visit, resolved against `vars`.
    ///
    /// A list-valued reference is used as is, a string holding a JSON array
    /// is decoded, anything else yields no iterations. `None` for `count`
    /// and `while` loops.
    #[must_use]
    pub fn resolve_items(&self, vars: &VariableScope) -> Option<Vec<Value>> {
        let LoopKind::ForEach { list, .. } = &self.kind else {
            return None;
        };
        let items = match vars.resolve_value(list) {
            Value::Array(items) => items,
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Array(items)) => items,
                _ => {
                    tracing::warn!(list = %list, "forEach list did not resolve to a list, skipping body");
                    Vec::new()
                }
            },
            _ => {
                tracing::warn!(list = %list, "forEach list did not resolve to a list, skipping body");
                Vec::new()
            }
        };
        Some(items)
    }
}

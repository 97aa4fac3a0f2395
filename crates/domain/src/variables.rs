//! Variable scope: the per-run key/value store shared by the nodes of a run.
//!
//! A fresh scope is created at the start of every run, seeded with the
//! trigger variables, mutated in place by executors and dropped when the
//! run ends. Nothing is shared across runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::template::{Reference, Segment, Template};

/// Mapping from variable name to a JSON value (scalar, object or list).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableScope {
    values: Map<String, Value>,
}

impl VariableScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a variable by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether a variable with that name exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove a variable, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Copy every entry of `other` into this scope, overwriting on conflict.
    pub fn merge(&mut self, other: Map<String, Value>) {
        self.values.extend(other);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Walk a dotted path through nested objects and list indices.
    ///
    /// `["arr", "0"]` returns the first element of the `arr` list.
    #[must_use]
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.values.get(first.as_ref())?;
        for segment in rest {
            let segment = segment.as_ref();
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Substitute every `{{path}}` in `template` with its textual value.
    ///
    /// References that cannot be resolved are left untouched as the literal
    /// `{{...}}` text and a warning is logged.
    #[must_use]
    pub fn resolve_string(&self, template: &str) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        self.render(&Template::parse(template))
    }

    /// Evaluate an already parsed template against this scope.
    #[must_use]
    pub fn render(&self, template: &Template) -> String {
        let mut out = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Reference(reference) => match self.resolve_reference(reference) {
                    Some(value) => out.push_str(&to_text(value)),
                    None => out.push_str(reference.raw()),
                },
            }
        }
        out
    }

    /// Resolve `template` to a value, keeping the JSON type when the whole
    /// template is a single reference (e.g. `{{contacts}}` yields the list).
    ///
    /// Falls back to [`resolve_string`](Self::resolve_string) otherwise.
    #[must_use]
    pub fn resolve_value(&self, template: &str) -> Value {
        let parsed = Template::parse(template);
        if let Some(reference) = parsed.as_single_reference()
            && let Some(value) = self.resolve_reference(reference)
        {
            return value.clone();
        }
        Value::String(self.render(&parsed))
    }

    /// Consume the scope and return its raw map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    fn resolve_reference(&self, reference: &Reference) -> Option<&Value> {
        let resolved = self.lookup(reference.path());
        if resolved.is_none() {
            tracing::warn!(reference = %reference.dotted(), "unresolved template reference left as literal");
        }
        resolved
    }
}

impl From<Map<String, Value>> for VariableScope {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for VariableScope {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Textual form of a resolved leaf: strings verbatim, everything else as JSON.
#[must_use]
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

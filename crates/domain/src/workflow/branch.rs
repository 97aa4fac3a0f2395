//! Branch configuration: the conditions evaluated by `IF_ELSE` nodes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::template::Template;
use crate::variables::VariableScope;

/// Comparison applied between the two resolved operands of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "isEmpty")]
    IsEmpty,
}

/// How the results of several conditions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicOperator {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// `left <operator> right`, both sides being templates resolved at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(deserialize_with = "scalar_text")]
    pub left: String,
    pub operator: Operator,
    #[serde(default, deserialize_with = "scalar_text")]
    pub right: String,
}

/// Config carried by an `IF_ELSE` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchConfig {
    pub conditions: Vec<Condition>,
    #[serde(default, alias = "logicOperator")]
    pub logic: LogicOperator,
}

impl Condition {
    #[must_use]
    pub fn new(left: impl Into<String>, operator: Operator, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            operator,
            right: right.into(),
        }
    }

    /// Resolve both operands through `vars` and apply the operator.
    ///
    /// Ordering operators coerce both sides to numbers; a side that is not
    /// numeric makes the comparison false.
    #[must_use]
    pub fn evaluate(&self, vars: &VariableScope) -> bool {
        match self.operator {
            Operator::IsEmpty => is_empty_operand(&self.left, vars),
            operator => {
                let left = vars.resolve_string(&self.left);
                let right = vars.resolve_string(&self.right);
                apply(operator, &left, &right)
            }
        }
    }
}

impl BranchConfig {
    /// Conditions joined with `AND`.
    #[must_use]
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            logic: LogicOperator::And,
        }
    }

    /// Conditions joined with `OR`.
    #[must_use]
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            logic: LogicOperator::Or,
        }
    }

    /// Combine every condition with the configured logic operator.
    #[must_use]
    pub fn evaluate(&self, vars: &VariableScope) -> bool {
        match self.logic {
            LogicOperator::And => self.conditions.iter().all(|c| c.evaluate(vars)),
            LogicOperator::Or => self.conditions.iter().any(|c| c.evaluate(vars)),
        }
    }
}

fn apply(operator: Operator, left: &str, right: &str) -> bool {
    match operator {
        Operator::Equals => loosely_equal(left, right),
        Operator::NotEquals => !loosely_equal(left, right),
        Operator::GreaterThan => compare_numbers(left, right, |l, r| l > r),
        Operator::LessThan => compare_numbers(left, right, |l, r| l < r),
        Operator::GreaterOrEqual => compare_numbers(left, right, |l, r| l >= r),
        Operator::LessOrEqual => compare_numbers(left, right, |l, r| l <= r),
        Operator::Contains => left.contains(right),
        Operator::IsEmpty => left.trim().is_empty(),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn loosely_equal(left: &str, right: &str) -> bool {
    match (parse_number(left), parse_number(right)) {
        (Some(l), Some(r)) => (l - r).abs() < f64::EPSILON,
        _ => left == right,
    }
}

fn compare_numbers(left: &str, right: &str, op: impl Fn(f64, f64) -> bool) -> bool {
    match (parse_number(left), parse_number(right)) {
        (Some(l), Some(r)) => op(l, r),
        _ => false,
    }
}

fn is_empty_operand(template: &str, vars: &VariableScope) -> bool {
    let parsed = Template::parse(template);
    if let Some(reference) = parsed.as_single_reference() {
        return match vars.lookup(reference.path()) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        };
    }
    vars.render(&parsed).trim().is_empty()
}

/// Accept strings as well as bare numbers/booleans for condition operands.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gt(left: &str, right: &str) -> Condition {
        Condition::new(left, Operator::GreaterThan, right)
    }

    #[test]
    fn should_select_false_when_and_has_one_false_condition() {
        let config = BranchConfig {
            conditions: vec![gt("5", "3"), gt("1", "2")],
            logic: LogicOperator::And,
        };
        assert!(!config.evaluate(&VariableScope::new()));
    }

    #[test]
    fn should_select_true_when_or_has_one_true_condition() {
        let config = BranchConfig {
            conditions: vec![gt("5", "3"), gt("1", "2")],
            logic: LogicOperator::Or,
        };
        assert!(config.evaluate(&VariableScope::new()));
    }

    #[test]
    fn should_compare_numerically_not_lexically() {
        assert!(gt("10", "9").evaluate(&VariableScope::new()));
    }

    #[test]
    fn should_resolve_operands_through_scope() {
        let mut vars = VariableScope::new();
        vars.set("battery", 15);
        let low = Condition::new("{{battery}}", Operator::LessThan, "20");
        assert!(low.evaluate(&vars));
        vars.set("battery", 80);
        assert!(!low.evaluate(&vars));
    }

    #[test]
    fn should_be_false_when_ordering_non_numeric_values() {
        assert!(!gt("abc", "1").evaluate(&VariableScope::new()));
        assert!(!Condition::new("{{missing}}", Operator::LessOrEqual, "1")
            .evaluate(&VariableScope::new()));
    }

    #[test]
    fn should_compare_equality_numerically_then_textually() {
        let vars = VariableScope::new();
        assert!(Condition::new("1.0", Operator::Equals, "1").evaluate(&vars));
        assert!(Condition::new("on", Operator::Equals, "on").evaluate(&vars));
        assert!(Condition::new("on", Operator::NotEquals, "off").evaluate(&vars));
    }

    #[test]
    fn should_check_substring_with_contains() {
        let mut vars = VariableScope::new();
        vars.set("sender", "Mom (mobile)");
        assert!(Condition::new("{{sender}}", Operator::Contains, "Mom").evaluate(&vars));
        assert!(!Condition::new("{{sender}}", Operator::Contains, "Dad").evaluate(&vars));
    }

    #[test]
    fn should_treat_missing_and_blank_values_as_empty() {
        let mut vars = VariableScope::new();
        vars.set("blank", "  ");
        vars.set("list", json!([]));
        vars.set("full", "x");
        let empty = |left: &str| Condition::new(left, Operator::IsEmpty, "");
        assert!(empty("{{missing}}").evaluate(&vars));
        assert!(empty("{{blank}}").evaluate(&vars));
        assert!(empty("{{list}}").evaluate(&vars));
        assert!(!empty("{{full}}").evaluate(&vars));
    }

    #[test]
    fn should_deserialize_numeric_operands_and_logic() {
        let json = json!({
            "conditions": [{"left": "{{battery}}", "operator": "<", "right": 20}],
            "logic": "OR"
        });
        let config: BranchConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.conditions[0].right, "20");
        assert_eq!(config.logic, LogicOperator::Or);
    }

    #[test]
    fn should_default_logic_to_and() {
        let json = json!({"conditions": [{"left": "a", "operator": "isEmpty"}]});
        let config: BranchConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.logic, LogicOperator::And);
        assert_eq!(config.conditions[0].right, "");
    }
}

//! Query clauses and filter evaluation
//!
//! Scripts express queries as `[[field, operator, value], ...]`. The
//! [`ClauseParser`] turns those into a [`Filter`], a conjunction of
//! [`Condition`]s that backends translate or evaluate directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use super::document::Document;
use super::error::QueryError;
use super::ports::QueryParser;

/// Comparison operator of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `in`
    In,
    /// `!in`
    NotIn,
}

impl Operator {
    /// Parse operator text
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Gte,
            "<=" => Operator::Lte,
            "in" => Operator::In,
            "!in" => Operator::NotIn,
            _ => return None,
        })
    }

    /// Operator text
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::In => "in",
            Operator::NotIn => "!in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Document field
    pub field: String,
    /// Comparison
    pub op: Operator,
    /// Right-hand operand
    pub value: Value,
}

impl Condition {
    /// Evaluate against a plain document. Missing fields compare as null.
    pub fn matches(&self, doc: &Document) -> bool {
        let left = doc.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            Operator::Eq => json_eq(left, &self.value),
            Operator::Ne => !json_eq(left, &self.value),
            Operator::Gt => compare_json(left, &self.value) == Some(Ordering::Greater),
            Operator::Lt => compare_json(left, &self.value) == Some(Ordering::Less),
            Operator::Gte => matches!(
                compare_json(left, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lte => matches!(
                compare_json(left, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => self.members().any(|v| json_eq(left, v)),
            Operator::NotIn => !self.members().any(|v| json_eq(left, v)),
        }
    }

    fn members(&self) -> impl Iterator<Item = &Value> {
        self.value.as_array().into_iter().flatten()
    }
}

/// Conjunction of conditions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Conditions that must all hold
    pub conditions: Vec<Condition>,
}

impl Filter {
    /// Whether every condition holds
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

/// Reference parser for `[field, operator, value]` clauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClauseParser;

impl QueryParser for ClauseParser {
    fn parse(&self, clauses: &[Vec<Value>]) -> Result<Filter, QueryError> {
        let mut conditions = Vec::with_capacity(clauses.len());
        for (index, clause) in clauses.iter().enumerate() {
            let [field, op, value] = clause.as_slice() else {
                return Err(QueryError::ClauseShape { index });
            };
            let field = field.as_str().ok_or(QueryError::Field { index })?;
            let op = op
                .as_str()
                .and_then(Operator::parse)
                .ok_or_else(|| QueryError::Operator {
                    index,
                    op: op.as_str().map_or_else(|| op.to_string(), str::to_string),
                })?;
            if matches!(op, Operator::In | Operator::NotIn) && !value.is_array() {
                return Err(QueryError::MembershipValue {
                    index,
                    op: op.to_string(),
                });
            }
            conditions.push(Condition {
                field: field.to_string(),
                op,
                value: value.clone(),
            });
        }
        Ok(Filter { conditions })
    }
}

/// Equality that treats numerically equal numbers as equal.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order two values of the same scalar kind; mixed kinds are unordered.
pub fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clauses(value: Value) -> Vec<Vec<Value>> {
        serde_json::from_value(value).unwrap()
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parses_all_operators() {
        let filter = ClauseParser
            .parse(&clauses(json!([
                ["a", "==", 1],
                ["b", "!=", 1],
                ["c", ">", 1],
                ["d", "<", 1],
                ["e", ">=", 1],
                ["f", "<=", 1],
                ["g", "in", [1, 2]],
                ["h", "!in", [1, 2]]
            ])))
            .unwrap();
        assert_eq!(filter.conditions.len(), 8);
        assert_eq!(filter.conditions[7].op, Operator::NotIn);
    }

    #[test]
    fn rejects_wrong_arity() {
        let err = ClauseParser.parse(&clauses(json!([["done", "=="]]))).unwrap_err();
        assert_eq!(err, QueryError::ClauseShape { index: 0 });
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = ClauseParser
            .parse(&clauses(json!([["a", "==", 1], ["b", "~", 2]])))
            .unwrap_err();
        assert!(matches!(err, QueryError::Operator { index: 1, .. }));
    }

    #[test]
    fn rejects_non_string_field() {
        let err = ClauseParser.parse(&clauses(json!([[1, "==", 2]]))).unwrap_err();
        assert_eq!(err, QueryError::Field { index: 0 });
    }

    #[test]
    fn membership_needs_array() {
        let err = ClauseParser.parse(&clauses(json!([["a", "in", 3]]))).unwrap_err();
        assert!(matches!(err, QueryError::MembershipValue { .. }));
    }

    #[test]
    fn filter_evaluation() {
        let filter = ClauseParser
            .parse(&clauses(json!([
                ["done", "==", false],
                ["priority", ">=", 2],
                ["tag", "in", ["home", "work"]]
            ])))
            .unwrap();

        assert!(filter.matches(&doc(json!({"done": false, "priority": 3.0, "tag": "home"}))));
        assert!(!filter.matches(&doc(json!({"done": true, "priority": 3, "tag": "home"}))));
        assert!(!filter.matches(&doc(json!({"done": false, "priority": 1, "tag": "home"}))));
        assert!(!filter.matches(&doc(json!({"done": false, "priority": 5}))));
    }

    #[test]
    fn mixed_kinds_do_not_order() {
        assert_eq!(compare_json(&json!(1), &json!("1")), None);
        assert_eq!(compare_json(&json!("a"), &json!("b")), Some(Ordering::Less));
    }
}

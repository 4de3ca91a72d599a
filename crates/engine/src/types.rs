//! Runtime values produced by expression evaluation.

use nomos_ledger::{Link, LINK_PREFIX};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::numeric::NumericValue;

/// The tri-state outcome of an admissibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tri {
    True,
    False,
    Unknown,
}

impl Tri {
    /// JSON form used in explanation traces: `true`, `false`, or
    /// `null` for unknown.
    pub fn to_json(self) -> serde_json::Value {
        match self {
            Tri::True => serde_json::Value::Bool(true),
            Tri::False => serde_json::Value::Bool(false),
            Tri::Unknown => serde_json::Value::Null,
        }
    }
}

/// The value of an evaluated expression.
///
/// `Unknown` is a first-class value, not an error: it means the
/// evidence needed to decide is absent, and it propagates through
/// connectives per their truth tables.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Unknown,
    Bool(bool),
    Number(NumericValue),
    Text(String),
    Link(Link),
    Seq(Vec<EvalValue>),
}

impl EvalValue {
    /// Truthiness with the unknown hole: `None` when the value cannot
    /// be decided, `Some` otherwise. Links are always truthy; numbers,
    /// text, and sequences are truthy when non-zero / non-empty.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            EvalValue::Unknown => None,
            EvalValue::Bool(b) => Some(*b),
            EvalValue::Number(n) => Some(!n.is_zero()),
            EvalValue::Text(t) => Some(!t.is_empty()),
            EvalValue::Link(_) => Some(true),
            EvalValue::Seq(items) => Some(!items.is_empty()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EvalValue::Unknown)
    }

    /// Numeric view, if this value is a number. Everything else
    /// (including unknown) is `None`.
    pub fn as_number(&self) -> Option<NumericValue> {
        match self {
            EvalValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Decode a stored or resolver-supplied JSON value.
    ///
    /// Accepts both plain JSON (bool, number, string, array) and the
    /// kind-tagged object form produced by [`EvalValue::to_json`].
    /// Strings carrying the ledger link prefix become links. `null`
    /// and unrecognized shapes decode to `Unknown`.
    pub fn from_json(value: &serde_json::Value) -> EvalValue {
        match value {
            serde_json::Value::Null => EvalValue::Unknown,
            serde_json::Value::Bool(b) => EvalValue::Bool(*b),
            serde_json::Value::Number(n) => parse_number(&n.to_string()),
            serde_json::Value::String(s) => {
                if s.starts_with(LINK_PREFIX) {
                    EvalValue::Link(Link::from(s.as_str()))
                } else {
                    EvalValue::Text(s.clone())
                }
            }
            serde_json::Value::Array(items) => {
                EvalValue::Seq(items.iter().map(EvalValue::from_json).collect())
            }
            serde_json::Value::Object(obj) => from_tagged(obj),
        }
    }

    /// Encode for storage or traces. Decimals are kind-tagged with a
    /// string payload so no reader ever routes them through binary
    /// floating point.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            EvalValue::Unknown => serde_json::Value::Null,
            EvalValue::Bool(b) => serde_json::Value::Bool(*b),
            EvalValue::Number(NumericValue::Int(i)) => serde_json::Value::from(*i),
            EvalValue::Number(NumericValue::Precise(d)) => serde_json::json!({
                "kind": "decimal_value",
                "value": d.to_string(),
            }),
            EvalValue::Text(t) => serde_json::Value::String(t.clone()),
            EvalValue::Link(l) => serde_json::Value::String(l.as_str().to_string()),
            EvalValue::Seq(items) => {
                serde_json::Value::Array(items.iter().map(EvalValue::to_json).collect())
            }
        }
    }
}

fn from_tagged(obj: &serde_json::Map<String, serde_json::Value>) -> EvalValue {
    let kind = obj.get("kind").and_then(|k| k.as_str());
    let value = obj.get("value");
    match (kind, value) {
        (Some("bool_value"), Some(v)) => v
            .as_bool()
            .map(EvalValue::Bool)
            .unwrap_or(EvalValue::Unknown),
        (Some("int_value"), Some(v)) => v
            .as_i64()
            .map(|i| EvalValue::Number(NumericValue::Int(i)))
            .unwrap_or(EvalValue::Unknown),
        (Some("decimal_value"), Some(v)) => v
            .as_str()
            .map(parse_number)
            .unwrap_or(EvalValue::Unknown),
        (Some("text_value"), Some(v)) => v
            .as_str()
            .map(|s| EvalValue::Text(s.to_string()))
            .unwrap_or(EvalValue::Unknown),
        (Some("link_value"), Some(v)) => v
            .as_str()
            .map(|s| EvalValue::Link(Link::from(s)))
            .unwrap_or(EvalValue::Unknown),
        _ => EvalValue::Unknown,
    }
}

fn parse_number(text: &str) -> EvalValue {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map(|d| EvalValue::Number(NumericValue::Precise(d)))
        .unwrap_or(EvalValue::Unknown)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

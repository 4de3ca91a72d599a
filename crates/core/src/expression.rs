//! Expression tree for fact functions and act conditions.
//!
//! Expressions arrive as interchange JSON: either a bare string (a
//! reference to a named fact) or an object tagged by its `expression`
//! field. The tree is a closed sum type with exhaustive matching --
//! new tags are added by extending the enum, never by registering
//! handlers at runtime.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::ModelError;

/// Marker operand for IS expressions that match any identity.
pub const ANYONE: &str = "ANYONE";

/// A literal operand: boolean, number, or string.
///
/// Numeric literals are held as `Decimal` so that no value entering
/// the arithmetic subsystem can lose precision.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Bool(bool),
    Number(Decimal),
    Text(String),
}

/// A fact function or act condition.
///
/// Every evaluation yields true, false, unknown, a numeric value, or
/// (for `List`) an ordered sequence of results.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Reference to a named fact, resolved via the model's fact table
    /// or the caller-supplied resolver.
    Fact(String),
    And {
        operands: Vec<Expression>,
    },
    Or {
        operands: Vec<Expression>,
    },
    Not {
        operand: Box<Expression>,
    },
    Equal {
        operands: Vec<Expression>,
    },
    LessThan {
        operands: Vec<Expression>,
    },
    Sum {
        operands: Vec<Expression>,
    },
    Product {
        operands: Vec<Expression>,
    },
    Min {
        operands: Vec<Expression>,
    },
    Max {
        operands: Vec<Expression>,
    },
    /// Implicit iteration: `items` is evaluated at index 0, 1, 2, ...
    /// bound to `name`, until it comes out strictly false (stop,
    /// excluding that element) or unknown (whole list unknown).
    /// A list that collects zero elements is FALSE, not an empty
    /// sequence -- legacy contract, preserved verbatim.
    List {
        name: String,
        items: Box<Expression>,
    },
    Literal {
        operand: LiteralValue,
    },
    /// Identity check against a DID string. `None` means the operand
    /// was absent, which evaluates to unknown.
    Is {
        operand: Option<String>,
    },
    /// True-ish when the enclosing fact was created by a prior
    /// unterminated act; operands gate the result further.
    Create {
        operands: Vec<Expression>,
    },
    /// Look up `operand` in the facts supplied at a case reached by
    /// hopping through the `context` fact chain.
    Projection {
        context: Vec<String>,
        operand: Box<Expression>,
    },
}

impl Expression {
    /// Parse an expression from interchange JSON.
    ///
    /// A bare string is a fact reference; an object is dispatched on
    /// its `expression` tag. Unknown tags are fatal.
    pub fn from_json(v: &serde_json::Value) -> Result<Expression, ModelError> {
        if let Some(s) = v.as_str() {
            return Ok(Expression::Fact(s.to_string()));
        }
        let obj = v
            .as_object()
            .ok_or_else(|| ModelError::malformed(format!("expected expression, got {}", v)))?;
        let tag = obj
            .get("expression")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ModelError::malformed("expression object missing 'expression' tag"))?;

        match tag {
            "AND" => Ok(Expression::And {
                operands: parse_operands(obj)?,
            }),
            "OR" => Ok(Expression::Or {
                operands: parse_operands(obj)?,
            }),
            "NOT" => {
                let operand = obj
                    .get("operand")
                    .ok_or_else(|| ModelError::malformed("NOT missing 'operand'"))?;
                Ok(Expression::Not {
                    operand: Box::new(Expression::from_json(operand)?),
                })
            }
            "EQUAL" => Ok(Expression::Equal {
                operands: parse_operands(obj)?,
            }),
            "LESS_THAN" => Ok(Expression::LessThan {
                operands: parse_operands(obj)?,
            }),
            "SUM" => Ok(Expression::Sum {
                operands: parse_operands(obj)?,
            }),
            "PRODUCT" => Ok(Expression::Product {
                operands: parse_operands(obj)?,
            }),
            "MIN" => Ok(Expression::Min {
                operands: parse_operands(obj)?,
            }),
            "MAX" => Ok(Expression::Max {
                operands: parse_operands(obj)?,
            }),
            "LIST" => {
                let name = obj
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| ModelError::malformed("LIST missing 'name'"))?
                    .to_string();
                let items = obj
                    .get("items")
                    .ok_or_else(|| ModelError::malformed("LIST missing 'items'"))?;
                Ok(Expression::List {
                    name,
                    items: Box::new(Expression::from_json(items)?),
                })
            }
            "LITERAL" => {
                let operand = obj
                    .get("operand")
                    .ok_or_else(|| ModelError::malformed("LITERAL missing 'operand'"))?;
                Ok(Expression::Literal {
                    operand: parse_literal(operand)?,
                })
            }
            "IS" => {
                let operand = obj
                    .get("operand")
                    .and_then(|o| o.as_str())
                    .map(|s| s.to_string());
                Ok(Expression::Is { operand })
            }
            "CREATE" => {
                let operands = if obj.contains_key("operands") {
                    parse_operands(obj)?
                } else {
                    Vec::new()
                };
                Ok(Expression::Create { operands })
            }
            "PROJECTION" => {
                let context = obj
                    .get("context")
                    .and_then(|c| c.as_array())
                    .ok_or_else(|| ModelError::malformed("PROJECTION missing 'context'"))?
                    .iter()
                    .map(|c| {
                        c.as_str().map(|s| s.to_string()).ok_or_else(|| {
                            ModelError::malformed("PROJECTION context entries must be fact names")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let operand = obj
                    .get("operand")
                    .ok_or_else(|| ModelError::malformed("PROJECTION missing 'operand'"))?;
                Ok(Expression::Projection {
                    context,
                    operand: Box::new(Expression::from_json(operand)?),
                })
            }
            other => Err(ModelError::UnknownExpression {
                tag: other.to_string(),
            }),
        }
    }

    /// The tag recorded in explanation traces. Fact references use
    /// their name as the label instead.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Expression::Fact(_) => None,
            Expression::And { .. } => Some("AND"),
            Expression::Or { .. } => Some("OR"),
            Expression::Not { .. } => Some("NOT"),
            Expression::Equal { .. } => Some("EQUAL"),
            Expression::LessThan { .. } => Some("LESS_THAN"),
            Expression::Sum { .. } => Some("SUM"),
            Expression::Product { .. } => Some("PRODUCT"),
            Expression::Min { .. } => Some("MIN"),
            Expression::Max { .. } => Some("MAX"),
            Expression::List { .. } => Some("LIST"),
            Expression::Literal { .. } => Some("LITERAL"),
            Expression::Is { .. } => Some("IS"),
            Expression::Create { .. } => Some("CREATE"),
            Expression::Projection { .. } => Some("PROJECTION"),
        }
    }
}

fn parse_operands(
    obj: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<Expression>, ModelError> {
    obj.get("operands")
        .and_then(|o| o.as_array())
        .ok_or_else(|| ModelError::malformed("expression missing 'operands' array"))?
        .iter()
        .map(Expression::from_json)
        .collect()
}

fn parse_literal(v: &serde_json::Value) -> Result<LiteralValue, ModelError> {
    if let Some(b) = v.as_bool() {
        return Ok(LiteralValue::Bool(b));
    }
    if let Some(n) = v.as_number() {
        // Go through the textual form so 1.15 stays exactly 1.15.
        let d = Decimal::from_str(&n.to_string())
            .map_err(|e| ModelError::malformed(format!("invalid numeric literal: {}", e)))?;
        return Ok(LiteralValue::Number(d));
    }
    if let Some(s) = v.as_str() {
        return Ok(LiteralValue::Text(s.to_string()));
    }
    Err(ModelError::malformed(format!(
        "unsupported literal operand: {}",
        v
    )))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_is_fact_reference() {
        let expr = Expression::from_json(&serde_json::json!("[approved]")).unwrap();
        assert_eq!(expr, Expression::Fact("[approved]".to_string()));
    }

    #[test]
    fn parse_and_with_nested_operands() {
        let expr = Expression::from_json(&serde_json::json!({
            "expression": "AND",
            "operands": ["[a]", { "expression": "NOT", "operand": "[b]" }]
        }))
        .unwrap();
        match expr {
            Expression::And { operands } => {
                assert_eq!(operands.len(), 2);
                assert_eq!(operands[0], Expression::Fact("[a]".to_string()));
                assert!(matches!(operands[1], Expression::Not { .. }));
            }
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn parse_numeric_literal_exact() {
        let expr = Expression::from_json(&serde_json::json!({
            "expression": "LITERAL",
            "operand": 1.15
        }))
        .unwrap();
        match expr {
            Expression::Literal {
                operand: LiteralValue::Number(d),
            } => assert_eq!(d, Decimal::from_str("1.15").unwrap()),
            other => panic!("expected numeric literal, got {:?}", other),
        }
    }

    #[test]
    fn parse_is_without_operand() {
        let expr = Expression::from_json(&serde_json::json!({ "expression": "IS" })).unwrap();
        assert_eq!(expr, Expression::Is { operand: None });
    }

    #[test]
    fn parse_projection() {
        let expr = Expression::from_json(&serde_json::json!({
            "expression": "PROJECTION",
            "context": ["[order]", "[shipment]"],
            "operand": "[price]"
        }))
        .unwrap();
        match expr {
            Expression::Projection { context, operand } => {
                assert_eq!(context, vec!["[order]", "[shipment]"]);
                assert_eq!(*operand, Expression::Fact("[price]".to_string()));
            }
            other => panic!("expected PROJECTION, got {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_is_fatal() {
        let err = Expression::from_json(&serde_json::json!({ "expression": "XOR" })).unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownExpression {
                tag: "XOR".to_string()
            }
        );
    }

    #[test]
    fn create_without_operands() {
        let expr = Expression::from_json(&serde_json::json!({ "expression": "CREATE" })).unwrap();
        assert_eq!(
            expr,
            Expression::Create {
                operands: Vec::new()
            }
        );
    }
}

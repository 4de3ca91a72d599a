//! Model record types: acts, facts, duties.
//!
//! A published model is a set of opaque claims in the external ledger:
//! one claim per act/fact/duty record plus an index claim mapping
//! identifiers to links. The engine receives records as decoded JSON
//! and parses them lazily, at the point of use.
//!
//! Identifier uniqueness within a collection is enforced upstream by
//! the authoring linter; these parsers tolerate violations.

use crate::error::ModelError;
use crate::expression::Expression;

// Payload keys -- protocol constants, not language identifiers.
pub const MODEL_KEY: &str = "nomos-model";
pub const ACT_KEY: &str = "nomos-act";
pub const FACT_KEY: &str = "nomos-fact";
pub const DUTY_KEY: &str = "nomos-duty";

// Case-node field names.
pub const ACT_TAKEN: &str = "act-taken";
pub const GLOBAL_CASE: &str = "global-case";
pub const PREVIOUS_CASE: &str = "previous-case";
pub const FACTS_SUPPLIED: &str = "facts-supplied";

// Origin-node field names.
pub const NEED: &str = "need";
pub const MODEL_LINK: &str = "model-link";

/// A modeled action: who may do it, to what, toward whom, under which
/// preconditions, and which facts it creates or extinguishes.
#[derive(Debug, Clone)]
pub struct ActDecl {
    pub act: String,
    pub actor: Expression,
    pub object: Expression,
    pub recipient: Expression,
    /// `None` is the canonical no-precondition sentinel (empty array
    /// literal string, null, or empty string) -- vacuously true.
    pub preconditions: Option<Expression>,
    /// Free-form joined identifier list; membership is checked by
    /// substring containment (legacy) or exact match (strict mode).
    pub create: String,
    pub terminate: String,
}

/// How a fact resolves: a function expression, or nothing at all.
#[derive(Debug, Clone, PartialEq)]
pub enum FactFunction {
    /// The empty-string / empty-list sentinel: no function exists,
    /// ask the resolver about the fact by name.
    Unresolved,
    Expr(Expression),
}

/// A named predicate and the function that resolves it.
#[derive(Debug, Clone)]
pub struct FactDecl {
    pub fact: String,
    pub function: FactFunction,
}

/// An obligation created and terminated by acts, owed by a role.
#[derive(Debug, Clone)]
pub struct DutyDecl {
    pub duty: String,
    pub duty_holder: Expression,
    pub claimant: Expression,
    pub create: String,
    pub terminate: String,
}

impl ActDecl {
    pub fn from_json(v: &serde_json::Value) -> Result<ActDecl, ModelError> {
        let act = get_str(v, "act")?;
        let actor = field_expression(v, "act", &act, "actor")?;
        let object = field_expression(v, "act", &act, "object")?;
        let recipient = field_expression(v, "act", &act, "recipient")?;
        let preconditions = match v.get("preconditions") {
            None => None,
            Some(p) if is_empty_sentinel(p) => None,
            Some(p) => Some(Expression::from_json(p)?),
        };
        Ok(ActDecl {
            act,
            actor,
            object,
            recipient,
            preconditions,
            create: joined_list(v.get("create")),
            terminate: joined_list(v.get("terminate")),
        })
    }
}

impl FactDecl {
    pub fn from_json(v: &serde_json::Value) -> Result<FactDecl, ModelError> {
        let fact = get_str(v, "fact")?;
        let function = match v.get("function") {
            None => FactFunction::Unresolved,
            Some(f) if is_empty_sentinel(f) => FactFunction::Unresolved,
            Some(f) => FactFunction::Expr(Expression::from_json(f)?),
        };
        Ok(FactDecl { fact, function })
    }
}

impl DutyDecl {
    pub fn from_json(v: &serde_json::Value) -> Result<DutyDecl, ModelError> {
        let duty = get_str(v, "duty")?;
        let duty_holder = field_expression(v, "duty", &duty, "duty-holder")?;
        let claimant = field_expression(v, "duty", &duty, "claimant")?;
        Ok(DutyDecl {
            duty,
            duty_holder,
            claimant,
            create: joined_list(v.get("create")),
            terminate: joined_list(v.get("terminate")),
        })
    }
}

/// The empty markers that mean "nothing here": null, `""`, `"[]"`,
/// or an empty JSON array.
pub fn is_empty_sentinel(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty() || s == "[]",
        serde_json::Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn get_str(v: &serde_json::Value, field: &str) -> Result<String, ModelError> {
    v.get(field)
        .and_then(|s| s.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ModelError::malformed(format!("record missing string field '{}'", field)))
}

fn field_expression(
    v: &serde_json::Value,
    kind: &str,
    id: &str,
    field: &str,
) -> Result<Expression, ModelError> {
    let value = v
        .get(field)
        .ok_or_else(|| ModelError::malformed(format!("{} '{}' missing '{}'", kind, id, field)))?;
    Expression::from_json(value)
}

/// Normalize a create/terminate field to its joined string form.
/// Source models carry these either as free-form strings or arrays.
fn joined_list(v: Option<&serde_json::Value>) -> String {
    match v {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn act_with_precondition_sentinel() {
        let act = ActDecl::from_json(&serde_json::json!({
            "act": "<<ship order>>",
            "actor": "[seller]",
            "object": "[order]",
            "recipient": "[buyer]",
            "preconditions": "[]",
            "create": "[shipment]",
            "terminate": ""
        }))
        .unwrap();
        assert!(act.preconditions.is_none());
        assert_eq!(act.create, "[shipment]");
    }

    #[test]
    fn act_with_array_create_list() {
        let act = ActDecl::from_json(&serde_json::json!({
            "act": "<<open account>>",
            "actor": "[bank]",
            "object": "[request]",
            "recipient": "[customer]",
            "create": ["[account]", "<duty to report>"]
        }))
        .unwrap();
        assert_eq!(act.create, "[account], <duty to report>");
        assert!(act.preconditions.is_none());
    }

    #[test]
    fn fact_function_sentinel_forms() {
        for function in [
            serde_json::json!(""),
            serde_json::json!("[]"),
            serde_json::json!([]),
            serde_json::Value::Null,
        ] {
            let decl = FactDecl::from_json(&serde_json::json!({
                "fact": "[age]",
                "function": function
            }))
            .unwrap();
            assert_eq!(decl.function, FactFunction::Unresolved);
        }
    }

    #[test]
    fn fact_function_chain_to_another_fact() {
        let decl = FactDecl::from_json(&serde_json::json!({
            "fact": "[adult]",
            "function": "[person of full age]"
        }))
        .unwrap();
        assert_eq!(
            decl.function,
            FactFunction::Expr(Expression::Fact("[person of full age]".to_string()))
        );
    }

    #[test]
    fn duty_parses_holder_and_claimant() {
        let duty = DutyDecl::from_json(&serde_json::json!({
            "duty": "<duty to deliver>",
            "duty-holder": "[seller]",
            "claimant": "[buyer]",
            "create": "<<accept order>>",
            "terminate": "<<deliver>>"
        }))
        .unwrap();
        assert_eq!(duty.duty, "<duty to deliver>");
        assert_eq!(duty.duty_holder, Expression::Fact("[seller]".to_string()));
    }
}

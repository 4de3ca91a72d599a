//! The expression evaluator.
//!
//! Evaluation is a recursive descent over the closed expression tree,
//! with unknown as a first-class truth value. Each connective has its
//! own absorption rule for unknown; the tables live in the match arms
//! below and are exercised one by one in the tests.

use nomos_core::model::FACTS_SUPPLIED;
use nomos_core::{Expression, LiteralValue, ANYONE};
use nomos_ledger::Link;
use std::future::Future;
use std::pin::Pin;

use crate::context::{Context, EvalState};
use crate::error::EngineError;
use crate::numeric::{self, NumericValue};
use crate::types::EvalValue;

/// Boxed recursive evaluation future. Evaluation recurses through
/// `async` and must go through the heap to have a finite type.
pub(crate) type EvalFuture<'a> =
    Pin<Box<dyn Future<Output = Result<EvalValue, EngineError>> + Send + 'a>>;

impl<'e> EvalState<'e> {
    /// Evaluate one expression in the given context, recording a trace
    /// node when a trace is being built.
    pub(crate) fn evaluate<'a>(&'a mut self, expr: &'a Expression, ctx: Context) -> EvalFuture<'a> {
        Box::pin(async move {
            let node = match self.trace.as_mut() {
                Some(trace) => {
                    let (fact, tag) = match expr {
                        Expression::Fact(name) => (Some(name.as_str()), None),
                        other => (None, other.tag()),
                    };
                    Some(trace.child(ctx.explanation, fact, tag))
                }
                None => None,
            };
            let mut ctx = ctx;
            if node.is_some() {
                ctx.explanation = node;
            }

            let value = self.eval_inner(expr, &ctx).await?;

            if let (Some(trace), Some(id)) = (self.trace.as_mut(), node) {
                trace.record_value(id, value.to_json());
            }
            Ok(value)
        })
    }

    async fn eval_inner(
        &mut self,
        expr: &Expression,
        ctx: &Context,
    ) -> Result<EvalValue, EngineError> {
        match expr {
            Expression::Fact(name) => self.check_fact(name, ctx.clone()).await,

            // False dominates unknown; short-circuit on the first
            // strictly false operand.
            Expression::And { operands } => {
                let mut has_unknown = false;
                for operand in operands {
                    let value = self.evaluate(operand, ctx.clone()).await?;
                    match value.truthy() {
                        Some(false) => return Ok(EvalValue::Bool(false)),
                        Some(true) => {}
                        None => has_unknown = true,
                    }
                }
                Ok(if has_unknown {
                    EvalValue::Unknown
                } else {
                    EvalValue::Bool(true)
                })
            }

            // Dual of AND: true dominates unknown.
            Expression::Or { operands } => {
                let mut has_unknown = false;
                for operand in operands {
                    let value = self.evaluate(operand, ctx.clone()).await?;
                    match value.truthy() {
                        Some(true) => return Ok(EvalValue::Bool(true)),
                        Some(false) => {}
                        None => has_unknown = true,
                    }
                }
                Ok(if has_unknown {
                    EvalValue::Unknown
                } else {
                    EvalValue::Bool(false)
                })
            }

            // NOT inverts booleans only; everything else, unknown
            // included, stays unknown.
            Expression::Not { operand } => {
                let value = self.evaluate(operand, ctx.clone()).await?;
                Ok(match value {
                    EvalValue::Bool(b) => EvalValue::Bool(!b),
                    _ => EvalValue::Unknown,
                })
            }

            // A differing pair of known values decides false even when
            // other operands are unknown.
            Expression::Equal { operands } => {
                let mut has_unknown = false;
                let mut previous: Option<EvalValue> = None;
                for operand in operands {
                    let value = self.evaluate(operand, ctx.clone()).await?;
                    if value.is_unknown() {
                        has_unknown = true;
                        continue;
                    }
                    if let Some(prev) = &previous {
                        if !values_equal(prev, &value) {
                            return Ok(EvalValue::Bool(false));
                        }
                    }
                    previous = Some(value);
                }
                Ok(if has_unknown {
                    EvalValue::Unknown
                } else {
                    EvalValue::Bool(true)
                })
            }

            // Adjacent known numeric operands must not decrease; a
            // drop decides false immediately, equal neighbors pass.
            Expression::LessThan { operands } => {
                let mut has_unknown = false;
                let mut previous: Option<NumericValue> = None;
                for operand in operands {
                    let value = self.evaluate(operand, ctx.clone()).await?;
                    match value.as_number() {
                        None => has_unknown = true,
                        Some(current) => {
                            if let Some(prev) = previous {
                                if numeric::less_than(Some(current), Some(prev)) == Some(true) {
                                    return Ok(EvalValue::Bool(false));
                                }
                            }
                            previous = Some(current);
                        }
                    }
                }
                Ok(if has_unknown {
                    EvalValue::Unknown
                } else {
                    EvalValue::Bool(true)
                })
            }

            Expression::Sum { operands } => {
                self.fold_numeric(operands, ctx, NumericValue::Int(0), numeric::add)
                    .await
            }

            Expression::Product { operands } => {
                self.fold_numeric(operands, ctx, NumericValue::Int(1), numeric::multiply)
                    .await
            }

            Expression::Min { operands } => self.fold_extreme(operands, ctx, true).await,
            Expression::Max { operands } => self.fold_extreme(operands, ctx, false).await,

            Expression::List { name, items } => {
                let mut collected = Vec::new();
                let mut item_ctx = ctx.clone();
                item_ctx.list_names.push(name.clone());
                item_ctx.list_indices.push(0);
                loop {
                    let value = self.evaluate(items, item_ctx.clone()).await?;
                    match value {
                        // strictly false stops iteration, excluding
                        // this element
                        EvalValue::Bool(false) => break,
                        EvalValue::Unknown => return Ok(EvalValue::Unknown),
                        other => {
                            collected.push(other);
                            if let Some(index) = item_ctx.list_indices.last_mut() {
                                *index += 1;
                            }
                        }
                    }
                }
                // zero collected elements is FALSE, not an empty
                // sequence; downstream models depend on it
                Ok(if collected.is_empty() {
                    EvalValue::Bool(false)
                } else {
                    EvalValue::Seq(collected)
                })
            }

            Expression::Literal { operand } => Ok(match operand {
                LiteralValue::Bool(b) => EvalValue::Bool(*b),
                LiteralValue::Number(d) => EvalValue::Number(NumericValue::Precise(*d)),
                LiteralValue::Text(t) => EvalValue::Text(t.clone()),
            }),

            Expression::Is { operand } => Ok(match operand.as_deref() {
                None => EvalValue::Unknown,
                Some(ANYONE) => EvalValue::Bool(true),
                // identity checks only bind from the checking
                // identity's own perspective
                Some(_) if !ctx.myself => EvalValue::Bool(true),
                Some(did) => EvalValue::Bool(self.identity.did == did),
            }),

            Expression::Create { operands } => self.eval_create(operands, ctx).await,

            Expression::Projection { context, operand } => {
                self.eval_projection(context, operand, ctx).await
            }
        }
    }

    /// SUM and PRODUCT share this fold. Sequence operands are
    /// flattened, skipping non-truthy elements; known non-numeric
    /// operands fold as the identity; unknown contaminates the result
    /// but folding continues so every question still gets asked.
    async fn fold_numeric(
        &mut self,
        operands: &[Expression],
        ctx: &Context,
        identity_element: NumericValue,
        op: fn(Option<NumericValue>, Option<NumericValue>) -> Option<NumericValue>,
    ) -> Result<EvalValue, EngineError> {
        let mut acc = Some(identity_element);
        let mut has_unknown = false;
        for operand in operands {
            let value = self.evaluate(operand, ctx.clone()).await?;
            match value {
                EvalValue::Seq(items) => {
                    for item in items {
                        if item.truthy() != Some(true) {
                            continue;
                        }
                        match item.as_number() {
                            Some(n) => acc = op(acc, Some(n)),
                            None => has_unknown = true,
                        }
                    }
                }
                EvalValue::Unknown => has_unknown = true,
                other => {
                    if let Some(n) = other.as_number() {
                        acc = op(acc, Some(n));
                    }
                }
            }
        }
        match (has_unknown, acc) {
            (false, Some(total)) => Ok(EvalValue::Number(total)),
            _ => Ok(EvalValue::Unknown),
        }
    }

    async fn fold_extreme(
        &mut self,
        operands: &[Expression],
        ctx: &Context,
        want_min: bool,
    ) -> Result<EvalValue, EngineError> {
        let mut extreme: Option<NumericValue> = None;
        for operand in operands {
            let value = self.evaluate(operand, ctx.clone()).await?;
            let Some(current) = value.as_number() else {
                return Ok(EvalValue::Unknown);
            };
            extreme = Some(match extreme {
                None => current,
                Some(best) => {
                    let current_wins =
                        numeric::less_than(Some(current), Some(best)) == Some(want_min);
                    if current_wins {
                        current
                    } else {
                        best
                    }
                }
            });
        }
        Ok(match extreme {
            Some(n) => EvalValue::Number(n),
            None => EvalValue::Unknown,
        })
    }

    /// CREATE: was the enclosing fact created by a prior unterminated
    /// act? Operands, if any, gate the creation: a value fixed when
    /// the creating act was taken decides; only facts the creating act
    /// never recorded are evaluated fresh.
    async fn eval_create(
        &mut self,
        operands: &[Expression],
        ctx: &Context,
    ) -> Result<EvalValue, EngineError> {
        let Some(fact) = ctx.previous_fact.clone() else {
            return Ok(EvalValue::Bool(false));
        };
        let created = self.created_fact(&fact, ctx).await?;
        let chosen = match &created {
            EvalValue::Link(link) => link.clone(),
            // false or unknown stands directly
            _ => return Ok(created),
        };
        for operand in operands {
            let provided = match operand {
                Expression::Fact(name) => {
                    self.fact_provided_in_act(name, &chosen, ctx).await?
                }
                _ => None,
            };
            let holds = match provided {
                Some(value) => value.truthy() == Some(true),
                None => self.evaluate(operand, ctx.clone()).await?.truthy() == Some(true),
            };
            if !holds {
                return Ok(EvalValue::Bool(false));
            }
        }
        Ok(created)
    }

    /// PROJECTION: hop along a chain of link-valued facts, then read
    /// the operand fact out of the facts supplied at the final case.
    /// Stored expression values are re-evaluated in the current
    /// context; any broken hop is unknown.
    async fn eval_projection(
        &mut self,
        chain: &[String],
        operand: &Expression,
        ctx: &Context,
    ) -> Result<EvalValue, EngineError> {
        let Some(first) = chain.first() else {
            return Ok(EvalValue::Unknown);
        };
        let mut link = match self.check_fact(first, ctx.clone()).await? {
            EvalValue::Link(link) => link,
            _ => return Ok(EvalValue::Unknown),
        };
        for fact in &chain[1..] {
            match self.supplied_at(&link, fact).await? {
                Some(value) => match EvalValue::from_json(&value) {
                    EvalValue::Link(next) => link = next,
                    _ => return Ok(EvalValue::Unknown),
                },
                None => return Ok(EvalValue::Unknown),
            }
        }

        match operand {
            Expression::Fact(name) => match self.supplied_at(&link, name).await? {
                None => Ok(EvalValue::Unknown),
                Some(value) => self.revive_supplied(&value, ctx).await,
            },
            other => self.evaluate(other, ctx.clone()).await,
        }
    }

    /// One entry of the facts-supplied map at a case node.
    async fn supplied_at(
        &mut self,
        case: &Link,
        fact: &str,
    ) -> Result<Option<serde_json::Value>, EngineError> {
        let claim = self.ledger.get(case, self.identity).await?;
        Ok(claim
            .data
            .get(FACTS_SUPPLIED)
            .and_then(|s| s.get(fact))
            .cloned())
    }
}

fn values_equal(a: &EvalValue, b: &EvalValue) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => numeric::equal(Some(x), Some(y)) == Some(true),
        _ => a == b,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use nomos_ledger::{ClaimLedger, MemoryLedger};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn expr(v: serde_json::Value) -> Expression {
        Expression::from_json(&v).unwrap()
    }

    async fn eval_with(
        resolver: &StaticResolver,
        expression: &Expression,
    ) -> EvalValue {
        let ledger = MemoryLedger::new();
        let identity = ledger.new_identity().await.unwrap();
        let mut state = EvalState::new(&ledger, resolver, &identity, false, false);
        let ctx = Context::for_case(Link::from("link:mem:none"), Arc::new(BTreeMap::new()));
        state.evaluate(expression, ctx).await.unwrap()
    }

    async fn eval(expression: &Expression) -> EvalValue {
        eval_with(&StaticResolver::empty(), expression).await
    }

    #[tokio::test]
    async fn and_truth_table() {
        let resolver = StaticResolver::from_known(&["[a]"], &["[b]"]);
        let t = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "AND", "operands": ["[a]", "[a]"]
        })))
        .await;
        assert_eq!(t, EvalValue::Bool(true));

        // false dominates unknown
        let f = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "AND", "operands": ["[missing]", "[b]"]
        })))
        .await;
        assert_eq!(f, EvalValue::Bool(false));

        let u = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "AND", "operands": ["[a]", "[missing]"]
        })))
        .await;
        assert_eq!(u, EvalValue::Unknown);
    }

    #[tokio::test]
    async fn or_truth_table() {
        let resolver = StaticResolver::from_known(&["[a]"], &["[b]"]);
        // true dominates unknown
        let t = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "OR", "operands": ["[missing]", "[a]"]
        })))
        .await;
        assert_eq!(t, EvalValue::Bool(true));

        let u = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "OR", "operands": ["[b]", "[missing]"]
        })))
        .await;
        assert_eq!(u, EvalValue::Unknown);

        let f = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "OR", "operands": ["[b]", "[b]"]
        })))
        .await;
        assert_eq!(f, EvalValue::Bool(false));
    }

    #[tokio::test]
    async fn not_inverts_only_booleans() {
        let resolver = StaticResolver::from_known(&["[a]"], &["[b]"]);
        assert_eq!(
            eval_with(&resolver, &expr(serde_json::json!({ "expression": "NOT", "operand": "[b]" }))).await,
            EvalValue::Bool(true)
        );
        assert_eq!(
            eval_with(&resolver, &expr(serde_json::json!({ "expression": "NOT", "operand": "[missing]" }))).await,
            EvalValue::Unknown
        );
        // numbers are not negatable
        assert_eq!(
            eval(&expr(serde_json::json!({
                "expression": "NOT",
                "operand": { "expression": "LITERAL", "operand": 3 }
            })))
            .await,
            EvalValue::Unknown
        );
    }

    #[tokio::test]
    async fn equal_decides_false_despite_unknowns() {
        let resolver = StaticResolver::new(
            [("[x]".to_string(), serde_json::json!(3))].into_iter().collect(),
        );
        let f = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "EQUAL",
            "operands": ["[missing]", "[x]", { "expression": "LITERAL", "operand": 4 }]
        })))
        .await;
        assert_eq!(f, EvalValue::Bool(false));

        let u = eval_with(&resolver, &expr(serde_json::json!({
            "expression": "EQUAL",
            "operands": ["[missing]", "[x]", { "expression": "LITERAL", "operand": 3 }]
        })))
        .await;
        assert_eq!(u, EvalValue::Unknown);
    }

    #[tokio::test]
    async fn single_operand_equal_is_trivially_true() {
        let v = eval(&expr(serde_json::json!({
            "expression": "EQUAL",
            "operands": [{ "expression": "LITERAL", "operand": 5 }]
        })))
        .await;
        assert_eq!(v, EvalValue::Bool(true));
    }

    #[tokio::test]
    async fn less_than_fails_only_on_descent() {
        let t = eval(&expr(serde_json::json!({
            "expression": "LESS_THAN",
            "operands": [
                { "expression": "LITERAL", "operand": 3 },
                { "expression": "LITERAL", "operand": 5 }
            ]
        })))
        .await;
        assert_eq!(t, EvalValue::Bool(true));

        let f = eval(&expr(serde_json::json!({
            "expression": "LESS_THAN",
            "operands": [
                { "expression": "LITERAL", "operand": 5 },
                { "expression": "LITERAL", "operand": 3 }
            ]
        })))
        .await;
        assert_eq!(f, EvalValue::Bool(false));

        // equal neighbors pass
        let eq = eval(&expr(serde_json::json!({
            "expression": "LESS_THAN",
            "operands": [
                { "expression": "LITERAL", "operand": 4 },
                { "expression": "LITERAL", "operand": 4 }
            ]
        })))
        .await;
        assert_eq!(eq, EvalValue::Bool(true));
    }

    #[tokio::test]
    async fn product_is_exact_across_decimals() {
        let v = eval(&expr(serde_json::json!({
            "expression": "PRODUCT",
            "operands": [
                { "expression": "LITERAL", "operand": 1.15 },
                { "expression": "LITERAL", "operand": 400 },
                { "expression": "LITERAL", "operand": 100 }
            ]
        })))
        .await;
        let n = v.as_number().unwrap();
        assert_eq!(n.to_decimal().to_string(), "46000.00");
    }

    #[tokio::test]
    async fn sum_with_unknown_operand_is_unknown() {
        let v = eval(&expr(serde_json::json!({
            "expression": "SUM",
            "operands": [{ "expression": "LITERAL", "operand": 1 }, "[missing]"]
        })))
        .await;
        assert_eq!(v, EvalValue::Unknown);
    }

    #[tokio::test]
    async fn min_and_max_fold() {
        let min = eval(&expr(serde_json::json!({
            "expression": "MIN",
            "operands": [
                { "expression": "LITERAL", "operand": 7 },
                { "expression": "LITERAL", "operand": 2 },
                { "expression": "LITERAL", "operand": 5 }
            ]
        })))
        .await;
        assert_eq!(min.as_number().unwrap().to_decimal().to_string(), "2");

        let max = eval(&expr(serde_json::json!({
            "expression": "MAX",
            "operands": [
                { "expression": "LITERAL", "operand": 7 },
                { "expression": "LITERAL", "operand": 2 }
            ]
        })))
        .await;
        assert_eq!(max.as_number().unwrap().to_decimal().to_string(), "7");
    }

    #[tokio::test]
    async fn is_without_operand_is_unknown() {
        let ledger = MemoryLedger::new();
        let identity = ledger.new_identity().await.unwrap();
        let resolver = StaticResolver::empty();
        let mut state = EvalState::new(&ledger, &resolver, &identity, false, false);
        let mut ctx = Context::for_case(Link::from("link:mem:none"), Arc::new(BTreeMap::new()));
        ctx.myself = true;

        let e = expr(serde_json::json!({ "expression": "IS" }));
        assert_eq!(state.evaluate(&e, ctx.clone()).await.unwrap(), EvalValue::Unknown);

        let anyone = expr(serde_json::json!({ "expression": "IS", "operand": "ANYONE" }));
        assert_eq!(
            state.evaluate(&anyone, ctx.clone()).await.unwrap(),
            EvalValue::Bool(true)
        );

        let me = expr(serde_json::json!({ "expression": "IS", "operand": identity.did }));
        assert_eq!(state.evaluate(&me, ctx.clone()).await.unwrap(), EvalValue::Bool(true));

        let other = expr(serde_json::json!({ "expression": "IS", "operand": "did:nomos:someone-else" }));
        assert_eq!(
            state.evaluate(&other, ctx.clone()).await.unwrap(),
            EvalValue::Bool(false)
        );

        // without the myself flag the same check passes vacuously
        ctx.myself = false;
        assert_eq!(state.evaluate(&other, ctx).await.unwrap(), EvalValue::Bool(true));
    }
}

//! Fact resolution.
//!
//! A fact reference resolves through the model's fact table when a
//! declaration exists (evaluating its function expression, or asking
//! the resolver for sentinel declarations), and straight through the
//! resolver when it does not.

use nomos_core::model::FACT_KEY;
use nomos_core::{FactDecl, FactFunction};

use crate::context::{supplied_key, Context, EvalState};
use crate::error::EngineError;
use crate::expression::EvalFuture;
use crate::types::EvalValue;

impl<'e> EvalState<'e> {
    /// Resolve a fact by name in the given context.
    ///
    /// Boxed because fact functions recurse back into expression
    /// evaluation.
    pub(crate) fn check_fact<'a>(&'a mut self, fact: &'a str, ctx: Context) -> EvalFuture<'a> {
        Box::pin(async move {
            let declared = ctx.fact_links.get(fact).cloned();
            match declared {
                Some(link) => {
                    let claim = self.ledger.get(&link, self.identity).await?;
                    let record = claim.data.get(FACT_KEY).ok_or_else(|| {
                        EngineError::malformed_claim(format!(
                            "claim at {} is not a fact record",
                            link
                        ))
                    })?;
                    let decl = FactDecl::from_json(record)?;

                    let mut sub = ctx.clone();
                    sub.previous_fact = Some(fact.to_string());
                    match decl.function {
                        FactFunction::Unresolved => self.supplied_fact(fact, &sub).await,
                        FactFunction::Expr(expr) => self.evaluate(&expr, sub).await,
                    }
                }
                // no declaration at all: the fact is pure evidence
                None => self.supplied_fact(fact, &ctx).await,
            }
        })
    }

    /// Ask the resolver for a fact value, memoized per evaluation so
    /// the same question is never asked twice. An abstaining resolver
    /// yields unknown.
    pub(crate) async fn supplied_fact(
        &mut self,
        fact: &str,
        ctx: &Context,
    ) -> Result<EvalValue, EngineError> {
        let key = supplied_key(fact, &ctx.list_indices);
        if let Some(raw) = self.supplied.get(&key) {
            return Ok(EvalValue::from_json(raw));
        }
        let answer = self
            .resolver
            .resolve(fact, &ctx.list_names, &ctx.list_indices, None)
            .await;
        match answer {
            None => Ok(EvalValue::Unknown),
            Some(raw) => {
                let value = EvalValue::from_json(&raw);
                self.supplied.insert(key, raw);
                Ok(value)
            }
        }
    }
}

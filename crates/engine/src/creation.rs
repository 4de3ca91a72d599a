//! Fact life-cycle over the case chain.
//!
//! A CREATE-type fact is true-ish when some prior act in the case
//! created it and no later act terminated that particular creation.
//! Both sides are found in one backward walk from the context's case
//! node to the origin.

use nomos_core::model::{ACT_KEY, ACT_TAKEN, FACTS_SUPPLIED, PREVIOUS_CASE};
use nomos_core::{ActDecl, Expression};
use nomos_ledger::Link;
use std::collections::BTreeSet;

use crate::context::{supplied_key, Context, EvalState};
use crate::error::EngineError;
use crate::types::EvalValue;

/// Membership of `id` in a joined create/terminate list.
///
/// The legacy contract is substring containment, which works because
/// identifiers carry their `[..]`/`<..>`/`<<..>>` brackets. Strict
/// mode splits on commas and compares exactly, for models whose
/// identifiers nest.
pub(crate) fn list_contains(joined: &str, id: &str, strict: bool) -> bool {
    if strict {
        joined.split(',').any(|part| part.trim() == id)
    } else {
        joined.contains(id)
    }
}

impl<'e> EvalState<'e> {
    /// The case nodes whose act created `fact` and whose creation has
    /// not been terminated, most recent first, each with the facts
    /// supplied when the act was taken.
    pub(crate) async fn creating_acts(
        &mut self,
        fact: &str,
        ctx: &Context,
    ) -> Result<Vec<(Link, serde_json::Map<String, serde_json::Value>)>, EngineError> {
        let mut candidates: Vec<(Link, serde_json::Map<String, serde_json::Value>)> = Vec::new();
        let mut terminated: BTreeSet<String> = BTreeSet::new();

        let mut cursor = Some(ctx.case_link.clone());
        while let Some(link) = cursor {
            let claim = self.ledger.get(&link, self.identity).await?;
            let Some(act_taken) = claim.data.get(ACT_TAKEN).and_then(|a| a.as_str()) else {
                break; // origin node
            };
            let act_claim = self.ledger.get(&Link::from(act_taken), self.identity).await?;
            let record = act_claim.data.get(ACT_KEY).ok_or_else(|| {
                EngineError::malformed_claim(format!(
                    "case node {} references non-act claim {}",
                    link, act_taken
                ))
            })?;
            let act = ActDecl::from_json(record)?;
            let supplied = claim
                .data
                .get(FACTS_SUPPLIED)
                .and_then(|s| s.as_object())
                .cloned()
                .unwrap_or_default();

            if list_contains(&act.create, fact, self.strict_matching) {
                candidates.push((link.clone(), supplied.clone()));
            }
            if list_contains(&act.terminate, fact, self.strict_matching) {
                // the terminating act recorded which creation it ends
                if let Some(target) = supplied.get(fact).and_then(|v| v.as_str()) {
                    terminated.insert(target.to_string());
                }
            }

            cursor = claim
                .data
                .get(PREVIOUS_CASE)
                .and_then(|p| p.as_str())
                .map(Link::from);
        }

        candidates.retain(|(link, _)| !terminated.contains(link.as_str()));
        Ok(candidates)
    }

    /// Resolve a CREATE fact to the case node that created it.
    ///
    /// No candidates is plain false. One candidate is that creation's
    /// link. Several candidates go to the resolver for a choice; an
    /// answer outside the candidate set is fatal. If the resolver
    /// abstains and the evaluation is from the checking identity's own
    /// perspective, the fact is plausible (undefined) exactly when the
    /// identity holds the role being searched for.
    pub(crate) async fn created_fact(
        &mut self,
        fact: &str,
        ctx: &Context,
    ) -> Result<EvalValue, EngineError> {
        let key = supplied_key(fact, &ctx.list_indices);
        if let Some(raw) = self.supplied.get(&key) {
            if let EvalValue::Link(link) = EvalValue::from_json(raw) {
                return Ok(EvalValue::Link(link));
            }
        }

        let candidates = self.creating_acts(fact, ctx).await?;
        if candidates.is_empty() {
            return Ok(EvalValue::Bool(false));
        }

        let chosen = if candidates.len() == 1 {
            Some(candidates[0].0.clone())
        } else {
            let links: Vec<Link> = candidates.iter().map(|(l, _)| l.clone()).collect();
            let answer = self
                .resolver
                .resolve(fact, &ctx.list_names, &ctx.list_indices, Some(&links))
                .await;
            match answer {
                None => None,
                Some(raw) => {
                    let text = raw.as_str().map(str::to_string).unwrap_or_default();
                    let link = Link::from(text.as_str());
                    if !links.contains(&link) {
                        return Err(EngineError::InvalidDisambiguation {
                            fact: fact.to_string(),
                            link: text,
                        });
                    }
                    Some(link)
                }
            }
        };

        match chosen {
            Some(link) => {
                // recorded so a later terminating act can name its target
                self.supplied
                    .insert(key, serde_json::Value::String(link.as_str().to_string()));
                Ok(EvalValue::Link(link))
            }
            None => {
                if ctx.myself {
                    if let Some(role) = ctx.searching_for.clone() {
                        let mut role_ctx = ctx.clone();
                        role_ctx.searching_for = None;
                        role_ctx.previous_fact = None;
                        let held = self.check_fact(&role, role_ctx).await?;
                        if held.truthy() == Some(true) {
                            return Ok(EvalValue::Unknown);
                        }
                    }
                }
                Ok(EvalValue::Bool(false))
            }
        }
    }

    /// Look up `target` among the facts supplied when the context's
    /// enclosing fact was created, preferring the chosen creating act.
    /// Facts fixed at creation time are read back instead of being
    /// asked again; `None` means no creating act recorded the fact.
    pub(crate) async fn fact_provided_in_act(
        &mut self,
        target: &str,
        chosen: &Link,
        ctx: &Context,
    ) -> Result<Option<EvalValue>, EngineError> {
        let Some(creating_fact) = ctx.previous_fact.clone() else {
            return Ok(None);
        };
        let mut candidates = self.creating_acts(&creating_fact, ctx).await?;
        candidates.sort_by_key(|(link, _)| link != chosen);
        for (_, supplied) in &candidates {
            if let Some(value) = supplied.get(target) {
                let value = value.clone();
                return Ok(Some(self.revive_supplied(&value, ctx).await?));
            }
        }
        Ok(None)
    }

    /// Decode a value read back out of a facts-supplied map. Plain
    /// JSON decodes directly; recorded expression objects (notably the
    /// automatic IS entry binding a role to its taker) are
    /// re-evaluated in the current context, so identity checks bind to
    /// whoever is asking now.
    pub(crate) async fn revive_supplied(
        &mut self,
        value: &serde_json::Value,
        ctx: &Context,
    ) -> Result<EvalValue, EngineError> {
        if value.get("expression").is_some() {
            let stored = Expression::from_json(value)?;
            return self.evaluate(&stored, ctx.clone()).await;
        }
        Ok(EvalValue::from_json(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_matching_honors_brackets() {
        assert!(list_contains("[order], <duty to pay>", "[order]", false));
        assert!(list_contains("[order]", "[order]", false));
        assert!(!list_contains("[order]", "[orders]", false));
        // the known substring hazard strict mode exists for
        assert!(list_contains("[special order]", "[special order]", false));
    }

    #[test]
    fn strict_matching_splits_on_commas() {
        assert!(list_contains("[order], <duty to pay>", "<duty to pay>", true));
        assert!(!list_contains("[special order]", "[order]", true));
        assert!(!list_contains("", "[order]", true));
    }
}

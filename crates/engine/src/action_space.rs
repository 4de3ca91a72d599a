//! Case-level operations: publishing models, opening cases, taking
//! acts, and enumerating what is possible at a point in history.

use nomos_core::model::{
    ACT_KEY, ACT_TAKEN, DUTY_KEY, FACTS_SUPPLIED, FACT_KEY, GLOBAL_CASE, MODEL_KEY, MODEL_LINK,
    NEED, PREVIOUS_CASE,
};
use nomos_core::{ActDecl, DutyDecl, Expression};
use nomos_ledger::{ClaimLedger, Identity, Link};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::action::{check_action, Admissibility};
use crate::context::{Context, EvalState};
use crate::creation::list_contains;
use crate::error::EngineError;
use crate::explanation::Explanation;
use crate::history::{self, ModelIndex};
use crate::resolver::FactResolver;
use crate::types::{EvalValue, Tri};

/// An act named by the model, with the link of its published record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActReference {
    pub act: String,
    pub link: Link,
}

/// A duty named by the model, with the link of its published record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DutyReference {
    pub duty: String,
    pub link: Link,
}

async fn model_for_case(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    case_link: &Link,
) -> Result<(Link, ModelIndex), EngineError> {
    let first = history::first_case_link(ledger, identity, case_link).await?;
    let model_link = history::model_link(ledger, identity, &first).await?;
    let model = history::load_model(ledger, identity, &model_link).await?;
    Ok((first, model))
}

/// Publish a model: one claim per act, fact, and duty record (stored
/// verbatim, so reading them back yields byte-identical JSON), then an
/// index claim mapping identifiers to record links. Fact-function
/// overrides replace the `function` field of the named facts before
/// they are claimed.
pub(crate) async fn publish(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    model: &serde_json::Value,
    fact_functions: &BTreeMap<String, serde_json::Value>,
) -> Result<Link, EngineError> {
    let name = model
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or_default();

    let mut acts = Vec::new();
    for record in section(model, "acts") {
        let id = record
            .get("act")
            .and_then(|a| a.as_str())
            .ok_or_else(|| EngineError::malformed_claim("act record missing 'act' identifier"))?;
        let link = claim_record(ledger, identity, ACT_KEY, record.clone()).await?;
        acts.push(index_entry(id, &link));
    }

    let mut facts = Vec::new();
    for record in section(model, "facts") {
        let id = record
            .get("fact")
            .and_then(|f| f.as_str())
            .ok_or_else(|| EngineError::malformed_claim("fact record missing 'fact' identifier"))?;
        let mut record = record.clone();
        if let Some(function) = fact_functions.get(id) {
            if let Some(obj) = record.as_object_mut() {
                obj.insert("function".to_string(), function.clone());
            }
        }
        let link = claim_record(ledger, identity, FACT_KEY, record).await?;
        facts.push(index_entry(id, &link));
    }

    let mut duties = Vec::new();
    for record in section(model, "duties") {
        let id = record
            .get("duty")
            .and_then(|d| d.as_str())
            .ok_or_else(|| EngineError::malformed_claim("duty record missing 'duty' identifier"))?;
        let link = claim_record(ledger, identity, DUTY_KEY, record.clone()).await?;
        duties.push(index_entry(id, &link));
    }

    let mut index = serde_json::Map::new();
    index.insert("name".to_string(), serde_json::json!(name));
    index.insert("acts".to_string(), serde_json::Value::Array(acts));
    index.insert("facts".to_string(), serde_json::Value::Array(facts));
    index.insert("duties".to_string(), serde_json::Value::Array(duties));

    let mut data = serde_json::Map::new();
    data.insert(MODEL_KEY.to_string(), serde_json::Value::Object(index));
    Ok(ledger
        .claim(identity, serde_json::Value::Object(data))
        .await?)
}

fn section<'m>(model: &'m serde_json::Value, key: &str) -> &'m [serde_json::Value] {
    model
        .get(key)
        .and_then(|s| s.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

async fn claim_record(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    key: &str,
    record: serde_json::Value,
) -> Result<Link, EngineError> {
    let mut data = serde_json::Map::new();
    data.insert(key.to_string(), record);
    Ok(ledger
        .claim(identity, serde_json::Value::Object(data))
        .await?)
}

fn index_entry(id: &str, link: &Link) -> serde_json::Value {
    let mut entry = serde_json::Map::new();
    entry.insert(id.to_string(), serde_json::json!(link.as_str()));
    serde_json::Value::Object(entry)
}

/// Open a case against a published model. The returned link is the
/// case's origin node.
pub(crate) async fn open_case(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    model_link: &Link,
) -> Result<Link, EngineError> {
    let mut need = serde_json::Map::new();
    need.insert(MODEL_LINK.to_string(), serde_json::json!(model_link.as_str()));
    let mut data = serde_json::Map::new();
    data.insert(NEED.to_string(), serde_json::Value::Object(need));
    Ok(ledger
        .claim(identity, serde_json::Value::Object(data))
        .await?)
}

/// Take the named act at `case_link`, extending the case chain.
///
/// The admissibility check runs with early escape; anything short of a
/// definite yes refuses the take. On success the new case node records
/// the act, the chain links, and every fact value supplied during the
/// check, plus an IS entry binding the actor role to the taker.
pub(crate) async fn take(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    case_link: &Link,
    act: &str,
    resolver: &dyn FactResolver,
    strict_matching: bool,
) -> Result<Link, EngineError> {
    let (first, model) = model_for_case(ledger, identity, case_link).await?;
    let act_link = find_act(&model, act)?;

    let mut state = EvalState::new(ledger, resolver, identity, strict_matching, false);
    let admissibility = check_action(&mut state, &model, &act_link, case_link, true).await?;
    if admissibility.valid != Tri::True {
        return Err(EngineError::NotAllowed {
            act: act.to_string(),
            reasons: admissibility.invalid_reasons,
        });
    }

    let mut supplied = serde_json::Map::new();
    for (key, value) in state.supplied {
        supplied.insert(key, value);
    }
    // bind the actor role to the taker so later evaluations of this
    // case see who acted. The check memoizes the resolver's raw
    // answer for the role (an identity-free `true`), which must not
    // end up on the case node; only a chosen instance link survives,
    // for termination matching.
    let act_claim = ledger.get(&act_link, identity).await?;
    if let Some(record) = act_claim.data.get(ACT_KEY) {
        let decl = ActDecl::from_json(record)?;
        if let Expression::Fact(actor) = &decl.actor {
            let fixed_link = supplied
                .get(actor)
                .map(|v| matches!(EvalValue::from_json(v), EvalValue::Link(_)))
                .unwrap_or(false);
            if !fixed_link {
                supplied.insert(
                    actor.clone(),
                    serde_json::json!({ "expression": "IS", "operand": identity.did }),
                );
            }
        }
    }

    let mut node = serde_json::Map::new();
    node.insert(ACT_TAKEN.to_string(), serde_json::json!(act_link.as_str()));
    node.insert(GLOBAL_CASE.to_string(), serde_json::json!(first.as_str()));
    node.insert(
        PREVIOUS_CASE.to_string(),
        serde_json::json!(case_link.as_str()),
    );
    node.insert(FACTS_SUPPLIED.to_string(), serde_json::Value::Object(supplied));
    Ok(ledger
        .claim(identity, serde_json::Value::Object(node))
        .await?)
}

/// Check the named act with tracing on and return the derivation tree.
pub(crate) async fn explain(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    case_link: &Link,
    act: &str,
    resolver: &dyn FactResolver,
    strict_matching: bool,
) -> Result<Explanation, EngineError> {
    let (_, model) = model_for_case(ledger, identity, case_link).await?;
    let act_link = find_act(&model, act)?;

    let mut state = EvalState::new(ledger, resolver, identity, strict_matching, true);
    check_action(&mut state, &model, &act_link, case_link, false).await?;
    state
        .trace
        .and_then(|trace| trace.materialize_root())
        .ok_or_else(|| EngineError::malformed_claim("trace produced no root node"))
}

/// Every act the case's model declares, in model order.
pub(crate) async fn all_acts(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    case_link: &Link,
) -> Result<Vec<ActReference>, EngineError> {
    let (_, model) = model_for_case(ledger, identity, case_link).await?;
    Ok(model
        .acts
        .iter()
        .map(|(act, link)| ActReference {
            act: act.clone(),
            link: link.clone(),
        })
        .collect())
}

/// The model's acts filtered by admissibility verdict: `Tri::True`
/// for available acts, `Tri::Unknown` for potential ones.
pub(crate) async fn acts_with_verdict(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    case_link: &Link,
    resolver: &dyn FactResolver,
    strict_matching: bool,
    verdict: Tri,
) -> Result<Vec<ActReference>, EngineError> {
    let (_, model) = model_for_case(ledger, identity, case_link).await?;
    let mut out = Vec::new();
    for (act, link) in &model.acts {
        // fresh state per act so supplied values never leak between
        // independent checks
        let mut state = EvalState::new(ledger, resolver, identity, strict_matching, false);
        let admissibility: Admissibility =
            check_action(&mut state, &model, link, case_link, false).await?;
        if admissibility.valid == verdict {
            out.push(ActReference {
                act: act.clone(),
                link: link.clone(),
            });
        }
    }
    Ok(out)
}

/// Duties created and not yet terminated at `case_link`, held by the
/// checking identity.
pub(crate) async fn active_duties(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    case_link: &Link,
    resolver: &dyn FactResolver,
    strict_matching: bool,
) -> Result<Vec<DutyReference>, EngineError> {
    let (_, model) = model_for_case(ledger, identity, case_link).await?;

    let mut created: BTreeSet<String> = BTreeSet::new();
    let mut terminated: BTreeSet<String> = BTreeSet::new();
    let mut cursor = Some(case_link.clone());
    while let Some(link) = cursor {
        let claim = ledger.get(&link, identity).await?;
        let Some(act_taken) = claim.data.get(ACT_TAKEN).and_then(|a| a.as_str()) else {
            break;
        };
        let act_claim = ledger.get(&Link::from(act_taken), identity).await?;
        let record = act_claim.data.get(ACT_KEY).ok_or_else(|| {
            EngineError::malformed_claim(format!(
                "case node {} references non-act claim {}",
                link, act_taken
            ))
        })?;
        let act = ActDecl::from_json(record)?;
        for (duty, _) in &model.duties {
            if list_contains(&act.create, duty, strict_matching) {
                created.insert(duty.clone());
            }
            if list_contains(&act.terminate, duty, strict_matching) {
                terminated.insert(duty.clone());
            }
        }
        cursor = claim
            .data
            .get(PREVIOUS_CASE)
            .and_then(|p| p.as_str())
            .map(Link::from);
    }

    let mut out = Vec::new();
    for (duty, duty_link) in &model.duties {
        if !created.contains(duty) || terminated.contains(duty) {
            continue;
        }
        let claim = ledger.get(duty_link, identity).await?;
        let record = claim.data.get(DUTY_KEY).ok_or_else(|| {
            EngineError::malformed_claim(format!("claim at {} is not a duty record", duty_link))
        })?;
        let decl = DutyDecl::from_json(record)?;

        let mut state = EvalState::new(ledger, resolver, identity, strict_matching, false);
        let mut ctx = Context::for_case(case_link.clone(), Arc::new(model.facts.clone()));
        ctx.myself = true;
        if let Expression::Fact(holder) = &decl.duty_holder {
            ctx.searching_for = Some(holder.clone());
        }
        let held = state.evaluate(&decl.duty_holder, ctx).await?;
        if held.truthy() == Some(true) {
            out.push(DutyReference {
                duty: duty.clone(),
                link: duty_link.clone(),
            });
        }
    }
    Ok(out)
}

fn find_act(model: &ModelIndex, act: &str) -> Result<Link, EngineError> {
    model
        .acts
        .iter()
        .find(|(name, _)| name == act)
        .map(|(_, link)| link.clone())
        .ok_or_else(|| EngineError::ActNotFound {
            act: act.to_string(),
        })
}

//! Act admissibility.
//!
//! An act is admissible for an identity at a case when its actor,
//! object, recipient, and preconditions all hold. The four components
//! are checked in that fixed order; the actor check runs from the
//! identity's own perspective so IS expressions bind.

use nomos_core::model::ACT_KEY;
use nomos_core::{ActDecl, Expression};
use nomos_ledger::Link;
use serde::Serialize;
use std::sync::Arc;

use crate::context::{Context, EvalState};
use crate::error::EngineError;
use crate::history::ModelIndex;
use crate::types::Tri;

/// Component tags reported when an admissibility check fails.
pub const ACTOR: &str = "actor";
pub const OBJECT: &str = "object";
pub const RECIPIENT: &str = "recipient";
pub const PRECONDITIONS: &str = "preconditions";

/// The outcome of an admissibility check: the tri-state verdict and,
/// when it is false, which components were violated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admissibility {
    pub valid: Tri,
    pub invalid_reasons: Vec<String>,
}

pub(crate) async fn check_action(
    state: &mut EvalState<'_>,
    model: &ModelIndex,
    act_link: &Link,
    case_link: &Link,
    early_escape: bool,
) -> Result<Admissibility, EngineError> {
    let claim = state.ledger.get(act_link, state.identity).await?;
    let record = claim.data.get(ACT_KEY).ok_or_else(|| {
        EngineError::malformed_claim(format!("claim at {} is not an act record", act_link))
    })?;
    let act = ActDecl::from_json(record)?;

    let root = state.trace.as_mut().map(|t| t.root(&act.act));
    let mut base = Context::for_case(case_link.clone(), Arc::new(model.facts.clone()));
    base.explanation = root;

    let mut reasons = Vec::new();
    let mut has_unknown = false;

    // actor, from the checking identity's perspective
    let mut actor_ctx = base.clone();
    actor_ctx.myself = true;
    if let Expression::Fact(name) = &act.actor {
        actor_ctx.searching_for = Some(name.clone());
    }
    let actor = state.evaluate(&act.actor, actor_ctx).await?;
    classify(actor.truthy(), ACTOR, &mut reasons, &mut has_unknown);
    if early_escape && !reasons.is_empty() {
        return Ok(finish(state, root, Tri::False, reasons));
    }

    let object = state.evaluate(&act.object, base.clone()).await?;
    classify(object.truthy(), OBJECT, &mut reasons, &mut has_unknown);
    if early_escape && !reasons.is_empty() {
        return Ok(finish(state, root, Tri::False, reasons));
    }

    let recipient = state.evaluate(&act.recipient, base.clone()).await?;
    classify(recipient.truthy(), RECIPIENT, &mut reasons, &mut has_unknown);
    if early_escape && !reasons.is_empty() {
        return Ok(finish(state, root, Tri::False, reasons));
    }

    // absent preconditions are vacuously true
    if let Some(preconditions) = &act.preconditions {
        let held = state.evaluate(preconditions, base).await?;
        classify(held.truthy(), PRECONDITIONS, &mut reasons, &mut has_unknown);
    }

    let valid = if !reasons.is_empty() {
        Tri::False
    } else if has_unknown {
        Tri::Unknown
    } else {
        Tri::True
    };
    Ok(finish(state, root, valid, reasons))
}

fn classify(
    truthy: Option<bool>,
    tag: &str,
    reasons: &mut Vec<String>,
    has_unknown: &mut bool,
) {
    match truthy {
        Some(true) => {}
        Some(false) => reasons.push(tag.to_string()),
        None => *has_unknown = true,
    }
}

fn finish(
    state: &mut EvalState<'_>,
    root: Option<crate::explanation::NodeId>,
    valid: Tri,
    reasons: Vec<String>,
) -> Admissibility {
    if let (Some(trace), Some(root)) = (state.trace.as_mut(), root) {
        trace.record_value(root, valid.to_json());
    }
    Admissibility {
        valid,
        invalid_reasons: reasons,
    }
}

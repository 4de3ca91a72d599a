//! Normative rule engine over an append-only claim ledger.
//!
//! A published model declares acts (who may do what to whom, under
//! which preconditions), facts (predicates with optional function
//! expressions), and duties (obligations created and terminated by
//! acts). A case is a chain of claims recording which acts were taken.
//! The engine answers, for a given identity at a given point in a
//! case: which acts are admissible, which are plausible pending more
//! evidence, which duties are active, and why.
//!
//! Truth is tri-state. Evidence the resolver cannot supply evaluates
//! to unknown, which propagates through expressions per each
//! connective's absorption rule rather than failing the evaluation.
//!
//! ```no_run
//! # async fn demo() -> Result<(), nomos_engine::EngineError> {
//! use nomos_engine::Engine;
//! use nomos_ledger::{ClaimLedger, MemoryLedger};
//!
//! let engine = Engine::new(MemoryLedger::new());
//! let author = engine.ledger().new_identity().await?;
//! let model = serde_json::json!({
//!     "model": "sale",
//!     "acts": [], "facts": [], "duties": []
//! });
//! let model_link = engine.publish(&author, &model, &Default::default()).await?;
//! let case = engine.open_case(&author, &model_link).await?;
//! let acts = engine.get_available_acts(&case, &author, &[], &[]).await?;
//! # let _ = acts;
//! # Ok(())
//! # }
//! ```

mod action;
mod action_space;
mod context;
mod creation;
mod error;
mod explanation;
mod expression;
mod facts;
mod history;
mod numeric;
mod resolver;
mod types;

pub use action::{Admissibility, ACTOR, OBJECT, PRECONDITIONS, RECIPIENT};
pub use action_space::{ActReference, DutyReference};
pub use error::EngineError;
pub use explanation::Explanation;
pub use numeric::NumericValue;
pub use resolver::{CountingResolver, FactResolver, StaticResolver};
pub use types::{EvalValue, Tri};

use nomos_ledger::{ClaimLedger, Identity, Link};
use std::collections::BTreeMap;

use crate::context::EvalState;

/// The engine facade: a ledger plus evaluation policy.
///
/// All methods take the acting identity and the case position
/// explicitly; the engine itself holds no per-case state, so one
/// instance serves any number of concurrent cases.
pub struct Engine<L> {
    ledger: L,
    strict_matching: bool,
}

impl<L: ClaimLedger> Engine<L> {
    pub fn new(ledger: L) -> Self {
        Engine {
            ledger,
            strict_matching: false,
        }
    }

    /// Switch create/terminate membership from legacy substring
    /// containment to exact comma-separated matching. For models whose
    /// identifiers nest inside one another.
    pub fn with_strict_matching(mut self, strict: bool) -> Self {
        self.strict_matching = strict;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Publish a model to the ledger, optionally overriding the
    /// `function` field of named facts, and return the model link.
    pub async fn publish(
        &self,
        identity: &Identity,
        model: &serde_json::Value,
        fact_functions: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Link, EngineError> {
        action_space::publish(&self.ledger, identity, model, fact_functions).await
    }

    /// Open a case against a published model; returns the case's
    /// origin node link.
    pub async fn open_case(
        &self,
        identity: &Identity,
        model_link: &Link,
    ) -> Result<Link, EngineError> {
        action_space::open_case(&self.ledger, identity, model_link).await
    }

    /// Take an act at a case position, extending the chain. Refused
    /// with [`EngineError::NotAllowed`] unless admissibility is
    /// definitely true; an undefined verdict carries no reasons.
    pub async fn take(
        &self,
        identity: &Identity,
        case_link: &Link,
        act: &str,
        resolver: &dyn FactResolver,
    ) -> Result<Link, EngineError> {
        action_space::take(
            &self.ledger,
            identity,
            case_link,
            act,
            resolver,
            self.strict_matching,
        )
        .await
    }

    /// Check an act with tracing on; returns the derivation tree
    /// rooted at the act, with the verdict as the root value.
    pub async fn explain(
        &self,
        identity: &Identity,
        case_link: &Link,
        act: &str,
        resolver: &dyn FactResolver,
    ) -> Result<Explanation, EngineError> {
        action_space::explain(
            &self.ledger,
            identity,
            case_link,
            act,
            resolver,
            self.strict_matching,
        )
        .await
    }

    /// Every act the case's model declares, in model order.
    pub async fn get_actions(
        &self,
        case_link: &Link,
        identity: &Identity,
    ) -> Result<Vec<ActReference>, EngineError> {
        action_space::all_acts(&self.ledger, identity, case_link).await
    }

    /// Acts admissible right now, with the listed facts taken as known
    /// true resp. false and everything else unknown.
    pub async fn get_available_acts(
        &self,
        case_link: &Link,
        identity: &Identity,
        known_true: &[&str],
        known_false: &[&str],
    ) -> Result<Vec<ActReference>, EngineError> {
        let resolver = StaticResolver::from_known(known_true, known_false);
        self.get_available_acts_with_resolver(case_link, identity, &resolver)
            .await
    }

    pub async fn get_available_acts_with_resolver(
        &self,
        case_link: &Link,
        identity: &Identity,
        resolver: &dyn FactResolver,
    ) -> Result<Vec<ActReference>, EngineError> {
        action_space::acts_with_verdict(
            &self.ledger,
            identity,
            case_link,
            resolver,
            self.strict_matching,
            Tri::True,
        )
        .await
    }

    /// Acts whose admissibility is undefined: not ruled out, pending
    /// more evidence.
    pub async fn get_potential_acts(
        &self,
        case_link: &Link,
        identity: &Identity,
        known_true: &[&str],
        known_false: &[&str],
    ) -> Result<Vec<ActReference>, EngineError> {
        let resolver = StaticResolver::from_known(known_true, known_false);
        self.get_potential_acts_with_resolver(case_link, identity, &resolver)
            .await
    }

    pub async fn get_potential_acts_with_resolver(
        &self,
        case_link: &Link,
        identity: &Identity,
        resolver: &dyn FactResolver,
    ) -> Result<Vec<ActReference>, EngineError> {
        action_space::acts_with_verdict(
            &self.ledger,
            identity,
            case_link,
            resolver,
            self.strict_matching,
            Tri::Unknown,
        )
        .await
    }

    /// Duties created and not yet terminated at this case position,
    /// held by `identity`.
    pub async fn get_active_duties(
        &self,
        case_link: &Link,
        identity: &Identity,
    ) -> Result<Vec<DutyReference>, EngineError> {
        let resolver = StaticResolver::empty();
        self.get_active_duties_with_resolver(case_link, identity, &resolver)
            .await
    }

    pub async fn get_active_duties_with_resolver(
        &self,
        case_link: &Link,
        identity: &Identity,
        resolver: &dyn FactResolver,
    ) -> Result<Vec<DutyReference>, EngineError> {
        action_space::active_duties(
            &self.ledger,
            identity,
            case_link,
            resolver,
            self.strict_matching,
        )
        .await
    }

    /// Check one act's admissibility at a case position without
    /// taking it. With `early_escape` the check stops at the first
    /// violated component.
    pub async fn check_action(
        &self,
        model_link: &Link,
        act_link: &Link,
        identity: &Identity,
        case_link: &Link,
        resolver: &dyn FactResolver,
        early_escape: bool,
    ) -> Result<Admissibility, EngineError> {
        let model = history::load_model(&self.ledger, identity, model_link).await?;
        let mut state = EvalState::new(
            &self.ledger,
            resolver,
            identity,
            self.strict_matching,
            false,
        );
        action::check_action(&mut state, &model, act_link, case_link, early_escape).await
    }
}

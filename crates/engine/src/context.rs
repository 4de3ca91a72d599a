//! Evaluation context and per-evaluation mutable state.

use nomos_ledger::{ClaimLedger, Identity, Link};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::explanation::{ExplanationBuilder, NodeId};
use crate::resolver::FactResolver;

/// The immutable position of one expression evaluation: which case it
/// reads, which model facts are in scope, where in nested lists it
/// sits, and whose perspective is being taken.
///
/// Contexts are cheap to clone; sub-evaluations get a derived copy and
/// never see their parent's copy change.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    /// The case node the evaluation reads history from.
    pub case_link: Link,
    /// Fact name to model-record link, shared across the evaluation.
    pub fact_links: Arc<BTreeMap<String, Link>>,
    /// Enclosing LIST scopes, outermost first.
    pub list_names: Vec<String>,
    /// Current index in each enclosing LIST scope.
    pub list_indices: Vec<u32>,
    /// True while evaluating from the checking identity's own
    /// perspective (actor of an act, holder of a duty). IS checks only
    /// bind to the identity under this flag.
    pub myself: bool,
    /// The role fact an admissibility check is trying to attribute,
    /// used as a plausibility fallback when fact creation cannot be
    /// disambiguated.
    pub searching_for: Option<String>,
    /// The fact whose function is currently being evaluated. CREATE
    /// expressions apply to this fact.
    pub previous_fact: Option<String>,
    /// Trace node to attach children to, when a trace is being built.
    pub explanation: Option<NodeId>,
}

impl Context {
    pub fn for_case(case_link: Link, fact_links: Arc<BTreeMap<String, Link>>) -> Self {
        Context {
            case_link,
            fact_links,
            list_names: Vec::new(),
            list_indices: Vec::new(),
            myself: false,
            searching_for: None,
            previous_fact: None,
            explanation: None,
        }
    }
}

/// Mutable state threaded through one evaluation: the external
/// boundaries, the memo of resolver-supplied values, and the optional
/// trace under construction.
pub(crate) struct EvalState<'e> {
    pub ledger: &'e dyn ClaimLedger,
    pub resolver: &'e dyn FactResolver,
    pub identity: &'e Identity,
    pub strict_matching: bool,
    /// Raw supplied values keyed by fact name (suffixed with list
    /// indices inside LIST scopes). Guarantees each question is asked
    /// at most once per evaluation, and becomes the facts-supplied map
    /// of the case node when an act is taken.
    pub supplied: BTreeMap<String, serde_json::Value>,
    pub trace: Option<ExplanationBuilder>,
}

impl<'e> EvalState<'e> {
    pub fn new(
        ledger: &'e dyn ClaimLedger,
        resolver: &'e dyn FactResolver,
        identity: &'e Identity,
        strict_matching: bool,
        with_trace: bool,
    ) -> Self {
        EvalState {
            ledger,
            resolver,
            identity,
            strict_matching,
            supplied: BTreeMap::new(),
            trace: with_trace.then(ExplanationBuilder::new),
        }
    }
}

/// Memo key for a supplied fact value. Inside LIST scopes the indices
/// are appended so each iteration is its own question.
pub(crate) fn supplied_key(fact: &str, list_indices: &[u32]) -> String {
    if list_indices.is_empty() {
        fact.to_string()
    } else {
        let suffix = list_indices
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".");
        format!("{}#{}", fact, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplied_keys_distinguish_list_iterations() {
        assert_eq!(supplied_key("[price]", &[]), "[price]");
        assert_eq!(supplied_key("[price]", &[0]), "[price]#0");
        assert_eq!(supplied_key("[price]", &[1, 2]), "[price]#1.2");
    }
}

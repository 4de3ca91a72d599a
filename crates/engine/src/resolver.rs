//! The evidence boundary.
//!
//! When evaluation reaches a fact the model cannot derive on its own,
//! the engine asks a [`FactResolver`]. In an interactive deployment a
//! resolver is a user prompt; in services it is a lookup against some
//! evidence store; in tests it is a map.

use async_trait::async_trait;
use nomos_ledger::Link;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Supplies values for facts the model leaves open.
///
/// `list_names` / `list_indices` describe the enclosing list scopes,
/// outermost first, so a resolver can answer "the price of the second
/// item" differently from the first. When `creating_acts` is `Some`,
/// the engine is not asking for a value but for a choice: the answer
/// must be one of the offered case links (or `None` to abstain).
///
/// Returning `None` means "unknown"; the engine maps it to the
/// undefined truth value rather than an error.
#[async_trait]
pub trait FactResolver: Send + Sync {
    async fn resolve(
        &self,
        fact: &str,
        list_names: &[String],
        list_indices: &[u32],
        creating_acts: Option<&[Link]>,
    ) -> Option<serde_json::Value>;
}

/// A resolver backed by a fixed fact-to-value map. List scope is
/// ignored; every index gets the same answer.
#[derive(Debug, Default)]
pub struct StaticResolver {
    facts: HashMap<String, serde_json::Value>,
}

impl StaticResolver {
    pub fn new(facts: HashMap<String, serde_json::Value>) -> Self {
        Self { facts }
    }

    /// Knows nothing; answers every question with unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Convenience for admissibility queries: the listed facts are
    /// true resp. false, everything else is unknown.
    pub fn from_known(known_true: &[&str], known_false: &[&str]) -> Self {
        let mut facts = HashMap::new();
        for fact in known_true {
            facts.insert((*fact).to_string(), serde_json::Value::Bool(true));
        }
        for fact in known_false {
            facts.insert((*fact).to_string(), serde_json::Value::Bool(false));
        }
        Self { facts }
    }
}

#[async_trait]
impl FactResolver for StaticResolver {
    async fn resolve(
        &self,
        fact: &str,
        _list_names: &[String],
        _list_indices: &[u32],
        _creating_acts: Option<&[Link]>,
    ) -> Option<serde_json::Value> {
        self.facts.get(fact).cloned()
    }
}

/// Wraps another resolver and counts how many questions reach it.
/// Useful for asserting that short-circuit paths skip work.
pub struct CountingResolver<R> {
    inner: R,
    calls: AtomicUsize,
}

impl<R> CountingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: FactResolver> FactResolver for CountingResolver<R> {
    async fn resolve(
        &self,
        fact: &str,
        list_names: &[String],
        list_indices: &[u32],
        creating_acts: Option<&[Link]>,
    ) -> Option<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .resolve(fact, list_names, list_indices, creating_acts)
            .await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

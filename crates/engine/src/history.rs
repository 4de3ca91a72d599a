//! Case chain navigation and model index loading.
//!
//! A case is a chain of claims. The origin node carries a `need` with
//! the model link; every later node records the act taken, the link
//! back to the origin (`global-case`), the node it extends
//! (`previous-case`), and the facts supplied while the act was
//! checked.

use nomos_core::model::{ACT_TAKEN, GLOBAL_CASE, MODEL_KEY, MODEL_LINK, NEED};
use nomos_ledger::{ClaimLedger, Identity, Link};
use std::collections::BTreeMap;

use crate::error::EngineError;

/// The decoded model index claim: identifier-to-link tables for every
/// record the model publishes.
#[derive(Debug, Clone)]
pub(crate) struct ModelIndex {
    pub name: String,
    /// Acts in model order; enumeration APIs preserve this order.
    pub acts: Vec<(String, Link)>,
    pub facts: BTreeMap<String, Link>,
    pub duties: Vec<(String, Link)>,
}

/// Walk back to the origin node of the case `case_link` belongs to.
pub(crate) async fn first_case_link(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    case_link: &Link,
) -> Result<Link, EngineError> {
    let claim = ledger.get(case_link, identity).await?;
    if claim.data.get(ACT_TAKEN).is_none() {
        return Ok(case_link.clone());
    }
    claim
        .data
        .get(GLOBAL_CASE)
        .and_then(|g| g.as_str())
        .map(Link::from)
        .ok_or_else(|| {
            EngineError::malformed_claim(format!(
                "case node {} has '{}' but no '{}'",
                case_link, ACT_TAKEN, GLOBAL_CASE
            ))
        })
}

/// The model link recorded in a case's origin node.
pub(crate) async fn model_link(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    first_case: &Link,
) -> Result<Link, EngineError> {
    let claim = ledger.get(first_case, identity).await?;
    claim
        .data
        .get(NEED)
        .and_then(|n| n.get(MODEL_LINK))
        .and_then(|m| m.as_str())
        .map(Link::from)
        .ok_or_else(|| {
            EngineError::malformed_claim(format!(
                "origin node {} carries no '{}.{}'",
                first_case, NEED, MODEL_LINK
            ))
        })
}

pub(crate) async fn load_model(
    ledger: &dyn ClaimLedger,
    identity: &Identity,
    model_link: &Link,
) -> Result<ModelIndex, EngineError> {
    let claim = ledger.get(model_link, identity).await?;
    let index = claim.data.get(MODEL_KEY).ok_or_else(|| {
        EngineError::malformed_claim(format!("claim at {} is not a model index", model_link))
    })?;

    let name = index
        .get("name")
        .and_then(|n| n.as_str())
        .unwrap_or_default()
        .to_string();
    let acts = entry_pairs(index.get("acts"))?;
    let facts = entry_pairs(index.get("facts"))?.into_iter().collect();
    let duties = entry_pairs(index.get("duties"))?;

    Ok(ModelIndex {
        name,
        acts,
        facts,
        duties,
    })
}

/// Decode an index section: an array of single-entry objects mapping
/// an identifier to its record link.
fn entry_pairs(section: Option<&serde_json::Value>) -> Result<Vec<(String, Link)>, EngineError> {
    let Some(items) = section.and_then(|s| s.as_array()) else {
        return Ok(Vec::new());
    };
    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object().ok_or_else(|| {
            EngineError::malformed_claim("model index entries must be objects")
        })?;
        for (id, link) in obj {
            let link = link.as_str().ok_or_else(|| {
                EngineError::malformed_claim(format!("model index entry '{}' is not a link", id))
            })?;
            pairs.push((id.clone(), Link::from(link)));
        }
    }
    Ok(pairs)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use nomos_ledger::MemoryLedger;

    #[tokio::test]
    async fn origin_node_is_its_own_first_case() {
        let ledger = MemoryLedger::new();
        let id = ledger.new_identity().await.unwrap();
        let origin = ledger
            .claim(&id, serde_json::json!({ "need": { "model-link": "link:mem:model" } }))
            .await
            .unwrap();
        let first = first_case_link(&ledger, &id, &origin).await.unwrap();
        assert_eq!(first, origin);
        let m = model_link(&ledger, &id, &first).await.unwrap();
        assert_eq!(m, Link::from("link:mem:model"));
    }

    #[tokio::test]
    async fn later_nodes_jump_to_the_origin() {
        let ledger = MemoryLedger::new();
        let id = ledger.new_identity().await.unwrap();
        let origin = ledger
            .claim(&id, serde_json::json!({ "need": { "model-link": "link:mem:model" } }))
            .await
            .unwrap();
        let node = ledger
            .claim(
                &id,
                serde_json::json!({
                    "act-taken": "link:mem:act",
                    "global-case": origin.as_str(),
                    "previous-case": origin.as_str(),
                    "facts-supplied": {}
                }),
            )
            .await
            .unwrap();
        let first = first_case_link(&ledger, &id, &node).await.unwrap();
        assert_eq!(first, origin);
    }

    #[tokio::test]
    async fn model_index_decodes_sections() {
        let ledger = MemoryLedger::new();
        let id = ledger.new_identity().await.unwrap();
        let link = ledger
            .claim(
                &id,
                serde_json::json!({
                    "nomos-model": {
                        "name": "sale",
                        "acts": [ { "<<sell>>": "link:mem:a1" } ],
                        "facts": [ { "[buyer]": "link:mem:f1" }, { "[price]": "link:mem:f2" } ],
                        "duties": []
                    }
                }),
            )
            .await
            .unwrap();
        let model = load_model(&ledger, &id, &link).await.unwrap();
        assert_eq!(model.name, "sale");
        assert_eq!(model.acts, vec![("<<sell>>".to_string(), Link::from("link:mem:a1"))]);
        assert_eq!(model.facts.get("[price]"), Some(&Link::from("link:mem:f2")));
        assert!(model.duties.is_empty());
    }
}

//! In-memory reference ledger.
//!
//! Links are content-derived (sha256 over signer DID, previous link,
//! and the canonical JSON of the data). Identities are ed25519
//! keypairs with the public key encoded into the DID. Intended for
//! tests and demos; durable backends implement the same trait.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::traits::{Claim, ClaimLedger, Identity, Link};

struct StoredClaim {
    data: serde_json::Value,
    previous: Option<Link>,
    #[allow(dead_code)]
    signature: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    claims: HashMap<Link, StoredClaim>,
    keys: HashMap<String, SigningKey>,
    heads: HashMap<String, Link>,
}

/// An append-only, content-addressed claim store held in memory.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn derive_link(did: &str, previous: Option<&Link>, data: &serde_json::Value) -> Link {
        let mut hasher = Sha256::new();
        hasher.update(did.as_bytes());
        if let Some(prev) = previous {
            hasher.update(prev.as_str().as_bytes());
        }
        // serde_json maps are sorted by key, so this byte form is
        // canonical for our purposes.
        hasher.update(data.to_string().as_bytes());
        let digest = hasher.finalize();
        Link(format!("link:mem:{}", URL_SAFE_NO_PAD.encode(digest)))
    }
}

#[async_trait]
impl ClaimLedger for MemoryLedger {
    async fn get(&self, link: &Link, _identity: &Identity) -> Result<Claim, LedgerError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| LedgerError::Backend("ledger mutex poisoned".to_string()))?;
        let stored = inner
            .claims
            .get(link)
            .ok_or_else(|| LedgerError::UnknownLink {
                link: link.to_string(),
            })?;
        Ok(Claim {
            data: stored.data.clone(),
            previous: stored.previous.clone(),
        })
    }

    async fn claim(
        &self,
        identity: &Identity,
        data: serde_json::Value,
    ) -> Result<Link, LedgerError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LedgerError::Backend("ledger mutex poisoned".to_string()))?;
        let key = inner
            .keys
            .get(&identity.did)
            .ok_or_else(|| LedgerError::UnknownIdentity {
                did: identity.did.clone(),
            })?
            .clone();

        let previous = inner.heads.get(&identity.did).cloned();
        let link = Self::derive_link(&identity.did, previous.as_ref(), &data);
        let signature = key.sign(data.to_string().as_bytes()).to_bytes().to_vec();

        inner.claims.insert(
            link.clone(),
            StoredClaim {
                data,
                previous,
                signature,
            },
        );
        inner.heads.insert(identity.did.clone(), link.clone());
        Ok(link)
    }

    async fn new_identity(&self) -> Result<Identity, LedgerError> {
        let key = SigningKey::generate(&mut OsRng);
        let did = format!(
            "did:nomos:{}",
            URL_SAFE_NO_PAD.encode(key.verifying_key().as_bytes())
        );
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| LedgerError::Backend("ledger mutex poisoned".to_string()))?;
        inner.keys.insert(did.clone(), key);
        Ok(Identity { did })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_and_get_round_trip() {
        let ledger = MemoryLedger::new();
        let id = ledger.new_identity().await.unwrap();
        let data = serde_json::json!({ "hello": "world" });
        let link = ledger.claim(&id, data.clone()).await.unwrap();
        let claim = ledger.get(&link, &id).await.unwrap();
        assert_eq!(claim.data, data);
        assert_eq!(claim.previous, None);
    }

    #[tokio::test]
    async fn claims_chain_via_previous() {
        let ledger = MemoryLedger::new();
        let id = ledger.new_identity().await.unwrap();
        let first = ledger.claim(&id, serde_json::json!({ "n": 1 })).await.unwrap();
        let second = ledger.claim(&id, serde_json::json!({ "n": 2 })).await.unwrap();
        let claim = ledger.get(&second, &id).await.unwrap();
        assert_eq!(claim.previous, Some(first));
    }

    #[tokio::test]
    async fn links_carry_the_shared_prefix() {
        let ledger = MemoryLedger::new();
        let id = ledger.new_identity().await.unwrap();
        let link = ledger.claim(&id, serde_json::json!(true)).await.unwrap();
        assert!(link.as_str().starts_with(crate::traits::LINK_PREFIX));
    }

    #[tokio::test]
    async fn unknown_link_errors() {
        let ledger = MemoryLedger::new();
        let id = ledger.new_identity().await.unwrap();
        let err = ledger.get(&Link::from("link:mem:nope"), &id).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownLink { .. }));
    }

    #[tokio::test]
    async fn identities_are_distinct() {
        let ledger = MemoryLedger::new();
        let a = ledger.new_identity().await.unwrap();
        let b = ledger.new_identity().await.unwrap();
        assert_ne!(a.did, b.did);
        assert!(a.did.starts_with("did:nomos:"));
    }
}

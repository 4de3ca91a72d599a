use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// Prefix shared by every claim link. The engine uses it to recognize
/// links that come back as plain strings in stored fact values.
pub const LINK_PREFIX: &str = "link:";

/// A content-derived address of a claim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(pub String);

impl Link {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Link {
    fn from(s: String) -> Self {
        Link(s)
    }
}

impl From<&str> for Link {
    fn from(s: &str) -> Self {
        Link(s.to_string())
    }
}

/// A party known to the ledger, addressed by DID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub did: String,
}

/// A stored claim: opaque data plus the previous claim by the same
/// identity, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub data: serde_json::Value,
    pub previous: Option<Link>,
}

/// The append-only claim store and identity substrate.
///
/// The engine only ever reads claims and appends new ones; claims are
/// never mutated or deleted. Serialization of competing appends to the
/// same case chain is the backend's responsibility, not the engine's.
///
/// Implementations must be `Send + Sync` so evaluations can cross
/// async task boundaries.
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    /// Read the claim stored under `link`. The reading identity is
    /// passed so backends can enforce access control.
    async fn get(&self, link: &Link, identity: &Identity) -> Result<Claim, LedgerError>;

    /// Append a claim for `identity`, returning its content-derived
    /// link. Claiming identical data twice may return the same link.
    async fn claim(
        &self,
        identity: &Identity,
        data: serde_json::Value,
    ) -> Result<Link, LedgerError>;

    /// Create a fresh identity with a new DID.
    async fn new_identity(&self) -> Result<Identity, LedgerError>;
}

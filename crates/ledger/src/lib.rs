//! Claim-ledger boundary for the nomos rule engine.
//!
//! The engine consumes an append-only, content-addressed claim store
//! with an identity substrate. This crate defines that contract
//! (`ClaimLedger`) plus an in-memory reference backend used by tests
//! and demos.

mod error;
mod memory;
mod traits;

pub use error::LedgerError;
pub use memory::MemoryLedger;
pub use traits::{Claim, ClaimLedger, Identity, Link, LINK_PREFIX};

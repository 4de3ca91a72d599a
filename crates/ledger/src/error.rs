/// All errors that can be returned by a ClaimLedger implementation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No claim exists under the given link.
    #[error("unknown claim link: {link}")]
    UnknownLink { link: String },

    /// The identity is not known to this ledger.
    #[error("unknown identity: {did}")]
    UnknownIdentity { did: String },

    /// A backend-specific failure (connection, serialization, etc.).
    #[error("ledger backend error: {0}")]
    Backend(String),
}

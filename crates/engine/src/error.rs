use nomos_core::ModelError;
use nomos_ledger::LedgerError;

/// All errors that can surface from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The named act does not exist in the case's model.
    #[error("act '{act}' not found in model")]
    ActNotFound { act: String },

    /// Taking the act was refused. `reasons` lists which admissibility
    /// components came out false; it is empty when the outcome was
    /// undefined rather than false.
    #[error("act '{act}' is not allowed (invalid: {reasons:?})")]
    NotAllowed { act: String, reasons: Vec<String> },

    /// A resolver answered a creating-act disambiguation with a link
    /// that was not among the offered candidates.
    #[error("resolver chose '{link}' for fact '{fact}', which is not a candidate creating act")]
    InvalidDisambiguation { fact: String, link: String },

    /// A claim read from the ledger does not have the shape the engine
    /// expects (missing record key, non-object facts-supplied, etc.).
    #[error("malformed claim: {message}")]
    MalformedClaim { message: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    pub(crate) fn malformed_claim(message: impl Into<String>) -> Self {
        EngineError::MalformedClaim {
            message: message.into(),
        }
    }
}

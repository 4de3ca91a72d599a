/// Errors raised while decoding model or expression payloads.
///
/// An unknown expression tag is a malformed model, not a runtime
/// condition to recover from, so it gets its own variant and callers
/// surface it immediately.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// An expression object carries a tag the engine does not know.
    #[error("unknown expression type {tag}")]
    UnknownExpression { tag: String },

    /// A model/act/fact/duty payload is structurally malformed.
    #[error("malformed model payload: {message}")]
    Malformed { message: String },
}

impl ModelError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ModelError::Malformed {
            message: message.into(),
        }
    }
}

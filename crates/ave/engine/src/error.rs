use ave_types::TypesError;
use thiserror::Error;

/// Errors raised by the translator, lifecycle and normalizer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input; nothing was changed.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid spec transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the caller can fix the request and retry.
    pub fn is_caller_error(&self) -> bool {
        match self {
            Self::Validation(_) | Self::InvalidTransition { .. } => true,
            Self::Types(TypesError::Serialization(_)) => false,
            Self::Types(_) => true,
        }
    }
}

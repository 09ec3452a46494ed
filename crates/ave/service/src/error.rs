use ave_engine::EngineError;
use ave_storage::StorageError;
use ave_types::TypesError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by [`crate::VerificationService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is malformed or not allowed in the current state.
    #[error("validation error: {0}")]
    Validation(String),

    /// Duplicate or concurrently modified entity.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_caller_correctable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// Message safe to hand to a remote caller. Internal detail stays in logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::Conflict(msg) | StorageError::InvariantViolation(msg) => {
                Self::Conflict(msg)
            }
            StorageError::InvalidInput(msg) => Self::Validation(msg),
            StorageError::Serialization(msg) | StorageError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        if err.is_caller_error() {
            Self::Validation(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<TypesError> for ServiceError {
    fn from(err: TypesError) -> Self {
        EngineError::from(err).into()
    }
}

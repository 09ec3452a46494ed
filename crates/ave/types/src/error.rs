use thiserror::Error;

/// Errors raised while building or decoding AVE entities.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid hex length: {0} (expected 64)")]
    InvalidHashLength(usize),

    #[error("invalid hex character in content hash")]
    InvalidHex,

    #[error("invalid spec body: {0}")]
    InvalidSpecBody(String),

    #[error("payload does not match {expected} shape: {reason}")]
    ShapeMismatch { expected: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TypesError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

use thiserror::Error;

/// Errors that can arise inside the progression engine and its storage layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, seed files, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Referenced user, quest, or progress record is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied value is outside the accepted range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An exchange or debit exceeds the user's holdings.
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: u64, available: u64 },

    /// A commit kept colliding with concurrent writers and ran out of retries.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },
}

impl EngineError {
    /// True for errors the caller can fix by changing the request
    /// (as opposed to storage faults the caller should retry or report).
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::InvalidInput(_)
                | EngineError::InsufficientBalance { .. }
        )
    }
}

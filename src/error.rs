use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdempotencyError>;
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Faults surfaced by the engine. Callers own the user-visible behavior;
/// the engine returns these without logging or swallowing them.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// A live reservation with a matching fingerprint exists for this key.
    #[error("a request with this idempotency key is already being processed")]
    RequestInProgress,

    /// The key is already bound to a request with a different fingerprint.
    #[error("idempotency key was reused for a different request payload")]
    KeyConflict,

    #[error("idempotency key exceeds the maximum length of {max} characters")]
    KeyTooLong { max: usize },

    /// No key could be extracted and the configuration mandates one.
    #[error("idempotency key is required but missing from the request")]
    MissingKey,

    /// The storage backend failed; callers decide fail-open vs fail-closed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IdempotencyError {
    /// True for faults caused by the client's use of the key, as opposed
    /// to infrastructure faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IdempotencyError::KeyConflict
                | IdempotencyError::KeyTooLong { .. }
                | IdempotencyError::MissingKey
        )
    }

    /// Suggested HTTP status code for framework collaborators.
    pub fn status_hint(&self) -> u16 {
        match self {
            IdempotencyError::RequestInProgress => 409,
            IdempotencyError::KeyConflict => 422,
            IdempotencyError::KeyTooLong { .. } => 400,
            IdempotencyError::MissingKey => 400,
            IdempotencyError::Storage(_) => 500,
        }
    }

    /// Suggested client back-off before retrying, where one applies.
    pub fn retry_after_hint(&self) -> Option<Duration> {
        match self {
            IdempotencyError::RequestInProgress => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

/// Failures raised by storage adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

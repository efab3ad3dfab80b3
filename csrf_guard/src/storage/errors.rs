use thiserror::Error;

/// Failures reported by a token store backend.
///
/// A store failure is deliberately distinct from a validation mismatch: it
/// means "could not determine whether the token matched", and the caller's
/// fail-open/fail-closed policy decides what happens next.
#[derive(Debug, Error, Clone)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Crate-level error type.
///
/// `Config` aborts initialization; `Storage` means the backing store could
/// not answer, which is distinct from any validation verdict; `Crypto` means
/// the secure random source failed outright.
#[derive(Debug, Error, Clone)]
pub enum CsrfError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Crypto error: {0}")]
    Crypto(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        // Given a fatal configuration error
        let error: CsrfError = ConfigError::TokenLength(2).into();

        // Then it surfaces as a Config variant
        assert!(matches!(error, CsrfError::Config(_)));
        assert!(error.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_storage_error_conversion() {
        // Given a store failure
        let error: CsrfError = StorageError::Storage("unreachable".to_string()).into();

        // Then it stays distinguishable from a mismatch verdict
        assert!(matches!(error, CsrfError::Storage(_)));
    }

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<CsrfError>();
    }
}

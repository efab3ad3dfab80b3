use super::types::{InMemoryTokenStore, RedisTokenStore, TokenStore};
use crate::storage::errors::StorageError;

/// Startup-time registry mapping configuration keys to store implementations.
///
/// Supported types are `memory` and `redis`; `redis` requires a connection
/// URL. The store is verified with `init` before it is handed out, so a
/// misconfigured backend fails at startup instead of on the first request.
pub async fn token_store_from_type(
    store_type: &str,
    store_url: Option<&str>,
) -> Result<Box<dyn TokenStore>, StorageError> {
    tracing::info!("Initializing token store with type: {}", store_type);

    let store: Box<dyn TokenStore> = match store_type {
        "memory" => Box::new(InMemoryTokenStore::new()),
        "redis" => {
            let url = store_url.ok_or_else(|| {
                StorageError::Storage(
                    "Token store type 'redis' requires a store URL".to_string(),
                )
            })?;
            let client = redis::Client::open(url)
                .map_err(|e| StorageError::Storage(format!("Failed to create Redis client: {e}")))?;
            Box::new(RedisTokenStore { client })
        }
        t => {
            return Err(StorageError::Storage(format!(
                "Unsupported token store type: {t}. Supported types are 'memory' and 'redis'"
            )));
        }
    };

    store.init().await?;
    tracing::info!("Connected to token store: type={}", store_type);

    Ok(store)
}

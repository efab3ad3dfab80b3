use async_trait::async_trait;
use redis::{self, AsyncCommands};

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;
use crate::token::{TokenRecord, TokenScope};

use super::types::{RedisTokenStore, TokenStore};

const STORE_PREFIX: &str = "csrf";

impl RedisTokenStore {
    fn make_key(session_id: &str, scope: &TokenScope) -> String {
        format!("{STORE_PREFIX}:{session_id}:{}", scope.storage_key())
    }

    fn session_pattern(session_id: &str) -> String {
        format!("{STORE_PREFIX}:{session_id}:*")
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn init(&self) -> Result<(), StorageError> {
        // Verify the connection works
        let _conn = self.client.get_multiplexed_async_connection().await?;
        Ok(())
    }

    async fn get(
        &self,
        session_id: &str,
        scope: &TokenScope,
    ) -> Result<Option<TokenRecord>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::make_key(session_id, scope);
        let value: Option<String> = conn.get(&key).await?;

        match value {
            Some(v) => {
                let data: CacheData = serde_json::from_str(&v)?;
                Ok(Some(data.try_into()?))
            }
            None => Ok(None),
        }
    }

    async fn put(
        &mut self,
        session_id: &str,
        scope: &TokenScope,
        record: TokenRecord,
    ) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::make_key(session_id, scope);
        let data: CacheData = record.try_into()?;
        let value = serde_json::to_string(&data)?;
        let _: () = conn.set(&key, value).await?;
        Ok(())
    }

    async fn remove(&mut self, session_id: &str, scope: &TokenScope) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::make_key(session_id, scope);
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn remove_all(&mut self, session_id: &str) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // Teardown is rare relative to validation, so a pattern sweep is fine.
        let pattern = Self::session_pattern(session_id);
        let keys: Vec<String> = conn.keys(&pattern).await?;

        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }
}

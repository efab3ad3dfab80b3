use async_trait::async_trait;
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;
use crate::token::{TokenRecord, TokenScope};

pub struct InMemoryTokenStore {
    pub(super) entry: HashMap<String, CacheData>,
}

pub struct RedisTokenStore {
    pub(super) client: redis::Client,
}

/// Durable mapping from (logical session id, scope) to a token record.
///
/// The lifecycle manager brackets its read → compare → write sequence under a
/// single lock per store instance, so a backend only has to provide
/// read-your-writes consistency for one logical session. Deployments sharing
/// a distributed backend between processes must additionally serialize that
/// sequence per key on their side.
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    /// Initialize the store. Called once when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Fetch the record for a scope, if any.
    async fn get(
        &self,
        session_id: &str,
        scope: &TokenScope,
    ) -> Result<Option<TokenRecord>, StorageError>;

    /// Write the record for a scope, replacing any existing one.
    async fn put(
        &mut self,
        session_id: &str,
        scope: &TokenScope,
        record: TokenRecord,
    ) -> Result<(), StorageError>;

    /// Drop the record for a single scope.
    async fn remove(&mut self, session_id: &str, scope: &TokenScope) -> Result<(), StorageError>;

    /// Drop every record owned by a logical session. Invoked from the
    /// session teardown hook.
    async fn remove_all(&mut self, session_id: &str) -> Result<(), StorageError>;
}

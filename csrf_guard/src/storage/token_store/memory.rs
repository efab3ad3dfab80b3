use async_trait::async_trait;
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::token::{TokenRecord, TokenScope};

use super::types::{InMemoryTokenStore, TokenStore};

const STORE_PREFIX: &str = "csrf";

impl InMemoryTokenStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory token store");
        Self {
            entry: HashMap::new(),
        }
    }

    fn make_key(session_id: &str, scope: &TokenScope) -> String {
        format!("{STORE_PREFIX}:{session_id}:{}", scope.storage_key())
    }

    fn session_prefix(session_id: &str) -> String {
        format!("{STORE_PREFIX}:{session_id}:")
    }
}

impl Default for InMemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn get(
        &self,
        session_id: &str,
        scope: &TokenScope,
    ) -> Result<Option<TokenRecord>, StorageError> {
        let key = Self::make_key(session_id, scope);
        self.entry
            .get(&key)
            .cloned()
            .map(TokenRecord::try_from)
            .transpose()
    }

    async fn put(
        &mut self,
        session_id: &str,
        scope: &TokenScope,
        record: TokenRecord,
    ) -> Result<(), StorageError> {
        let key = Self::make_key(session_id, scope);
        self.entry.insert(key, record.try_into()?);
        Ok(())
    }

    async fn remove(&mut self, session_id: &str, scope: &TokenScope) -> Result<(), StorageError> {
        let key = Self::make_key(session_id, scope);
        self.entry.remove(&key);
        Ok(())
    }

    async fn remove_all(&mut self, session_id: &str) -> Result<(), StorageError> {
        let prefix = Self::session_prefix(session_id);
        self.entry.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key() {
        // Given a session id and a page scope
        let scope = TokenScope::Page("/admin/save".to_string());

        // When creating a key
        let result = InMemoryTokenStore::make_key("sess123", &scope);

        // Then it should be namespaced under the session
        assert_eq!(result, "csrf:sess123:page:/admin/save");
    }

    #[tokio::test]
    async fn test_put_and_get() {
        // Given an in-memory token store
        let mut store = InMemoryTokenStore::new();
        let scope = TokenScope::Session;

        // When putting a record
        store
            .put("sess1", &scope, TokenRecord::new("TOKEN1".to_string()))
            .await
            .expect("put should succeed");

        // Then the same record comes back
        let record = store.get("sess1", &scope).await.expect("get should succeed");
        assert_eq!(record.expect("record should exist").current, "TOKEN1");
    }

    #[tokio::test]
    async fn test_get_nonexistent_record() {
        // Given an empty store
        let store = InMemoryTokenStore::new();

        // When getting a record that was never written
        let result = store.get("sess1", &TokenScope::Session).await;

        // Then it should return None without error
        assert!(result.expect("get should succeed").is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_record() {
        // Given a store with an existing record
        let mut store = InMemoryTokenStore::new();
        let scope = TokenScope::Session;
        store
            .put("sess1", &scope, TokenRecord::new("OLD".to_string()))
            .await
            .unwrap();

        // When putting a new record under the same key
        store
            .put("sess1", &scope, TokenRecord::new("NEW".to_string()))
            .await
            .unwrap();

        // Then only the new record is retrievable
        let record = store.get("sess1", &scope).await.unwrap().unwrap();
        assert_eq!(record.current, "NEW");
    }

    #[tokio::test]
    async fn test_remove() {
        // Given a store with a record
        let mut store = InMemoryTokenStore::new();
        let scope = TokenScope::Page("/a".to_string());
        store
            .put("sess1", &scope, TokenRecord::new("T".to_string()))
            .await
            .unwrap();

        // When removing it
        store.remove("sess1", &scope).await.unwrap();

        // Then it is gone
        assert!(store.get("sess1", &scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_all_scoped_to_one_session() {
        // Given records for two sessions across both scope kinds
        let mut store = InMemoryTokenStore::new();
        let page = TokenScope::Page("/a".to_string());
        store
            .put("sess1", &TokenScope::Session, TokenRecord::new("S1".to_string()))
            .await
            .unwrap();
        store
            .put("sess1", &page, TokenRecord::new("P1".to_string()))
            .await
            .unwrap();
        store
            .put("sess2", &TokenScope::Session, TokenRecord::new("S2".to_string()))
            .await
            .unwrap();

        // When tearing down the first session
        store.remove_all("sess1").await.unwrap();

        // Then only the other session's records survive
        assert!(store.get("sess1", &TokenScope::Session).await.unwrap().is_none());
        assert!(store.get("sess1", &page).await.unwrap().is_none());
        assert!(store.get("sess2", &TokenScope::Session).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scope_isolation_within_session() {
        // Given session and page records for the same session
        let mut store = InMemoryTokenStore::new();
        let page = TokenScope::Page("/admin/save".to_string());
        store
            .put("sess1", &TokenScope::Session, TokenRecord::new("S".to_string()))
            .await
            .unwrap();
        store
            .put("sess1", &page, TokenRecord::new("P".to_string()))
            .await
            .unwrap();

        // Then each scope keeps its own token
        let session = store.get("sess1", &TokenScope::Session).await.unwrap().unwrap();
        let page_record = store.get("sess1", &page).await.unwrap().unwrap();
        assert_eq!(session.current, "S");
        assert_eq!(page_record.current, "P");
    }
}

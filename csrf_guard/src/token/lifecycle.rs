use std::sync::Arc;

use chrono::{Duration, Utc};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::errors::CsrfError;
use crate::storage::TokenStore;

use super::random::TokenGenerator;
use super::types::{TokenRecord, TokenScope};

/// Outcome of comparing a presented token against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenCheck {
    /// Presented token equals the current token.
    MatchCurrent,
    /// Presented token equals the previous token inside its tolerance
    /// window, i.e. a request that was in flight across a rotation.
    MatchPrevious,
    /// A record exists but the presented token matches neither slot.
    Mismatch,
    /// No record exists for the scope.
    Absent,
}

impl TokenCheck {
    pub(crate) fn is_match(self) -> bool {
        matches!(self, TokenCheck::MatchCurrent | TokenCheck::MatchPrevious)
    }
}

/// Generates, rotates and expires tokens for (session, scope) pairs.
///
/// All store access goes through one `Mutex`, and [`check_and_rotate`]
/// performs its read → compare → rotate → write sequence under a single
/// guard, so concurrent validations on the same pair are serialized.
///
/// [`check_and_rotate`]: TokenLifecycle::check_and_rotate
pub(crate) struct TokenLifecycle {
    store: Arc<Mutex<Box<dyn TokenStore>>>,
    generator: TokenGenerator,
    tolerance: Duration,
}

fn tokens_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

impl TokenLifecycle {
    pub(crate) fn new(
        store: Arc<Mutex<Box<dyn TokenStore>>>,
        generator: TokenGenerator,
        tolerance: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            tolerance,
        }
    }

    /// Return the current token for a scope, generating one if absent.
    ///
    /// Calling this twice without an intervening rotation returns the same
    /// token both times.
    pub(crate) async fn ensure(
        &self,
        session_id: &str,
        scope: &TokenScope,
    ) -> Result<String, CsrfError> {
        let mut store = self.store.lock().await;

        if let Some(record) = store.get(session_id, scope).await? {
            return Ok(record.current);
        }

        let token = self.generator.generate()?;
        store
            .put(session_id, scope, TokenRecord::new(token.clone()))
            .await?;
        tracing::debug!("Created token for session={session_id} scope={scope:?}");
        Ok(token)
    }

    /// Eagerly create tokens for the given pages, e.g. every concrete
    /// protected page at session start when precreation is enabled.
    pub(crate) async fn precreate(
        &self,
        session_id: &str,
        pages: impl IntoIterator<Item = &str>,
    ) -> Result<(), CsrfError> {
        for page in pages {
            self.ensure(session_id, &TokenScope::Page(page.to_string()))
                .await?;
        }
        Ok(())
    }

    /// Move the current token into the previous slot (honored until now +
    /// tolerance) and issue a fresh current token.
    pub(crate) async fn rotate(
        &self,
        session_id: &str,
        scope: &TokenScope,
    ) -> Result<String, CsrfError> {
        let mut store = self.store.lock().await;
        self.rotate_locked(&mut store, session_id, scope).await
    }

    /// Check whether the presented token satisfies validation for the scope.
    pub(crate) async fn validate(
        &self,
        session_id: &str,
        scope: &TokenScope,
        presented: &str,
    ) -> Result<bool, CsrfError> {
        let store = self.store.lock().await;
        let record = store.get(session_id, scope).await?;
        Ok(Self::check(record.as_ref(), presented).is_match())
    }

    /// Validate and, on success with rotation enabled, rotate, all under one
    /// store guard so concurrent requests on the same (session, scope) pair
    /// cannot interleave between the read and the rotated write.
    ///
    /// Only a current-token match rotates. A previous-slot match is a
    /// concurrent in-flight request; rotating again would evict the token the
    /// winning request just received.
    pub(crate) async fn check_and_rotate(
        &self,
        session_id: &str,
        scope: &TokenScope,
        presented: &str,
        rotate: bool,
    ) -> Result<(TokenCheck, Option<String>), CsrfError> {
        let mut store = self.store.lock().await;

        let record = store.get(session_id, scope).await?;
        let check = Self::check(record.as_ref(), presented);

        let rotated = if check == TokenCheck::MatchCurrent && rotate {
            Some(self.rotate_locked(&mut store, session_id, scope).await?)
        } else {
            None
        };

        Ok((check, rotated))
    }

    /// Session teardown hook: evict every record the session owns.
    pub(crate) async fn end_session(&self, session_id: &str) -> Result<(), CsrfError> {
        let mut store = self.store.lock().await;
        store.remove_all(session_id).await?;
        tracing::debug!("Evicted all tokens for session={session_id}");
        Ok(())
    }

    fn check(record: Option<&TokenRecord>, presented: &str) -> TokenCheck {
        let Some(record) = record else {
            return TokenCheck::Absent;
        };

        if tokens_match(presented, &record.current) {
            return TokenCheck::MatchCurrent;
        }
        if let Some(previous) = record.previous_if_live(Utc::now())
            && tokens_match(presented, previous)
        {
            return TokenCheck::MatchPrevious;
        }
        TokenCheck::Mismatch
    }

    async fn rotate_locked(
        &self,
        store: &mut tokio::sync::MutexGuard<'_, Box<dyn TokenStore>>,
        session_id: &str,
        scope: &TokenScope,
    ) -> Result<String, CsrfError> {
        let token = self.generator.generate()?;

        let record = match store.get(session_id, scope).await? {
            Some(old) => TokenRecord {
                current: token.clone(),
                created_at: Utc::now(),
                previous: Some(old.current),
                previous_expires_at: Some(Utc::now() + self.tolerance),
            },
            None => TokenRecord::new(token.clone()),
        };

        store.put(session_id, scope, record).await?;
        tracing::debug!("Rotated token for session={session_id} scope={scope:?}");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryTokenStore;
    use std::time::Duration as StdDuration;

    fn lifecycle(tolerance_ms: i64) -> TokenLifecycle {
        let store: Box<dyn TokenStore> = Box::new(InMemoryTokenStore::new());
        TokenLifecycle::new(
            Arc::new(Mutex::new(store)),
            TokenGenerator::new(32, None, None),
            Duration::milliseconds(tolerance_ms),
        )
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        // Given a lifecycle manager
        let lifecycle = lifecycle(2000);

        // When ensuring the same scope twice without a rotation
        let first = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();
        let second = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();

        // Then the identical token comes back both times
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ensure_isolates_scopes() {
        // Given a lifecycle manager
        let lifecycle = lifecycle(2000);

        // When ensuring the session scope and a page scope
        let session = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();
        let page = lifecycle
            .ensure("sess1", &TokenScope::Page("/admin/save".to_string()))
            .await
            .unwrap();

        // Then each scope gets its own token
        assert_ne!(session, page);
    }

    #[tokio::test]
    async fn test_validate_accepts_current_token() {
        // Given an issued token
        let lifecycle = lifecycle(2000);
        let token = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();

        // Then validation accepts it
        assert!(
            lifecycle
                .validate("sess1", &TokenScope::Session, &token)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_validate_rejects_absent_record() {
        // Given no stored record at all
        let lifecycle = lifecycle(2000);

        // Then validation reports a mismatch, not an error
        assert!(
            !lifecycle
                .validate("sess1", &TokenScope::Session, "ANYTHING")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_validate_rejects_wrong_token() {
        // Given an issued token
        let lifecycle = lifecycle(2000);
        lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();

        // Then a different value is rejected
        assert!(
            !lifecycle
                .validate("sess1", &TokenScope::Session, "WRONGTOKEN0000000000000000000000")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_rotation_keeps_old_token_inside_tolerance_window() {
        // Given an issued token and a 2 second tolerance
        let lifecycle = lifecycle(2000);
        let old = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();

        // When rotating
        let new = lifecycle.rotate("sess1", &TokenScope::Session).await.unwrap();
        assert_ne!(old, new);

        // Then both the new and the pre-rotation token validate inside the window
        assert!(lifecycle.validate("sess1", &TokenScope::Session, &new).await.unwrap());
        assert!(lifecycle.validate("sess1", &TokenScope::Session, &old).await.unwrap());
    }

    #[tokio::test]
    async fn test_old_token_rejected_after_tolerance_elapses() {
        // Given a rotation with a 50ms tolerance window
        let lifecycle = lifecycle(50);
        let old = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();
        lifecycle.rotate("sess1", &TokenScope::Session).await.unwrap();

        // When the window elapses
        tokio::time::sleep(StdDuration::from_millis(120)).await;

        // Then the pre-rotation token no longer validates
        assert!(
            !lifecycle
                .validate("sess1", &TokenScope::Session, &old)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_double_rotation_drops_oldest_token() {
        // Given two consecutive rotations
        let lifecycle = lifecycle(2000);
        let first = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();
        lifecycle.rotate("sess1", &TokenScope::Session).await.unwrap();
        lifecycle.rotate("sess1", &TokenScope::Session).await.unwrap();

        // Then only one previous token is retained; the oldest is gone
        assert!(
            !lifecycle
                .validate("sess1", &TokenScope::Session, &first)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_check_and_rotate_returns_new_token_on_match() {
        // Given an issued token
        let lifecycle = lifecycle(2000);
        let token = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();

        // When validating with rotation enabled
        let (check, rotated) = lifecycle
            .check_and_rotate("sess1", &TokenScope::Session, &token, true)
            .await
            .unwrap();

        // Then the check matches and a fresh token was issued
        assert_eq!(check, TokenCheck::MatchCurrent);
        let rotated = rotated.expect("rotation should issue a new token");
        assert_ne!(rotated, token);
        assert!(
            lifecycle
                .validate("sess1", &TokenScope::Session, &rotated)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_check_and_rotate_does_not_rotate_on_mismatch() {
        // Given an issued token
        let lifecycle = lifecycle(2000);
        let token = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();

        // When validating a wrong token with rotation enabled
        let (check, rotated) = lifecycle
            .check_and_rotate("sess1", &TokenScope::Session, "NOPE", true)
            .await
            .unwrap();

        // Then no rotation happens and the original token stays current
        assert_eq!(check, TokenCheck::Mismatch);
        assert!(rotated.is_none());
        assert!(
            lifecycle
                .validate("sess1", &TokenScope::Session, &token)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_check_and_rotate_reports_absent_record() {
        // Given no stored record
        let lifecycle = lifecycle(2000);

        // When validating
        let (check, rotated) = lifecycle
            .check_and_rotate("sess1", &TokenScope::Session, "ANY", true)
            .await
            .unwrap();

        // Then the absence is reported distinctly from a mismatch
        assert_eq!(check, TokenCheck::Absent);
        assert!(rotated.is_none());
    }

    #[tokio::test]
    async fn test_precreate_issues_tokens_for_every_page() {
        // Given declared protected pages
        let lifecycle = lifecycle(2000);
        let pages = ["/admin/save", "/admin/delete"];

        // When precreating at session start
        lifecycle.precreate("sess1", pages).await.unwrap();

        // Then ensure returns an existing token for each page without a visit
        for page in pages {
            let scope = TokenScope::Page(page.to_string());
            let token = lifecycle.ensure("sess1", &scope).await.unwrap();
            assert_eq!(token, lifecycle.ensure("sess1", &scope).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_end_session_evicts_every_scope() {
        // Given session and page tokens
        let lifecycle = lifecycle(2000);
        let session_token = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();
        let page_scope = TokenScope::Page("/admin/save".to_string());
        let page_token = lifecycle.ensure("sess1", &page_scope).await.unwrap();

        // When the session ends
        lifecycle.end_session("sess1").await.unwrap();

        // Then neither token validates any more
        assert!(
            !lifecycle
                .validate("sess1", &TokenScope::Session, &session_token)
                .await
                .unwrap()
        );
        assert!(!lifecycle.validate("sess1", &page_scope, &page_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_validations_on_same_scope_are_serialized() {
        // Given one issued token shared by concurrent requests
        let store: Box<dyn TokenStore> = Box::new(InMemoryTokenStore::new());
        let lifecycle = Arc::new(TokenLifecycle::new(
            Arc::new(Mutex::new(store)),
            TokenGenerator::new(32, None, None),
            Duration::seconds(5),
        ));
        let token = lifecycle.ensure("sess1", &TokenScope::Session).await.unwrap();

        // When several tasks validate-and-rotate with the same token at once
        let mut handles = Vec::new();
        for _ in 0..5 {
            let lifecycle = Arc::clone(&lifecycle);
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                lifecycle
                    .check_and_rotate("sess1", &TokenScope::Session, &token, true)
                    .await
                    .unwrap()
                    .0
            }));
        }

        // Then every request succeeds: the first rotation parks the token in
        // the previous slot, the tolerance window absorbs the rest, and a
        // previous-slot match does not rotate again
        for handle in handles {
            assert!(handle.await.unwrap().is_match());
        }
    }
}

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;

use crate::config::{ActionRecord, CsrfConfig};
use crate::errors::CsrfError;
use crate::policy::{Disposition, PolicyMatcher};
use crate::session::SessionIdentityResolver;
use crate::storage::{TokenStore, token_store_from_type};
use crate::token::{TokenCheck, TokenGenerator, TokenLifecycle, TokenScope};

use super::types::{BypassReason, InvalidReason, RequestContext, Verdict, ViolationReport};

/// Orchestrates one validation per inbound request: policy matching, session
/// resolution, origin check, token comparison and optional rotation.
///
/// The validator is cheap to share across request handlers; rule sets are
/// immutable and the token store is the only guarded resource.
pub struct CsrfValidator {
    config: CsrfConfig,
    matcher: PolicyMatcher,
    lifecycle: TokenLifecycle,
    resolver: Arc<dyn SessionIdentityResolver>,
}

impl CsrfValidator {
    pub fn new(
        config: CsrfConfig,
        resolver: Arc<dyn SessionIdentityResolver>,
        store: Box<dyn TokenStore>,
    ) -> Self {
        if config.print_config {
            config.log();
        }

        let matcher = PolicyMatcher::new(&config);
        let generator = TokenGenerator::new(
            config.token_length,
            config.prng_algorithm.as_deref(),
            config.prng_provider.as_deref(),
        );
        let lifecycle = TokenLifecycle::new(
            Arc::new(Mutex::new(store)),
            generator,
            Duration::seconds(config.tolerance_seconds as i64),
        );

        Self {
            config,
            matcher,
            lifecycle,
            resolver,
        }
    }

    /// Build a validator entirely from `CSRF_*` environment variables,
    /// including the token store selection.
    pub async fn from_env(resolver: Arc<dyn SessionIdentityResolver>) -> Result<Self, CsrfError> {
        let config = CsrfConfig::from_env()?;
        let store = token_store_from_type(
            &config.token_store_type,
            config.token_store_url.as_deref(),
        )
        .await?;
        Ok(Self::new(config, resolver, store))
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    pub fn matcher(&self) -> &PolicyMatcher {
        &self.matcher
    }

    /// Configured violation actions, in execution order. On an invalid
    /// verdict the caller hands the report to each of these in turn.
    pub fn actions(&self) -> &[ActionRecord] {
        &self.config.actions
    }

    /// Evaluate a request. A store failure surfaces as `Err`, never as an
    /// invalid verdict, so callers can apply their fail-open/fail-closed
    /// policy.
    pub async fn evaluate(&self, request: &RequestContext) -> Result<Verdict, CsrfError> {
        if !self.config.enabled {
            return Ok(Verdict::Bypass(BypassReason::Disabled));
        }

        if self.is_banned_user_agent(request.user_agent.as_deref()) {
            tracing::debug!("Bypassing validation for banned user agent");
            return Ok(Verdict::Bypass(BypassReason::BannedUserAgent));
        }

        let normalized = self.matcher.normalize_path(&request.path);

        if let Some(landing) = &self.config.new_token_landing_page
            && normalized == self.matcher.normalize_path(landing)
        {
            return Ok(Verdict::Bypass(BypassReason::NewTokenLandingPage));
        }

        if self.matcher.classify(&request.path, &request.method) == Disposition::Unprotected {
            return Ok(Verdict::Bypass(BypassReason::UnprotectedResource));
        }

        if !self.config.validate_when_no_session && !self.resolver.exists(request) {
            // A token cannot exist yet for a first-touch request.
            return Ok(Verdict::Bypass(BypassReason::NoSession));
        }

        let session_id = self.resolver.resolve(request);

        // The origin check runs before any token lookup so an origin
        // violation never reveals token state.
        if let Some(expected) = &self.config.domain_origin
            && request.origin.as_deref() != Some(expected.as_str())
        {
            return Ok(self.invalid(InvalidReason::OriginMismatch, &normalized, request, session_id));
        }

        let Some(session_id) = session_id else {
            return Ok(self.invalid(InvalidReason::MissingToken, &normalized, request, None));
        };

        let scope = if self.config.token_per_page {
            TokenScope::Page(normalized.clone())
        } else {
            TokenScope::Session
        };

        let Some(presented) = request.presented_token.as_deref() else {
            return Ok(self.invalid(
                InvalidReason::MissingToken,
                &normalized,
                request,
                Some(session_id),
            ));
        };

        let (check, rotated) = self
            .lifecycle
            .check_and_rotate(&session_id, &scope, presented, self.config.rotate)
            .await?;

        let verdict = match check {
            _ if check.is_match() => {
                tracing::debug!("Valid token for session={session_id} path={normalized}");
                Verdict::Valid { rotated }
            }
            TokenCheck::Absent => {
                self.invalid(InvalidReason::MissingToken, &normalized, request, Some(session_id))
            }
            _ => self.invalid(
                InvalidReason::SessionMismatch,
                &normalized,
                request,
                Some(session_id),
            ),
        };
        Ok(verdict)
    }

    /// Current token for the scope a path resolves to, creating it if
    /// absent. Callers use this to inject tokens into responses.
    pub async fn current_token(
        &self,
        session_id: &str,
        path: Option<&str>,
    ) -> Result<String, CsrfError> {
        let scope = match path {
            Some(path) if self.config.token_per_page => {
                TokenScope::Page(self.matcher.normalize_path(path))
            }
            _ => TokenScope::Session,
        };
        self.lifecycle.ensure(session_id, &scope).await
    }

    /// Session start hook: issues the session token and, when per-page
    /// precreation is enabled, a token for every declared concrete protected
    /// page.
    pub async fn session_started(&self, session_id: &str) -> Result<(), CsrfError> {
        self.lifecycle.ensure(session_id, &TokenScope::Session).await?;

        if self.config.token_per_page && self.config.token_per_page_precreate {
            self.lifecycle
                .precreate(session_id, self.matcher.concrete_protected_pages())
                .await?;
        }
        Ok(())
    }

    /// Session teardown hook: evicts every record the session owns.
    pub async fn session_terminated(&self, session_id: &str) -> Result<(), CsrfError> {
        self.lifecycle.end_session(session_id).await
    }

    fn is_banned_user_agent(&self, user_agent: Option<&str>) -> bool {
        let Some(user_agent) = user_agent else {
            return false;
        };
        let user_agent = user_agent.to_ascii_lowercase();
        self.config
            .banned_user_agents
            .iter()
            .any(|banned| user_agent.contains(&banned.to_ascii_lowercase()))
    }

    fn invalid(
        &self,
        reason: InvalidReason,
        normalized_path: &str,
        request: &RequestContext,
        session_id: Option<String>,
    ) -> Verdict {
        tracing::warn!(
            reason = reason.as_str(),
            path = normalized_path,
            method = %request.method,
            "CSRF validation failed"
        );
        Verdict::Invalid(ViolationReport {
            reason,
            path: normalized_path.to_string(),
            method: request.method.clone(),
            session_id,
        })
    }
}

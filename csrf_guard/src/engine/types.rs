use http::Method;

/// The engine's view of an inbound request, assembled by the surrounding
/// HTTP layer. The presented token is whatever the caller extracted from the
/// configured header, parameter or form field.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub method: Method,
    pub presented_token: Option<String>,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
            presented_token: None,
            origin: None,
            user_agent: None,
            session_id: None,
        }
    }

    pub fn presented_token(mut self, token: impl Into<String>) -> Self {
        self.presented_token = Some(token.into());
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Why a request was exempted from validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    Disabled,
    UnprotectedResource,
    BannedUserAgent,
    NoSession,
    NewTokenLandingPage,
}

/// Reason code attached to an invalid verdict, as consumed by the violation
/// action pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    MissingToken,
    SessionMismatch,
    OriginMismatch,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::MissingToken => "missing-token",
            InvalidReason::SessionMismatch => "session-mismatch",
            InvalidReason::OriginMismatch => "origin-mismatch",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the violation action pipeline needs about a failed validation.
#[derive(Debug, Clone)]
pub struct ViolationReport {
    pub reason: InvalidReason,
    pub path: String,
    pub method: Method,
    pub session_id: Option<String>,
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Validation does not apply to this request.
    Bypass(BypassReason),
    /// The presented token satisfied validation. `rotated` carries the newly
    /// issued token when rotation ran.
    Valid { rotated: Option<String> },
    /// Validation failed; the report feeds the configured actions.
    Invalid(ViolationReport),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid { .. })
    }

    pub fn is_bypass(&self) -> bool {
        matches!(self, Verdict::Bypass(_))
    }
}

use crate::engine::RequestContext;

/// Maps an inbound request to a stable logical session identifier,
/// independent of how the surrounding container manages sessions.
///
/// Supplied by the caller at engine construction. The core never creates or
/// destroys sessions through this trait, and must not assume that calling
/// either method creates one as a side effect.
pub trait SessionIdentityResolver: Send + Sync {
    /// The logical session id for this request, if one can be derived.
    fn resolve(&self, request: &RequestContext) -> Option<String>;

    /// Whether a session already exists for this request.
    fn exists(&self, request: &RequestContext) -> bool;
}

/// Resolver for callers that carry the session id directly on the request,
/// e.g. a cookie value extracted by the HTTP layer.
pub struct DirectSessionResolver;

impl SessionIdentityResolver for DirectSessionResolver {
    fn resolve(&self, request: &RequestContext) -> Option<String> {
        request.session_id.clone()
    }

    fn exists(&self, request: &RequestContext) -> bool {
        request.session_id.is_some()
    }
}

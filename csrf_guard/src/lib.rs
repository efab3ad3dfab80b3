//! csrf_guard - Synchronizer-token CSRF protection core
//!
//! This crate decides, for each incoming request, whether CSRF validation
//! applies, which stored token is authoritative, and whether the presented
//! token satisfies validation, including rotation and a tolerance window for
//! legitimately concurrent requests. The surrounding HTTP layer supplies a
//! [`RequestContext`] and a [`SessionIdentityResolver`], and executes the
//! configured violation actions when a verdict is invalid.

mod config;
mod engine;
mod errors;
mod policy;
mod session;
mod storage;
mod token;

pub use config::{ActionRecord, ConfigError, CsrfConfig, CsrfConfigBuilder};
pub use errors::CsrfError;

pub use engine::{
    BypassReason, CsrfValidator, InvalidReason, RequestContext, Verdict, ViolationReport,
};

pub use policy::{Disposition, PolicyMatcher};
pub use session::{DirectSessionResolver, SessionIdentityResolver};
pub use token::{TokenRecord, TokenScope};

pub use storage::{
    CacheData, InMemoryTokenStore, StorageError, TokenStore, token_store_from_type,
};

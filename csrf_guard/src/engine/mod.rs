mod types;
mod validator;

pub use types::{BypassReason, InvalidReason, RequestContext, Verdict, ViolationReport};
pub use validator::CsrfValidator;

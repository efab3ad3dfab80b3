mod matcher;
mod types;

pub use matcher::PolicyMatcher;
pub use types::Disposition;

pub(crate) use types::PageRule;

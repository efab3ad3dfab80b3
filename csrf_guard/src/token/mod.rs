mod lifecycle;
mod random;
mod types;

pub use types::{TokenRecord, TokenScope};

pub(crate) use lifecycle::{TokenCheck, TokenLifecycle};
pub(crate) use random::TokenGenerator;

mod config;
mod memory;
mod redis;
mod types;

pub use config::token_store_from_type;
pub use types::{InMemoryTokenStore, TokenStore};

mod errors;
mod token_store;
mod types;

pub use errors::StorageError;
pub use token_store::{InMemoryTokenStore, TokenStore, token_store_from_type};
pub use types::CacheData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{CacheData, StorageError};

/// Granularity at which a token is issued.
///
/// `Session` keeps one token for the whole logical session; `Page` keeps one
/// token per normalized resource URI when per-page tokens are enabled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Session,
    Page(String),
}

impl TokenScope {
    /// Stable key fragment used by the store backends.
    pub(crate) fn storage_key(&self) -> String {
        match self {
            TokenScope::Session => "session".to_string(),
            TokenScope::Page(uri) => format!("page:{uri}"),
        }
    }
}

/// Stored unit per (logical session, scope).
///
/// Holds the current token and, after a rotation, the previous token together
/// with the instant at which the tolerance window closes. At most one
/// previous token exists, and it is only honored while `previous_expires_at`
/// is in the future.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub current: String,
    pub created_at: DateTime<Utc>,
    pub previous: Option<String>,
    pub previous_expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub(crate) fn new(token: String) -> Self {
        Self {
            current: token,
            created_at: Utc::now(),
            previous: None,
            previous_expires_at: None,
        }
    }

    /// The previous token, if its tolerance window is still open.
    pub(crate) fn previous_if_live(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.previous, self.previous_expires_at) {
            (Some(previous), Some(expires_at)) if now < expires_at => Some(previous.as_str()),
            _ => None,
        }
    }
}

impl TryFrom<TokenRecord> for CacheData {
    type Error = StorageError;

    fn try_from(record: TokenRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            value: serde_json::to_string(&record)?,
        })
    }
}

impl TryFrom<CacheData> for TokenRecord {
    type Error = StorageError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(StorageError::from)
    }
}

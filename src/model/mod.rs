//! Record shapes persisted by the session server on top of the store.
//!
//! Both are plain serde structs; wrap them in [`JsonEntity`](crate::JsonEntity)
//! to store them.

use serde::Deserialize;
use serde::Serialize;

use crate::JsonEntity;

/// Stored under the `user/` store, keyed by account id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub password: String,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
        }
    }
}

/// Issued session token, keyed by the token string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub username: String,
    /// Unix timestamp (seconds)
    pub expires_at: u64,
}

impl Token {
    pub fn is_expired(
        &self,
        now_secs: u64,
    ) -> bool {
        now_secs >= self.expires_at
    }
}

pub type AccountEntity = JsonEntity<Account>;
pub type TokenEntity = JsonEntity<Token>;

//! On-disk shape of `users.json`.
//!
//! Spec section 9 notes users may carry either a single legacy `token_hash`
//! or a list of named `tokens`, and that auth must match against either
//! without callers branching on shape — see `User::token_hashes`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "admin";
pub const READER_ROLE: &str = "reader";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub name: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<TokenRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_rotated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disabled: bool,
}

impl User {
    /// Every hash this user could authenticate with, legacy single token
    /// and named multi-tokens alike. Callers iterate this instead of
    /// branching on which field is populated.
    pub fn token_hashes(&self) -> impl Iterator<Item = &str> {
        let legacy = self.token_hash.as_deref().into_iter();
        let named = self
            .tokens
            .iter()
            .flatten()
            .filter(|t| !t.disabled)
            .map(|t| t.hash.as_str());
        legacy.chain(named)
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

//! Data models for the local store.

use serde::{Deserialize, Serialize};

use crate::remote::MessageRecord;

/// The three independent namespaces of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Keypairs,
    History,
    Secrets,
}

impl Namespace {
    /// Backing table. Only these three static names ever reach SQL.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Keypairs => "keypairs",
            Self::History => "history",
            Self::Secrets => "secrets",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// A user's keypair on this device, both halves in portable JSON form.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKeyPair {
    pub user_id: String,
    pub public_key: String,
    pub private_key: String,
    pub created_at: i64,
}

impl std::fmt::Debug for StoredKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredKeyPair")
            .field("user_id", &self.user_id)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Cached conversation between a user and one friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedHistory {
    pub cache_key: String,
    pub messages: Vec<MessageRecord>,
    pub cached_at: i64,
}

/// Outcome of a TTL-aware read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
    /// The row existed but was past its TTL and has been deleted.
    Expired,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss | Self::Expired => None,
        }
    }
}

/// History cache key: `{user_id}_{friend_id}`.
pub fn history_key(user_id: &str, friend_id: &str) -> String {
    format!("{user_id}_{friend_id}")
}

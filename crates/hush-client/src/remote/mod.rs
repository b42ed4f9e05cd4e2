//! Boundary to the remote backend.
//!
//! The backend is an opaque record store that hands back loosely-typed JSON.
//! Nothing from it travels inward until it has been validated into a
//! [`UserRecord`] or [`MessageRecord`].

mod memory;
mod records;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Error;

pub use memory::MemoryBackend;
pub use records::{KeyEscrowUpdate, MessageKind, MessageRecord, NewMessageRecord, UserRecord};

/// Errors reported by a remote backend implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote backend unavailable: {0}")]
    Unavailable(String),

    #[error("Remote record not found: {0}")]
    NotFound(String),

    #[error("Remote backend rejected the request: {0}")]
    Rejected(String),
}

/// The remote key-value/object store consulted for public keys, key escrow
/// and message records.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Raw user record, or `None` if the user does not exist.
    async fn get_user_record(
        &self,
        user_id: &str,
    ) -> Result<Option<serde_json::Value>, RemoteError>;

    /// Publish the public key and the passphrase-wrapped private key.
    async fn update_user_record(
        &self,
        user_id: &str,
        update: &KeyEscrowUpdate,
    ) -> Result<(), RemoteError>;

    /// Store a message; returns the raw record as persisted.
    async fn create_message_record(
        &self,
        record: &NewMessageRecord,
    ) -> Result<serde_json::Value, RemoteError>;

    /// Every message between the two users, oldest first.
    async fn list_messages(
        &self,
        user_id: &str,
        friend_id: &str,
    ) -> Result<Vec<serde_json::Value>, RemoteError>;
}

/// Fetch and validate a user record. Records that fail validation are
/// quarantined: logged at `warn` and reported as `InvalidRecord`.
pub async fn fetch_user(
    remote: &dyn RemoteBackend,
    user_id: &str,
) -> Result<Option<UserRecord>, Error> {
    let Some(value) = remote.get_user_record(user_id).await? else {
        return Ok(None);
    };
    UserRecord::from_value(value)
        .inspect_err(|e| warn!(user_id, error = %e, "Quarantined invalid user record"))
        .map(Some)
}

//! Stale-while-revalidate cache of conversation history.
//!
//! Callers read the cached copy first, then [`HistoryCache::refresh`] from the
//! backend. The cache is a performance and offline aid only; the backend's
//! order wins on every full refresh.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::remote::{MessageRecord, RemoteBackend};
use crate::storage::{CachedHistory, LocalStore, Lookup, Namespace, history_key};

/// Per-(user, friend) message history over the store's `history` namespace.
pub struct HistoryCache {
    store: LocalStore,
    remote: Arc<dyn RemoteBackend>,
    // Serializes read-modify-write of cache rows so appends are not lost.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for HistoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryCache").finish_non_exhaustive()
    }
}

impl HistoryCache {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteBackend>) -> Self {
        Self {
            store,
            remote,
            write_lock: Mutex::new(()),
        }
    }

    /// Replace the cached history for the pair.
    pub async fn set(
        &self,
        user_id: &str,
        friend_id: &str,
        messages: Vec<MessageRecord>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(user_id, friend_id, messages).await
    }

    /// Cached history, or `None` if absent or older than the TTL.
    pub async fn get(&self, user_id: &str, friend_id: &str) -> Result<Option<Vec<MessageRecord>>> {
        let key = history_key(user_id, friend_id);
        match self.store.lookup::<CachedHistory>(Namespace::History, &key).await? {
            Lookup::Hit(cached) => {
                debug!(key = %key, count = cached.messages.len(), "History cache hit");
                Ok(Some(cached.messages))
            }
            Lookup::Expired => {
                info!(key = %key, "History cache expired");
                Ok(None)
            }
            Lookup::Miss => Ok(None),
        }
    }

    /// Add one observed message, keeping the list ordered by `created_at` and
    /// free of duplicate ids. Returns the updated list.
    pub async fn append(
        &self,
        user_id: &str,
        friend_id: &str,
        message: MessageRecord,
    ) -> Result<Vec<MessageRecord>> {
        let _guard = self.write_lock.lock().await;

        let mut messages = self.get(user_id, friend_id).await?.unwrap_or_default();
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => messages.push(message),
        }
        messages.sort_by_key(|m| m.created_at);

        self.write(user_id, friend_id, messages.clone()).await?;
        Ok(messages)
    }

    /// Fetch the authoritative history and cache it.
    ///
    /// Returns `None` if `cancel` fires first; a cancelled refresh writes
    /// nothing. Records that fail validation are skipped.
    pub async fn refresh(
        &self,
        user_id: &str,
        friend_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<MessageRecord>>> {
        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(user_id, friend_id, "History refresh cancelled");
                return Ok(None);
            }
            fetched = self.remote.list_messages(user_id, friend_id) => fetched?,
        };

        let messages: Vec<MessageRecord> = raw
            .into_iter()
            .filter_map(|value| match MessageRecord::from_value(value) {
                Ok(record) if record.peer_of(user_id) == friend_id => Some(record),
                Ok(record) => {
                    warn!(message_id = %record.id, "Skipping message from another conversation");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Quarantined invalid message record");
                    None
                }
            })
            .collect();

        let _guard = self.write_lock.lock().await;
        if cancel.is_cancelled() {
            debug!(user_id, friend_id, "History refresh cancelled before write");
            return Ok(None);
        }
        self.write(user_id, friend_id, messages.clone()).await?;
        Ok(Some(messages))
    }

    async fn write(&self, user_id: &str, friend_id: &str, messages: Vec<MessageRecord>) -> Result<()> {
        let key = history_key(user_id, friend_id);
        let count = messages.len();
        let cached = CachedHistory {
            cache_key: key.clone(),
            messages,
            cached_at: self.store.now(),
        };
        self.store.put(Namespace::History, &key, &cached).await?;
        debug!(key = %key, count, "History cached");
        Ok(())
    }
}

//! Namespaced key-value queries for the local store.

use hush_crypto::PortableKey;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::db::{LocalStore, StoreError};
use super::models::{Lookup, Namespace, StoredKeyPair};

impl LocalStore {
    // =========================================================================
    // Generic namespace queries
    // =========================================================================

    /// Insert or replace `key` in `ns`.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        ns: Namespace,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, value, stored_at) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at",
            ns.table()
        ))
        .bind(key)
        .bind(json)
        .bind(self.now())
        .execute(self.pool())
        .await?;

        debug!(namespace = %ns, key, "Stored value");
        Ok(())
    }

    /// Read `key` from `ns`, applying the history TTL.
    pub async fn get<T: DeserializeOwned>(
        &self,
        ns: Namespace,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        self.lookup(ns, key).await.map(Lookup::into_option)
    }

    /// Like [`get`](Self::get), but distinguishes a miss from a TTL eviction.
    ///
    /// An expired `history` row is removed by a single conditional `DELETE`
    /// before the read, so no read transaction is ever upgraded to a write.
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        ns: Namespace,
        key: &str,
    ) -> Result<Lookup<T>, StoreError> {
        if ns == Namespace::History {
            let evicted = sqlx::query("DELETE FROM history WHERE id = ? AND stored_at < ?")
                .bind(key)
                .bind(self.now() - self.history_ttl_secs())
                .execute(self.pool())
                .await?
                .rows_affected();
            if evicted > 0 {
                debug!(key, "Evicted expired history entry");
                return Ok(Lookup::Expired);
            }
        }

        let row: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT value FROM {} WHERE id = ?",
            ns.table()
        ))
        .bind(key)
        .fetch_optional(self.pool())
        .await?;

        let Some((json,)) = row else {
            return Ok(Lookup::Miss);
        };
        serde_json::from_str(&json)
            .map(Lookup::Hit)
            .map_err(|e| StoreError::Serialization(format!("{ns}/{key}: {e}")))
    }

    /// Delete `key` from `ns`. Returns whether a row was removed.
    pub async fn delete(&self, ns: Namespace, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", ns.table()))
            .bind(key)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether `key` exists in `ns`, ignoring TTL and without side effects.
    pub async fn contains(&self, ns: Namespace, key: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT 1 FROM {} WHERE id = ?",
            ns.table()
        ))
        .bind(key)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.is_some())
    }

    /// Remove everything belonging to `user_id` on logout: the keypair row,
    /// every history row keyed `{user_id}_*`, and all session secrets.
    ///
    /// Runs as one transaction. On any failure nothing is removed and
    /// `StorageTransaction` is returned.
    pub async fn clear_all(&self, user_id: &str) -> Result<(), StoreError> {
        let prefix = format!("{user_id}_");
        let mut tx = self.pool().begin().await.map_err(transaction_error)?;

        let keypairs = sqlx::query("DELETE FROM keypairs WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(transaction_error)?
            .rows_affected();

        // substr() rather than LIKE: `_` is a LIKE wildcard and ids may contain it.
        let history = sqlx::query("DELETE FROM history WHERE substr(id, 1, length(?)) = ?")
            .bind(&prefix)
            .bind(&prefix)
            .execute(&mut *tx)
            .await
            .map_err(transaction_error)?
            .rows_affected();

        let secrets = sqlx::query("DELETE FROM secrets")
            .execute(&mut *tx)
            .await
            .map_err(transaction_error)?
            .rows_affected();

        tx.commit().await.map_err(transaction_error)?;

        info!(user_id, keypairs, history, secrets, "Cleared local store for user");
        Ok(())
    }

    // =========================================================================
    // Keypair queries
    // =========================================================================

    pub async fn put_keypair(&self, keypair: &StoredKeyPair) -> Result<(), StoreError> {
        self.put(Namespace::Keypairs, &keypair.user_id, keypair).await
    }

    pub async fn get_keypair(&self, user_id: &str) -> Result<Option<StoredKeyPair>, StoreError> {
        self.get(Namespace::Keypairs, user_id).await
    }

    // =========================================================================
    // Session secret queries
    // =========================================================================

    pub async fn put_secret(&self, pair_id: &str, key: &PortableKey) -> Result<(), StoreError> {
        self.put(Namespace::Secrets, pair_id, key).await
    }

    /// Read a session secret. A corrupt row is deleted and reported as absent
    /// so the caller re-derives.
    pub async fn get_secret(&self, pair_id: &str) -> Result<Option<PortableKey>, StoreError> {
        match self.get(Namespace::Secrets, pair_id).await {
            Err(StoreError::Serialization(e)) => {
                warn!(pair_id, error = %e, "Discarding corrupt session secret");
                self.delete(Namespace::Secrets, pair_id).await?;
                Ok(None)
            }
            other => other,
        }
    }
}

fn transaction_error(e: sqlx::Error) -> StoreError {
    StoreError::StorageTransaction(e.to_string())
}

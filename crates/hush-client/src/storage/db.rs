//! `SQLite` database handle for the local secure store.

use std::path::Path;
use std::sync::Arc;

use hush_core::clock::{Clock, SystemClock};
use hush_core::config::{DEFAULT_HISTORY_TTL_SECS, StoreConfig};
use hush_core::db::{DatabaseError, open_pool, open_pool_in_memory};
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Handle to the local store. Cheap to clone; clones share the pool.
///
/// Constructed once at startup and passed to every component that needs it.
#[derive(Clone)]
pub struct LocalStore {
    pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
    history_ttl_secs: i64,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("history_ttl_secs", &self.history_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Open or create the store at `path` and initialise its namespaces.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = open_pool(path).await?;
        Self::from_pool(pool).await
    }

    /// Open the store described by `config`.
    pub async fn open_with_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = config.resolved_database_path().ok_or_else(|| {
            StoreError::StorageUnavailable("no database path could be resolved".into())
        })?;
        Ok(Self::open(&path)
            .await?
            .with_history_ttl(config.history_ttl_secs))
    }

    /// Open an in-memory store (for testing).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = open_pool_in_memory().await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
            history_ttl_secs: DEFAULT_HISTORY_TTL_SECS,
        };
        store.init().await?;
        Ok(store)
    }

    /// Replace the clock used for timestamps and TTL checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_history_ttl(mut self, secs: i64) -> Self {
        self.history_ttl_secs = secs;
        self
    }

    /// Create the namespaces if absent. Safe to call repeatedly.
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Local store migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub const fn history_ttl_secs(&self) -> i64 {
        self.history_ttl_secs
    }
}

/// Local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be opened or initialised. Fatal at startup.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A transaction failed and was rolled back; nothing was applied.
    #[error("Storage transaction failed: {0}")]
    StorageTransaction(String),

    /// A stored row could not be (de)serialized.
    #[error("Stored value is corrupt: {0}")]
    Serialization(String),
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::StorageTransaction(e.to_string())
    }
}

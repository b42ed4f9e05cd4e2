//! Top-level handle wiring the store, caches and key lifecycle together.

use std::sync::Arc;

use hush_core::config::Config;
use hush_crypto::PassphraseVault;
use tracing::info;

use crate::error::Result;
use crate::history::HistoryCache;
use crate::lifecycle::KeyManager;
use crate::messenger::Messenger;
use crate::remote::RemoteBackend;
use crate::session_cache::SessionKeyCache;
use crate::storage::LocalStore;

/// One instance per process. Every component shares the same store handle.
#[derive(Debug)]
pub struct HushClient {
    store: LocalStore,
    sessions: Arc<SessionKeyCache>,
    history: Arc<HistoryCache>,
    keys: KeyManager,
    messenger: Messenger,
}

impl HushClient {
    /// Validate `config`, open the configured store and build every
    /// component on top of it.
    ///
    /// A store that cannot be opened is fatal and is returned as
    /// `StorageUnavailable`.
    pub async fn start(config: &Config, remote: Arc<dyn RemoteBackend>) -> Result<Self> {
        config.validate()?;
        let store = LocalStore::open_with_config(&config.store).await?;
        let client = Self::with_store(store, config, remote)?;
        info!("hush client started");
        Ok(client)
    }

    /// Build on an already opened store.
    pub fn with_store(
        store: LocalStore,
        config: &Config,
        remote: Arc<dyn RemoteBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let vault = PassphraseVault::with_iterations(config.vault.pbkdf2_iterations)?;
        let sessions = Arc::new(SessionKeyCache::new(store.clone(), Arc::clone(&remote)));
        let history = Arc::new(HistoryCache::new(store.clone(), Arc::clone(&remote)));
        let keys = KeyManager::new(
            store.clone(),
            Arc::clone(&remote),
            vault,
            Arc::clone(&sessions),
        );
        let messenger = Messenger::new(
            Arc::clone(&sessions),
            remote,
            Arc::clone(&history),
            config.attachments.max_file_bytes,
        );

        Ok(Self {
            store,
            sessions,
            history,
            keys,
            messenger,
        })
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionKeyCache {
        &self.sessions
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub const fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub const fn messenger(&self) -> &Messenger {
        &self.messenger
    }
}

//! Per-pair session key cache.
//!
//! Lookup order: process memory, then the `secrets` namespace of the local
//! store, then a fresh derivation from the local keypair and the peer's
//! published public key. The store is authoritative; the memory map is only
//! an optimisation and is rebuilt from the store after a restart.
//!
//! At most one load/derivation per pair id is in flight: concurrent callers
//! for the same pair wait on the same `OnceCell`.
//!
//! [`SessionKeyCache::purge`] bumps an epoch under the write half of
//! `persist_lock`. A derivation started under an older epoch neither persists
//! nor memoizes its key, so nothing survives a logout that raced it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hush_crypto::{MessageCipher, PortableKey, SymmetricKey, fingerprint_of, import_private};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::remote::{RemoteBackend, fetch_user};
use crate::storage::LocalStore;

/// Separator between the two sorted user ids of a pair id.
pub const PAIR_ID_SEPARATOR: char = ',';

/// Canonical, order-independent identifier for a two-party relationship.
///
/// Ids are joined with `,`. A `,` or `\` inside an id is backslash-escaped,
/// so distinct pairs never share a pair id; plain ids come out unchanged
/// (`alice,bob`).
pub fn pair_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut out = String::with_capacity(first.len() + second.len() + 1);
    escape_into(&mut out, first);
    out.push(PAIR_ID_SEPARATOR);
    escape_into(&mut out, second);
    out
}

fn escape_into(out: &mut String, id: &str) {
    for c in id.chars() {
        if c == PAIR_ID_SEPARATOR || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

type InFlight = Arc<OnceCell<SymmetricKey>>;

/// Memoizes derived session keys per user pair.
pub struct SessionKeyCache {
    store: LocalStore,
    remote: Arc<dyn RemoteBackend>,
    memory: Mutex<HashMap<String, SymmetricKey>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    derivations: AtomicU64,
    epoch: AtomicU64,
    persist_lock: RwLock<()>,
}

impl std::fmt::Debug for SessionKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyCache")
            .field("cached", &self.lock_memory().len())
            .field("derivations", &self.derivation_count())
            .finish_non_exhaustive()
    }
}

impl SessionKeyCache {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteBackend>) -> Self {
        Self {
            store,
            remote,
            memory: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            derivations: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            persist_lock: RwLock::new(()),
        }
    }

    /// Session key shared by `my_user_id` and `peer_user_id`.
    ///
    /// Fails with `PeerKeyUnavailable` if the peer has never published a key,
    /// which is recoverable.
    pub async fn get(&self, my_user_id: &str, peer_user_id: &str) -> Result<SymmetricKey> {
        let pair = pair_id(my_user_id, peer_user_id);
        let epoch = self.epoch.load(Ordering::SeqCst);

        if let Some(key) = self.lock_memory().get(&pair) {
            debug!(pair_id = %pair, "Session key memory hit");
            return Ok(key.clone());
        }

        let cell = Arc::clone(
            self.lock_in_flight()
                .entry(pair.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        let result = cell
            .get_or_try_init(|| self.load_or_derive(my_user_id, peer_user_id, &pair, epoch))
            .await
            .cloned();

        if let Ok(key) = &result {
            let mut memory = self.lock_memory();
            if self.epoch.load(Ordering::SeqCst) == epoch {
                memory.insert(pair.clone(), key.clone());
            }
        }
        let mut in_flight = self.lock_in_flight();
        if in_flight
            .get(&pair)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(&pair);
        }

        result
    }

    /// A cipher bound to the pair's session key.
    pub async fn cipher_for(&self, my_user_id: &str, peer_user_id: &str) -> Result<MessageCipher> {
        let key = self.get(my_user_id, peer_user_id).await?;
        Ok(MessageCipher::new(&key))
    }

    /// Drop every key held in memory, and detach in-flight derivations so
    /// later callers start fresh. The store is untouched.
    pub fn forget_all(&self) {
        self.lock_in_flight().clear();
        self.lock_memory().clear();
    }

    /// Remove `user_id`'s local key material (see `LocalStore::clear_all`)
    /// and every session key, fencing off derivations already in flight.
    pub async fn purge(&self, user_id: &str) -> Result<()> {
        let _fence = self.persist_lock.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.forget_all();
        self.store.clear_all(user_id).await?;
        Ok(())
    }

    /// Number of key agreements actually performed by this cache.
    pub fn derivation_count(&self) -> u64 {
        self.derivations.load(Ordering::SeqCst)
    }

    async fn load_or_derive(
        &self,
        my_user_id: &str,
        peer_user_id: &str,
        pair: &str,
        epoch: u64,
    ) -> Result<SymmetricKey> {
        if let Some(stored) = self.store.get_secret(pair).await? {
            match SymmetricKey::import(&stored) {
                Ok(key) => {
                    debug!(pair_id = pair, "Session key store hit");
                    return Ok(key);
                }
                Err(e) => warn!(pair_id = pair, error = %e, "Stored session key unusable, re-deriving"),
            }
        }

        let stored = self
            .store
            .get_keypair(my_user_id)
            .await?
            .ok_or_else(|| Error::LocalKeyMissing(my_user_id.to_string()))?;
        let keypair = import_private(&PortableKey::from_json(&stored.private_key)?)?;

        let peer_public = fetch_user(self.remote.as_ref(), peer_user_id)
            .await?
            .and_then(|record| record.public_key)
            .ok_or_else(|| Error::PeerKeyUnavailable(peer_user_id.to_string()))?;

        self.derivations.fetch_add(1, Ordering::SeqCst);
        let key = keypair.derive_session_key(&peer_public)?;

        {
            let _fence = self.persist_lock.read().await;
            if self.epoch.load(Ordering::SeqCst) != epoch {
                warn!(pair_id = pair, "Local keys purged during derivation, discarding key");
                return Err(Error::LocalKeyMissing(my_user_id.to_string()));
            }
            self.store.put_secret(pair, &key.export()).await?;
        }

        info!(
            pair_id = pair,
            peer_fingerprint = %fingerprint_of(peer_public.as_bytes()),
            "Derived session key"
        );
        Ok(key)
    }

    fn lock_memory(&self) -> MutexGuard<'_, HashMap<String, SymmetricKey>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

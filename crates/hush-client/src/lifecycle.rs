//! Local key lifecycle per user per device.
//!
//! ```text
//! Uninitialized ──resolve──▶ RestorePending ──restore(passphrase)──▶ Active
//!               └─────────▶ BackupPending  ──establish(passphrase)─▶ Active
//! Active ──logout──▶ Uninitialized
//! ```
//!
//! `Uninitialized` is not represented: it is simply "not resolved yet".
//!
//! Transitions are serialized: `restore`, `establish` and `logout` each hold
//! `transitions` and re-check state after taking it.

use std::sync::Arc;

use hush_crypto::{KeyPair, PassphraseVault, PortableKey, WrappedPrivateKey, import_private};
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::remote::{KeyEscrowUpdate, RemoteBackend, UserRecord, fetch_user};
use crate::session_cache::SessionKeyCache;
use crate::storage::{LocalStore, StoredKeyPair};

/// Where a user's key stands on this device.
#[derive(Debug)]
pub enum KeyState {
    /// A local keypair is present and ready for use.
    Active(KeyPair),
    /// No local key, but an escrowed copy exists remotely.
    RestorePending(WrappedPrivateKey),
    /// No local key and nothing escrowed: a fresh key must be generated.
    BackupPending,
}

impl KeyState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Active(_) => "active",
            Self::RestorePending(_) => "restore_pending",
            Self::BackupPending => "backup_pending",
        }
    }
}

/// Drives the key lifecycle against the local store and the remote escrow.
pub struct KeyManager {
    store: LocalStore,
    remote: Arc<dyn RemoteBackend>,
    vault: PassphraseVault,
    sessions: Arc<SessionKeyCache>,
    transitions: Mutex<()>,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("vault", &self.vault)
            .finish_non_exhaustive()
    }
}

impl KeyManager {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteBackend>,
        vault: PassphraseVault,
        sessions: Arc<SessionKeyCache>,
    ) -> Self {
        Self {
            store,
            remote,
            vault,
            sessions,
            transitions: Mutex::new(()),
        }
    }

    /// Determine the current state without changing anything.
    pub async fn resolve(&self, user_id: &str) -> Result<KeyState> {
        if let Some(keypair) = self.local_keypair(user_id).await? {
            return Ok(KeyState::Active(keypair));
        }

        let state = match self.remote_record(user_id).await?.and_then(|r| r.encrypted_private_key) {
            Some(wrapped) => KeyState::RestorePending(wrapped),
            None => KeyState::BackupPending,
        };
        info!(user_id, state = state.name(), "Resolved key state");
        Ok(state)
    }

    /// `RestorePending → Active`: recover the escrowed key with `passphrase`.
    ///
    /// A wrong passphrase fails with `WrongPassphraseOrTampered` and leaves
    /// the state unchanged.
    pub async fn restore(&self, user_id: &str, passphrase: &str) -> Result<KeyPair> {
        let _transition = self.transitions.lock().await;
        self.ensure_no_local_key(user_id).await?;

        let record = self.remote_record(user_id).await?;
        let Some(UserRecord {
            public_key: published,
            encrypted_private_key: Some(wrapped),
            ..
        }) = record
        else {
            return Err(Error::InvalidKeyState(format!(
                "user {user_id} has no escrowed key to restore"
            )));
        };

        let vault = self.vault;
        let passphrase = Zeroizing::new(passphrase.to_owned());
        let portable =
            tokio::task::spawn_blocking(move || vault.unwrap(&wrapped, &passphrase)).await??;
        let keypair = import_private(&portable)?;

        if let Some(published) = published
            && published.as_bytes() != &keypair.public_bytes()
        {
            warn!(
                user_id,
                published = %hush_crypto::fingerprint_of(published.as_bytes()),
                recovered = %keypair.fingerprint(),
                "Escrowed key does not match published public key"
            );
            return Err(Error::InvalidKeyState(format!(
                "escrowed key for {user_id} does not match the published public key"
            )));
        }

        self.persist(user_id, &keypair).await?;
        info!(user_id, fingerprint = %keypair.fingerprint(), "Restored keypair from escrow");
        Ok(keypair)
    }

    /// `BackupPending → Active`: generate a keypair, escrow it under
    /// `passphrase`, then persist it locally.
    ///
    /// The remote write happens exactly once and before anything is stored
    /// locally, so a failed write leaves the device in `BackupPending`.
    pub async fn establish(&self, user_id: &str, passphrase: &str) -> Result<KeyPair> {
        let _transition = self.transitions.lock().await;
        self.ensure_no_local_key(user_id).await?;
        if self
            .remote_record(user_id)
            .await?
            .is_some_and(|r| r.encrypted_private_key.is_some())
        {
            return Err(Error::InvalidKeyState(format!(
                "user {user_id} already has an escrowed key; restore it instead"
            )));
        }

        let keypair = KeyPair::generate()?;
        let to_wrap = keypair.export_private();
        let vault = self.vault;
        let passphrase = Zeroizing::new(passphrase.to_owned());
        let wrapped =
            tokio::task::spawn_blocking(move || vault.wrap(&to_wrap, &passphrase)).await??;

        let update = KeyEscrowUpdate {
            public_key: keypair.export_public().to_json()?,
            encrypted_private_key: wrapped.into_string(),
        };
        self.remote.update_user_record(user_id, &update).await?;

        self.persist(user_id, &keypair).await?;
        info!(user_id, fingerprint = %keypair.fingerprint(), "Established and escrowed new keypair");
        Ok(keypair)
    }

    /// `Active → Uninitialized`: remove the user's keypair, cached history
    /// and every session secret from this device. Session key derivations
    /// still in flight are discarded rather than persisted.
    pub async fn logout(&self, user_id: &str) -> Result<()> {
        let _transition = self.transitions.lock().await;
        self.sessions.purge(user_id).await?;
        info!(user_id, "Logged out and cleared local key material");
        Ok(())
    }

    async fn local_keypair(&self, user_id: &str) -> Result<Option<KeyPair>> {
        let Some(stored) = self.store.get_keypair(user_id).await? else {
            return Ok(None);
        };
        let portable = PortableKey::from_json(&stored.private_key)?;
        Ok(Some(import_private(&portable)?))
    }

    async fn ensure_no_local_key(&self, user_id: &str) -> Result<()> {
        if self.store.get_keypair(user_id).await?.is_some() {
            return Err(Error::InvalidKeyState(format!(
                "user {user_id} already has an active key on this device"
            )));
        }
        Ok(())
    }

    async fn remote_record(&self, user_id: &str) -> Result<Option<UserRecord>> {
        fetch_user(self.remote.as_ref(), user_id).await
    }

    async fn persist(&self, user_id: &str, keypair: &KeyPair) -> Result<()> {
        let stored = StoredKeyPair {
            user_id: user_id.to_string(),
            public_key: keypair.export_public().to_json()?,
            private_key: keypair.export_private().to_json()?,
            created_at: self.store.now(),
        };
        self.store.put_keypair(&stored).await?;
        Ok(())
    }
}

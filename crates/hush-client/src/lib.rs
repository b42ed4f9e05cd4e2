//! `hush` client core
//!
//! The stateful half of end-to-end encryption for one-to-one chat:
//!
//! - **storage**: `SQLite` local store with `keypairs`, `history` and `secrets`
//!   namespaces, atomic per call, TTL eviction for history
//! - **`session_cache`**: per-pair session keys, one derivation in flight per pair
//! - **lifecycle**: resolve, restore or establish the device keypair, and logout
//! - **history**: stale-while-revalidate conversation cache with cancellable refresh
//! - **messenger**: encrypt outgoing records, open incoming ones
//! - **remote**: the backend boundary and its validated record schemas

pub mod client;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod messenger;
pub mod remote;
pub mod session_cache;
pub mod storage;

pub use client::HushClient;
pub use error::{Error, Result};
pub use history::HistoryCache;
pub use lifecycle::{KeyManager, KeyState};
pub use messenger::{Messenger, OpenedMessage};
pub use remote::{MemoryBackend, MessageKind, MessageRecord, RemoteBackend, UserRecord};
pub use session_cache::{SessionKeyCache, pair_id};
pub use storage::{LocalStore, StoreError};

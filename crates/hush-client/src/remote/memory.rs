//! In-process [`RemoteBackend`] used by tests and local demos.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hush_core::clock::unix_timestamp;
use serde_json::{Value, json};

use super::{KeyEscrowUpdate, NewMessageRecord, RemoteBackend, RemoteError};

/// Stores user records, messages and file bodies in memory.
///
/// Counts calls so tests can assert how often the core went to the network.
#[derive(Default)]
pub struct MemoryBackend {
    users: Mutex<HashMap<String, Value>>,
    messages: Mutex<Vec<Value>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    user_fetches: AtomicUsize,
    escrow_updates: AtomicUsize,
    offline: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, so concurrent callers overlap.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every call fail with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Insert or replace a raw user record.
    pub fn insert_user(&self, user_id: &str, record: Value) {
        self.lock_users().insert(user_id.to_string(), record);
    }

    /// Insert a raw message record as-is, bypassing validation.
    pub fn insert_message(&self, record: Value) {
        self.lock_messages().push(record);
    }

    pub fn user(&self, user_id: &str) -> Option<Value> {
        self.lock_users().get(user_id).cloned()
    }

    /// Encrypted file body previously uploaded with a message.
    pub fn file(&self, reference: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(reference)
            .cloned()
    }

    pub fn user_fetches(&self) -> usize {
        self.user_fetches.load(Ordering::SeqCst)
    }

    pub fn escrow_updates(&self) -> usize {
        self.escrow_updates.load(Ordering::SeqCst)
    }

    async fn simulate_network(&self) -> Result<(), RemoteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("memory backend is offline".into()));
        }
        Ok(())
    }

    fn lock_users(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_messages(&self) -> std::sync::MutexGuard<'_, Vec<Value>> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn get_user_record(&self, user_id: &str) -> Result<Option<Value>, RemoteError> {
        self.user_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        Ok(self.user(user_id))
    }

    async fn update_user_record(
        &self,
        user_id: &str,
        update: &KeyEscrowUpdate,
    ) -> Result<(), RemoteError> {
        self.simulate_network().await?;
        self.escrow_updates.fetch_add(1, Ordering::SeqCst);

        let mut users = self.lock_users();
        let record = users
            .entry(user_id.to_string())
            .or_insert_with(|| json!({ "id": user_id }));
        let Some(fields) = record.as_object_mut() else {
            return Err(RemoteError::Rejected(format!("user {user_id} is not an object")));
        };
        fields.insert("publicKey".into(), Value::String(update.public_key.clone()));
        fields.insert(
            "encryptedPrivateKey".into(),
            Value::String(update.encrypted_private_key.clone()),
        );
        Ok(())
    }

    async fn create_message_record(&self, record: &NewMessageRecord) -> Result<Value, RemoteError> {
        self.simulate_network().await?;

        let id = uuid::Uuid::new_v4().to_string();
        let file = record.file.as_ref().map(|body| {
            let reference = format!("files/{id}");
            self.files
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(reference.clone(), body.clone());
            reference
        });

        let mut value = json!({
            "id": id,
            "sender": record.sender,
            "receiver": record.receiver,
            "text": record.text,
            "type": record.kind,
            "createdAt": unix_timestamp(),
        });
        if let (Some(reference), Some(fields)) = (file, value.as_object_mut()) {
            fields.insert("file".into(), Value::String(reference));
        }

        self.lock_messages().push(value.clone());
        Ok(value)
    }

    async fn list_messages(
        &self,
        user_id: &str,
        friend_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        self.simulate_network().await?;

        let between = |v: &Value| {
            let sender = v.get("sender").and_then(Value::as_str);
            let receiver = v.get("receiver").and_then(Value::as_str);
            matches!(
                (sender, receiver),
                (Some(s), Some(r)) if (s == user_id && r == friend_id) || (s == friend_id && r == user_id)
            )
        };
        Ok(self
            .lock_messages()
            .iter()
            .filter(|v| between(v))
            .cloned()
            .collect())
    }
}

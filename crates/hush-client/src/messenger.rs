//! Composing outgoing message records and opening incoming ones.

use std::sync::Arc;

use hush_crypto::{CANNOT_DECRYPT_PLACEHOLDER, FileMetadata};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::history::HistoryCache;
use crate::remote::{MessageKind, MessageRecord, NewMessageRecord, RemoteBackend};
use crate::session_cache::SessionKeyCache;

/// A received message after decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenedMessage {
    Text(String),
    File {
        metadata: FileMetadata,
        /// `None` if the caller did not supply the encrypted body.
        body: Option<Vec<u8>>,
    },
    /// Authentication failed. Wrong key and corrupted data are not told apart.
    Undecryptable,
}

impl OpenedMessage {
    /// What the UI shows in the message list.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text(text) => text.as_str(),
            Self::File { metadata, .. } => metadata.filename.as_str(),
            Self::Undecryptable => CANNOT_DECRYPT_PLACEHOLDER,
        }
    }

    pub const fn is_decrypted(&self) -> bool {
        !matches!(self, Self::Undecryptable)
    }
}

/// Encrypts outgoing messages under the pair's session key and records them.
pub struct Messenger {
    sessions: Arc<SessionKeyCache>,
    remote: Arc<dyn RemoteBackend>,
    history: Arc<HistoryCache>,
    max_file_bytes: usize,
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("max_file_bytes", &self.max_file_bytes)
            .finish_non_exhaustive()
    }
}

impl Messenger {
    pub fn new(
        sessions: Arc<SessionKeyCache>,
        remote: Arc<dyn RemoteBackend>,
        history: Arc<HistoryCache>,
        max_file_bytes: usize,
    ) -> Self {
        Self {
            sessions,
            remote,
            history,
            max_file_bytes,
        }
    }

    pub async fn send_text(&self, me: &str, peer: &str, text: &str) -> Result<MessageRecord> {
        let cipher = self.sessions.cipher_for(me, peer).await?;
        let record = NewMessageRecord {
            sender: me.to_string(),
            receiver: peer.to_string(),
            text: cipher.encrypt_text(text)?,
            kind: MessageKind::Text,
            file: None,
        };
        self.create(me, peer, &record).await
    }

    /// Send an attachment. The plaintext size limit is checked before any
    /// encryption happens.
    pub async fn send_file(
        &self,
        me: &str,
        peer: &str,
        metadata: &FileMetadata,
        body: &[u8],
    ) -> Result<MessageRecord> {
        if body.len() > self.max_file_bytes {
            return Err(Error::AttachmentTooLarge {
                size: body.len(),
                max: self.max_file_bytes,
            });
        }

        let cipher = self.sessions.cipher_for(me, peer).await?;
        let record = NewMessageRecord {
            sender: me.to_string(),
            receiver: peer.to_string(),
            text: cipher.encrypt_metadata(metadata)?,
            kind: MessageKind::for_mime_type(&metadata.mime_type),
            file: Some(cipher.encrypt_file(body)?),
        };
        self.create(me, peer, &record).await
    }

    /// Decrypt a received record. `file_body` is the raw encrypted attachment,
    /// if the caller has downloaded it.
    ///
    /// Authentication failures yield [`OpenedMessage::Undecryptable`]; only
    /// key lookup problems are returned as errors.
    pub async fn open(
        &self,
        me: &str,
        record: &MessageRecord,
        file_body: Option<&[u8]>,
    ) -> Result<OpenedMessage> {
        let cipher = self.sessions.cipher_for(me, record.peer_of(me)).await?;

        let opened = if record.kind.is_file() {
            let metadata = cipher.decrypt_metadata(&record.text);
            let body = file_body.map(|data| cipher.decrypt_file(data)).transpose();
            match (metadata, body) {
                (Ok(metadata), Ok(body)) => OpenedMessage::File { metadata, body },
                _ => OpenedMessage::Undecryptable,
            }
        } else {
            cipher
                .decrypt_text(&record.text)
                .map_or(OpenedMessage::Undecryptable, OpenedMessage::Text)
        };

        if !opened.is_decrypted() {
            debug!(message_id = %record.id, "Message failed authentication");
        }
        Ok(opened)
    }

    async fn create(&self, me: &str, peer: &str, record: &NewMessageRecord) -> Result<MessageRecord> {
        let value = self.remote.create_message_record(record).await?;
        let created = MessageRecord::from_value(value)?;
        self.history.append(me, peer, created.clone()).await?;
        info!(message_id = %created.id, kind = ?created.kind, "Sent encrypted message");
        Ok(created)
    }
}

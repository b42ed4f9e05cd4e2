//! Validated schemas for remote records.

use hush_crypto::{PortableKey, PublicKey, WrappedPrivateKey, import_public};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A user as published on the backend.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    /// `None` until the user has completed key setup.
    pub public_key: Option<PublicKey>,
    /// `None` until the user has escrowed a key.
    pub encrypted_private_key: Option<WrappedPrivateKey>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserRecord {
    id: String,
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    encrypted_private_key: Option<String>,
}

impl UserRecord {
    /// Validate a raw backend record.
    ///
    /// Empty strings count as absent. A public key that is not a valid X25519
    /// portable key, or an escrow blob too short to be a wrapped key, makes the
    /// whole record invalid.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        let raw: RawUserRecord = serde_json::from_value(value)
            .map_err(|e| Error::InvalidRecord(format!("user record: {e}")))?;

        let public_key = non_empty(raw.public_key)
            .map(|json| {
                PortableKey::from_json(&json)
                    .and_then(|key| import_public(&key))
                    .map_err(|e| Error::InvalidRecord(format!("user {}: public key: {e}", raw.id)))
            })
            .transpose()?;

        let encrypted_private_key = non_empty(raw.encrypted_private_key)
            .map(|blob| {
                WrappedPrivateKey::parse(blob).map_err(|e| {
                    Error::InvalidRecord(format!("user {}: escrowed key: {e}", raw.id))
                })
            })
            .transpose()?;

        Ok(Self {
            id: raw.id,
            public_key,
            encrypted_private_key,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// The escrow write performed once when a device first establishes a key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEscrowUpdate {
    /// JSON-encoded portable public key.
    pub public_key: String,
    /// Base64 wrapped private key.
    pub encrypted_private_key: String,
}

/// Message types. Everything except `Text` carries an encrypted file body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    File,
}

impl MessageKind {
    /// Pick the message type for an attachment from its MIME type.
    pub fn for_mime_type(mime_type: &str) -> Self {
        match mime_type.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::File,
        }
    }

    pub const fn is_file(self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// A stored message. `text` is a base64 encrypted payload: the message text
/// for `Text`, the JSON file metadata otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Backend reference to the encrypted file body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub created_at: i64,
}

impl MessageRecord {
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        let record: Self = serde_json::from_value(value)
            .map_err(|e| Error::InvalidRecord(format!("message record: {e}")))?;
        if record.kind.is_file() && record.file.is_none() {
            return Err(Error::InvalidRecord(format!(
                "message {}: {:?} message without file",
                record.id, record.kind
            )));
        }
        Ok(record)
    }

    /// The other participant, seen from `me`.
    pub fn peer_of(&self, me: &str) -> &str {
        if self.sender == me {
            &self.receiver
        } else {
            &self.sender
        }
    }
}

/// A message about to be created on the backend.
#[derive(Clone)]
pub struct NewMessageRecord {
    pub sender: String,
    pub receiver: String,
    pub text: String,
    pub kind: MessageKind,
    /// Raw `nonce || ciphertext` attachment body.
    pub file: Option<Vec<u8>>,
}

impl std::fmt::Debug for NewMessageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewMessageRecord")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("kind", &self.kind)
            .field("file_len", &self.file.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

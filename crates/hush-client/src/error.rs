//! Error types for the hush client core.

use hush_crypto::CryptoError;

use crate::remote::RemoteError;
use crate::storage::StoreError;

/// Result type alias using the client `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] hush_core::Error),

    /// The peer has not published a public key yet. Retry on next chat open.
    #[error("Peer {0} has not published a public key yet")]
    PeerKeyUnavailable(String),

    /// No keypair for this user on this device.
    #[error("No local keypair for user {0}")]
    LocalKeyMissing(String),

    /// A remote record failed validation and was discarded.
    #[error("Invalid remote record: {0}")]
    InvalidRecord(String),

    /// The requested key lifecycle transition is not valid from the current state.
    #[error("Invalid key state: {0}")]
    InvalidKeyState(String),

    #[error("Attachment too large: {size} bytes exceeds limit of {max} bytes")]
    AttachmentTooLarge { size: usize, max: usize },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether the caller should retry later rather than treat this as fatal.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PeerKeyUnavailable(_) | Self::Remote(RemoteError::Unavailable(_))
        )
    }

    /// Whether this is a decryption or passphrase failure, which callers
    /// present as a single generic "cannot decrypt" state.
    pub const fn is_decrypt_failure(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::DecryptionFailed | CryptoError::WrongPassphraseOrTampered)
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

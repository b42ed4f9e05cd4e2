//! Crypto error types.

/// Errors from cryptographic operations.
///
/// `DecryptionFailed` and `WrongPassphraseOrTampered` deliberately carry no
/// detail: a wrong key and corrupted ciphertext must look the same to callers.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Wrong passphrase or tampered key backup")]
    WrongPassphraseOrTampered,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

//! `hush` E2E Encryption Library
//!
//! Provides the cryptographic primitives for one-to-one messaging: the relay
//! and the key-escrow backend only ever see ciphertext.
//!
//! ## Crypto primitives
//!
//! - **Identity**: one X25519 static keypair per user per device
//! - **Session**: X25519 ECDH between the two long-term keys → HKDF-SHA256 → 256-bit key
//! - **Encryption**: ChaCha20-Poly1305 AEAD, fresh random 12-byte nonce per message
//! - **Escrow**: PBKDF2-HMAC-SHA256 (≥ 100k iterations) wrapping of the private key

pub mod agreement;
pub mod cipher;
pub mod codec;
pub mod error;
pub mod keys;
pub mod vault;

pub use agreement::{
    KeyPair, derive_session_key, export_public, fingerprint_of, import_private, import_public,
};
pub use cipher::{
    CANNOT_DECRYPT_PLACEHOLDER, EncryptedPayload, FileMetadata, MessageCipher, NONCE_SIZE,
    TAG_SIZE,
};
pub use error::CryptoError;
pub use keys::{PortableKey, SymmetricKey};
pub use vault::{MIN_PBKDF2_ITERATIONS, PassphraseVault, WrappedPrivateKey};
pub use x25519_dalek::PublicKey;

//! Passphrase wrapping of private keys for remote escrow.
//!
//! `wrap` derives a key-encryption key with PBKDF2-HMAC-SHA256 over a fresh
//! 16-byte salt, then seals the portable private key with [`MessageCipher`].
//! Output is `base64(salt(16) || nonce(12) || ciphertext || tag(16))`, safe to
//! store on an untrusted backend.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::cipher::{EncryptedPayload, MessageCipher, NONCE_SIZE, TAG_SIZE};
use crate::codec::{decode_base64, encode_base64};
use crate::error::CryptoError;
use crate::keys::{KEY_SIZE, PortableKey, SymmetricKey};

/// Salt size for the key-encryption-key derivation.
pub const SALT_SIZE: usize = 16;

/// Default and minimum PBKDF2 iteration count.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Shortest well-formed wrapped key: salt, nonce and tag around an empty body.
pub const MIN_WRAPPED_LEN: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

/// A passphrase-wrapped private key, base64-encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedPrivateKey(String);

impl std::fmt::Debug for WrappedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedPrivateKey({} chars)", self.0.len())
    }
}

impl WrappedPrivateKey {
    /// Accept an escrow blob from an untrusted source, checking only that it
    /// decodes and is long enough to be a wrapped key.
    pub fn parse(encoded: impl Into<String>) -> Result<Self, CryptoError> {
        let encoded = encoded.into();
        let len = decode_base64(&encoded)?.len();
        if len < MIN_WRAPPED_LEN {
            return Err(CryptoError::MalformedKey(format!(
                "wrapped key too short: {len} bytes"
            )));
        }
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Wraps and unwraps private keys under a user passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassphraseVault {
    iterations: u32,
}

impl Default for PassphraseVault {
    fn default() -> Self {
        Self {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl PassphraseVault {
    /// Create a vault with a custom iteration count. Counts below
    /// [`MIN_PBKDF2_ITERATIONS`] are rejected.
    pub fn with_iterations(iterations: u32) -> Result<Self, CryptoError> {
        if iterations < MIN_PBKDF2_ITERATIONS {
            return Err(CryptoError::KeyDerivationFailed(format!(
                "iteration count {iterations} below minimum {MIN_PBKDF2_ITERATIONS}"
            )));
        }
        Ok(Self { iterations })
    }

    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Wrap a portable private key. Each call uses a new salt and nonce, so
    /// wrapping the same key twice yields different bytes.
    ///
    /// CPU-bound by design; async callers should run it on a blocking thread.
    pub fn wrap(
        &self,
        private_key: &PortableKey,
        passphrase: &str,
    ) -> Result<WrappedPrivateKey, CryptoError> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let kek = self.derive_kek(passphrase, &salt);
        let mut json = private_key.to_json()?;
        let sealed = MessageCipher::new(&kek).encrypt(json.as_bytes());
        json.zeroize();
        let sealed = sealed?.to_bytes();

        let mut out = Vec::with_capacity(SALT_SIZE + sealed.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&sealed);
        Ok(WrappedPrivateKey(encode_base64(&out)))
    }

    /// Recover the portable private key.
    ///
    /// A wrong passphrase and a corrupted blob both yield
    /// `WrongPassphraseOrTampered`.
    pub fn unwrap(
        &self,
        wrapped: &WrappedPrivateKey,
        passphrase: &str,
    ) -> Result<PortableKey, CryptoError> {
        let bytes =
            decode_base64(wrapped.as_str()).map_err(|_| CryptoError::WrongPassphraseOrTampered)?;
        if bytes.len() < MIN_WRAPPED_LEN {
            return Err(CryptoError::WrongPassphraseOrTampered);
        }
        let (salt, sealed) = bytes.split_at(SALT_SIZE);

        let kek = self.derive_kek(passphrase, salt);
        let payload =
            EncryptedPayload::from_bytes(sealed).map_err(|_| CryptoError::WrongPassphraseOrTampered)?;
        let mut json = MessageCipher::new(&kek)
            .decrypt(&payload)
            .map_err(|_| CryptoError::WrongPassphraseOrTampered)?;

        let parsed = serde_json::from_slice::<PortableKey>(&json)
            .map_err(|e| CryptoError::MalformedKey(e.to_string()));
        json.zeroize();
        parsed
    }

    fn derive_kek(&self, passphrase: &str, salt: &[u8]) -> SymmetricKey {
        let mut kek = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, self.iterations, &mut kek);
        let key = SymmetricKey::from_bytes(kek);
        kek.zeroize();
        key
    }
}

//! Authenticated encryption of message text, file metadata and file bodies.
//!
//! ChaCha20-Poly1305 with a fresh random 12-byte nonce per call. Wire layout
//! for every payload is `nonce(12) || ciphertext || tag(16)`; text and
//! metadata travel base64-encoded, file bodies travel as raw bytes.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::codec::{bytes_to_text, decode_base64, encode_base64};
use crate::error::CryptoError;
use crate::keys::SymmetricKey;

/// Nonce size for ChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

/// Rendered in place of any message that fails to decrypt.
pub const CANNOT_DECRYPT_PLACEHOLDER: &str = "[cannot decrypt message]";

/// Encrypted payload with the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// 12-byte nonce used for this encryption.
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including the 16-byte auth tag.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// `nonce || ciphertext` as raw bytes (file body layout).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split raw wire bytes at the fixed nonce offset.
    ///
    /// Anything too short to hold a nonce and a tag cannot authenticate, so it
    /// is reported the same way as a tag mismatch.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// `nonce || ciphertext`, base64-encoded (text/metadata layout).
    pub fn to_base64(&self) -> String {
        encode_base64(&self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = decode_base64(encoded).map_err(|_| CryptoError::DecryptionFailed)?;
        Self::from_bytes(&bytes)
    }
}

/// Metadata for a file attachment, encrypted like a text message before the
/// body is uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

/// AEAD bound to one session key. Stateless apart from the key schedule, so
/// it is safe to share across tasks.
pub struct MessageCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MessageCipher([REDACTED])")
    }
}

impl MessageCipher {
    pub fn new(key: &SymmetricKey) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypt arbitrary bytes under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedPayload {
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    /// Authenticate and decrypt. Never returns partial plaintext.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
        self.cipher
            .decrypt(Nonce::from_slice(&payload.nonce), payload.ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Encrypt bytes into a base64 payload.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        self.encrypt(plaintext).map(|p| p.to_base64())
    }

    pub fn decrypt_bytes(&self, encoded: &str) -> Result<Vec<u8>, CryptoError> {
        self.decrypt(&EncryptedPayload::from_base64(encoded)?)
    }

    /// Encrypt UTF-8 text into a base64 payload.
    pub fn encrypt_text(&self, text: &str) -> Result<String, CryptoError> {
        self.encrypt_bytes(text.as_bytes())
    }

    /// Decrypt a base64 payload into UTF-8 text.
    ///
    /// Authenticated plaintext that is not valid UTF-8 is still a failure to
    /// produce displayable text and is reported as `DecryptionFailed`.
    pub fn decrypt_text(&self, encoded: &str) -> Result<String, CryptoError> {
        let bytes = self.decrypt_bytes(encoded)?;
        bytes_to_text(bytes).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Decrypt for display: the plaintext, or the fixed placeholder.
    pub fn decrypt_for_display(&self, encoded: &str) -> String {
        self.decrypt_text(encoded)
            .unwrap_or_else(|_| CANNOT_DECRYPT_PLACEHOLDER.to_string())
    }

    /// Encrypt a file body into the raw `nonce || ciphertext` layout.
    pub fn encrypt_file(&self, body: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.encrypt(body).map(|p| p.to_bytes())
    }

    pub fn decrypt_file(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.decrypt(&EncryptedPayload::from_bytes(data)?)
    }

    /// Encrypt file metadata as a base64 JSON payload.
    pub fn encrypt_metadata(&self, metadata: &FileMetadata) -> Result<String, CryptoError> {
        let json = serde_json::to_vec(metadata)
            .map_err(|e| CryptoError::SerializationError(e.to_string()))?;
        self.encrypt_bytes(&json)
    }

    pub fn decrypt_metadata(&self, encoded: &str) -> Result<FileMetadata, CryptoError> {
        let json = self.decrypt_bytes(encoded)?;
        serde_json::from_slice(&json).map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keys::KEY_SIZE;

    fn test_cipher() -> MessageCipher {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        MessageCipher::new(&SymmetricKey::from_bytes(key))
    }

    #[test]
    fn text_roundtrip() {
        let cipher = test_cipher();
        let encoded = cipher.encrypt_text("Hello, encrypted world!").unwrap();
        assert_eq!(cipher.decrypt_text(&encoded).unwrap(), "Hello, encrypted world!");
    }

    #[test]
    fn empty_and_unicode_roundtrip() {
        let cipher = test_cipher();
        for text in ["", "ümlaut ✓ 日本語", "\n\t"] {
            let encoded = cipher.encrypt_text(text).unwrap();
            assert_eq!(cipher.decrypt_text(&encoded).unwrap(), text);
        }
    }

    #[test]
    fn wire_layout_is_nonce_then_ciphertext() {
        let cipher = test_cipher();
        let payload = cipher.encrypt(b"payload data").unwrap();
        let bytes = payload.to_bytes();

        assert_eq!(bytes.len(), NONCE_SIZE + b"payload data".len() + TAG_SIZE);
        assert_eq!(&bytes[..NONCE_SIZE], &payload.nonce);
        assert_eq!(EncryptedPayload::from_bytes(&bytes).unwrap(), payload);
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let cipher = test_cipher();
        let mut nonces = std::collections::HashSet::new();
        for _ in 0..1000 {
            let payload = cipher.encrypt(b"x").unwrap();
            assert!(nonces.insert(payload.nonce), "nonce collision detected");
        }
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = test_cipher();
        let a = cipher.encrypt_text("same").unwrap();
        let b = cipher.encrypt_text("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn every_single_bit_flip_is_detected() {
        let cipher = test_cipher();
        let bytes = cipher.encrypt_file(b"tamper me").unwrap();

        for byte in 0..bytes.len() {
            for bit in 0..8 {
                let mut tampered = bytes.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    matches!(
                        cipher.decrypt_file(&tampered),
                        Err(CryptoError::DecryptionFailed)
                    ),
                    "flip at byte {byte} bit {bit} was accepted"
                );
            }
        }
    }

    #[test]
    fn wrong_key_fails_without_detail() {
        let encoded = test_cipher().encrypt_text("secret data").unwrap();
        let err = test_cipher().decrypt_text(&encoded).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
        assert_eq!(err.to_string(), "Decryption failed");
    }

    #[test]
    fn truncated_payloads_fail() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.decrypt_file(&[]),
            Err(CryptoError::DecryptionFailed)
        ));
        assert!(matches!(
            cipher.decrypt_file(&[0u8; NONCE_SIZE + TAG_SIZE - 1]),
            Err(CryptoError::DecryptionFailed)
        ));
        assert!(matches!(
            cipher.decrypt_text("%%% not base64"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn display_falls_back_to_placeholder() {
        let cipher = test_cipher();
        let encoded = cipher.encrypt_text("visible").unwrap();
        assert_eq!(cipher.decrypt_for_display(&encoded), "visible");

        let other = test_cipher();
        assert_eq!(other.decrypt_for_display(&encoded), CANNOT_DECRYPT_PLACEHOLDER);
        assert_eq!(cipher.decrypt_for_display(""), CANNOT_DECRYPT_PLACEHOLDER);
    }

    #[test]
    fn file_body_is_raw_not_base64() {
        let cipher = test_cipher();
        let body = vec![0xABu8; 1024 * 1024];
        let sealed = cipher.encrypt_file(&body).unwrap();

        assert_eq!(sealed.len(), body.len() + NONCE_SIZE + TAG_SIZE);
        assert_eq!(cipher.decrypt_file(&sealed).unwrap(), body);
    }

    #[test]
    fn metadata_roundtrip_uses_camel_case() {
        let cipher = test_cipher();
        let metadata = FileMetadata {
            filename: "report.pdf".into(),
            mime_type: "application/pdf".into(),
            size: 4096,
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("mimeType"));

        let encoded = cipher.encrypt_metadata(&metadata).unwrap();
        assert_eq!(cipher.decrypt_metadata(&encoded).unwrap(), metadata);
    }

    #[test]
    fn invalid_utf8_plaintext_is_not_displayed() {
        let cipher = test_cipher();
        let encoded = cipher.encrypt_bytes(&[0xC3, 0x28]).unwrap();
        assert!(matches!(
            cipher.decrypt_text(&encoded),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn concurrent_encryption_is_safe() {
        use std::sync::Arc;
        use std::thread;

        let cipher = Arc::new(test_cipher());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let c = Arc::clone(&cipher);
                thread::spawn(move || {
                    let text = format!("thread {i}");
                    let encoded = c.encrypt_text(&text).unwrap();
                    assert_eq!(c.decrypt_text(&encoded).unwrap(), text);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}

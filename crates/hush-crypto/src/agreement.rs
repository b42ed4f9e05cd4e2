//! X25519 key agreement.
//!
//! Every user owns one long-lived X25519 keypair. The session key for a pair
//! of users is `HKDF-SHA256(X25519(my_secret, their_public))`, which both
//! sides compute identically because X25519 is commutative.

use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::codec::encode_base64url;
use crate::error::CryptoError;
use crate::keys::{CRV_X25519, KEY_SIZE, KTY_OKP, PortableKey, SymmetricKey, decode_key_member};

/// HKDF info string for session key derivation.
const HKDF_INFO: &[u8] = b"hush-e2e-session-v1";

/// HKDF salt for domain separation (recommended by RFC 5869).
const HKDF_SALT: &[u8] = b"hush-e2e-hkdf-salt-v1";

/// An X25519 keypair for a user on this device.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &fingerprint_of(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a fresh keypair from the OS CSPRNG.
    ///
    /// Fails only if the platform entropy source is unavailable.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// Reconstruct from raw 32-byte secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        let secret = StaticSecret::from(arr);
        let public = PublicKey::from(&secret);
        arr.zeroize();
        Ok(Self { secret, public })
    }

    pub const fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        *self.public.as_bytes()
    }

    /// Colon-separated SHA-256 fingerprint of the public key.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(self.public.as_bytes())
    }

    /// Portable form of the public half.
    pub fn export_public(&self) -> PortableKey {
        export_public(&self.public)
    }

    /// Portable form of the whole keypair (`x` and `d`). Handle with care.
    pub fn export_private(&self) -> PortableKey {
        let mut secret = self.secret.to_bytes();
        let d = encode_base64url(&secret);
        secret.zeroize();
        PortableKey {
            kty: KTY_OKP.to_string(),
            crv: Some(CRV_X25519.to_string()),
            x: Some(encode_base64url(self.public.as_bytes())),
            d: Some(d),
            k: None,
        }
    }

    /// Derive the session key shared with the owner of `their_public`.
    pub fn derive_session_key(&self, their_public: &PublicKey) -> Result<SymmetricKey, CryptoError> {
        derive_session_key(&self.secret, their_public)
    }
}

/// Export an X25519 public key.
pub fn export_public(public: &PublicKey) -> PortableKey {
    PortableKey {
        kty: KTY_OKP.to_string(),
        crv: Some(CRV_X25519.to_string()),
        x: Some(encode_base64url(public.as_bytes())),
        d: None,
        k: None,
    }
}

/// Import an X25519 public key. Extra private members are ignored.
pub fn import_public(key: &PortableKey) -> Result<PublicKey, CryptoError> {
    key.expect_type(KTY_OKP)?;
    decode_key_member("x", key.x.as_deref()).map(PublicKey::from)
}

/// Import a private key exported by [`KeyPair::export_private`].
///
/// If the portable key carries `x`, it must match the public key derived from
/// `d`.
pub fn import_private(key: &PortableKey) -> Result<KeyPair, CryptoError> {
    key.expect_type(KTY_OKP)?;
    let mut secret = decode_key_member("d", key.d.as_deref())?;
    let pair = KeyPair::from_secret_bytes(&secret);
    secret.zeroize();
    let pair = pair?;

    if let Some(x) = key.x.as_deref() {
        let claimed = decode_key_member("x", Some(x))?;
        if claimed != pair.public_bytes() {
            return Err(CryptoError::MalformedKey(
                "public member does not match private key".into(),
            ));
        }
    }
    Ok(pair)
}

/// Run X25519 and expand the shared value into a 256-bit AEAD key.
///
/// Low-order peer keys produce an all-zero shared value; those are rejected.
pub fn derive_session_key(
    my_secret: &StaticSecret,
    their_public: &PublicKey,
) -> Result<SymmetricKey, CryptoError> {
    let shared = my_secret.diffie_hellman(their_public);
    if !shared.was_contributory() {
        return Err(CryptoError::MalformedKey(
            "peer public key is a low-order point".into(),
        ));
    }
    hkdf_derive(shared.as_bytes()).map(SymmetricKey::from_bytes)
}

/// Derive a 32-byte key from a shared secret via HKDF-SHA256.
///
/// The caller is responsible for zeroizing the returned bytes.
fn hkdf_derive(shared_secret: &[u8; KEY_SIZE]) -> Result<[u8; KEY_SIZE], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared_secret);
    let mut key = [0u8; KEY_SIZE];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(key)
}

/// Compute a colon-separated hex fingerprint from raw public key bytes.
pub fn fingerprint_of(pubkey_bytes: &[u8; KEY_SIZE]) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(pubkey_bytes);
    hash.iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

//! Portable key representation and the symmetric session key type.
//!
//! Keys leave this crate as JWK-shaped JSON objects so they can be stored as
//! plain strings next to relational fields (local store rows, remote user
//! records).

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec::{decode_base64url, encode_base64url};
use crate::error::CryptoError;

/// Size of every raw key handled by this crate.
pub const KEY_SIZE: usize = 32;

/// JWK key type for X25519 keys.
pub const KTY_OKP: &str = "OKP";
/// JWK key type for raw symmetric keys.
pub const KTY_OCT: &str = "oct";
/// The single agreement curve.
pub const CRV_X25519: &str = "X25519";

/// A key in portable JSON form.
///
/// Public X25519 keys carry `kty`, `crv` and `x`; private ones add `d`.
/// Symmetric session keys carry `kty = "oct"` and `k`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortableKey {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl std::fmt::Debug for PortableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortableKey")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("d", &self.d.as_ref().map(|_| "[REDACTED]"))
            .field("k", &self.k.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Drop for PortableKey {
    fn drop(&mut self) {
        self.d.zeroize();
        self.k.zeroize();
    }
}

impl PortableKey {
    /// Serialize to a compact JSON string.
    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::SerializationError(e.to_string()))
    }

    /// Parse from a JSON string. Shape errors are reported as `MalformedKey`.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::MalformedKey(e.to_string()))
    }

    /// Whether this key carries private material.
    pub const fn is_private(&self) -> bool {
        self.d.is_some() || self.k.is_some()
    }

    /// Check `kty` (and `crv` for OKP keys) against what the caller expects.
    pub(crate) fn expect_type(&self, kty: &str) -> Result<(), CryptoError> {
        if self.kty != kty {
            return Err(CryptoError::MalformedKey(format!(
                "expected kty {kty}, got {}",
                self.kty
            )));
        }
        if kty == KTY_OKP && self.crv.as_deref() != Some(CRV_X25519) {
            return Err(CryptoError::MalformedKey(format!(
                "unsupported curve: {}",
                self.crv.as_deref().unwrap_or("<none>")
            )));
        }
        Ok(())
    }
}

/// Decode a base64url JWK member into exactly 32 bytes.
pub(crate) fn decode_key_member(
    name: &str,
    value: Option<&str>,
) -> Result<[u8; KEY_SIZE], CryptoError> {
    let value = value.ok_or_else(|| CryptoError::MalformedKey(format!("missing member {name}")))?;
    let mut bytes = decode_base64url(value)
        .map_err(|e| CryptoError::MalformedKey(format!("member {name}: {e}")))?;
    if bytes.len() != KEY_SIZE {
        let actual = bytes.len();
        bytes.zeroize();
        return Err(CryptoError::MalformedKey(format!(
            "member {name}: expected {KEY_SIZE} bytes, got {actual}"
        )));
    }
    let mut arr = [0u8; KEY_SIZE];
    arr.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(arr)
}

/// A 256-bit authenticated-encryption key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SymmetricKey {}

impl SymmetricKey {
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Reconstruct from a byte slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Export as `{"kty":"oct","k":...}`.
    pub fn export(&self) -> PortableKey {
        PortableKey {
            kty: KTY_OCT.to_string(),
            crv: None,
            x: None,
            d: None,
            k: Some(encode_base64url(&self.0)),
        }
    }

    /// Import from an `oct` portable key.
    pub fn import(key: &PortableKey) -> Result<Self, CryptoError> {
        key.expect_type(KTY_OCT)?;
        decode_key_member("k", key.k.as_deref()).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_key_export_import() {
        let key = SymmetricKey::from_bytes([7u8; KEY_SIZE]);
        let json = key.export().to_json().unwrap();
        assert!(json.contains(r#""kty":"oct""#));

        let parsed = PortableKey::from_json(&json).unwrap();
        assert_eq!(SymmetricKey::import(&parsed).unwrap(), key);
    }

    #[test]
    fn symmetric_import_rejects_wrong_kty() {
        let mut exported = SymmetricKey::from_bytes([1u8; KEY_SIZE]).export();
        exported.kty = KTY_OKP.to_string();
        assert!(matches!(
            SymmetricKey::import(&exported),
            Err(CryptoError::MalformedKey(_))
        ));
    }

    #[test]
    fn symmetric_import_rejects_short_key() {
        let exported = PortableKey {
            kty: KTY_OCT.to_string(),
            crv: None,
            x: None,
            d: None,
            k: Some(encode_base64url(&[0u8; 16])),
        };
        assert!(matches!(
            SymmetricKey::import(&exported),
            Err(CryptoError::MalformedKey(_))
        ));
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            PortableKey::from_json("{ nope"),
            Err(CryptoError::MalformedKey(_))
        ));
        assert!(matches!(
            PortableKey::from_json(r#"{"crv":"X25519"}"#),
            Err(CryptoError::MalformedKey(_))
        ));
    }

    #[test]
    fn debug_redacts_secret_members() {
        let exported = SymmetricKey::from_bytes([9u8; KEY_SIZE]).export();
        let k = exported.k.clone().unwrap();
        let debug = format!("{exported:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&k));
        assert_eq!(
            format!("{:?}", SymmetricKey::from_bytes([9u8; KEY_SIZE])),
            "SymmetricKey([REDACTED])"
        );
    }
}

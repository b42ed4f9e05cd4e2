//! Binary/text encoding helpers shared by every other module.
//!
//! Wire payloads use standard padded base64; JWK members use the URL-safe
//! unpadded alphabet.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

use crate::error::CryptoError;

/// Encode bytes as standard (padded) base64.
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard (padded) base64.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(input.trim())
        .map_err(|e| CryptoError::Encoding(e.to_string()))
}

/// Encode bytes as URL-safe base64 without padding (JWK style).
pub fn encode_base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode URL-safe unpadded base64.
pub fn decode_base64url(input: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|e| CryptoError::Encoding(e.to_string()))
}

/// UTF-8 text to bytes.
pub fn text_to_bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Bytes to UTF-8 text. Invalid sequences are an error, never replaced.
pub fn bytes_to_text(bytes: Vec<u8>) -> Result<String, CryptoError> {
    String::from_utf8(bytes).map_err(|e| CryptoError::Encoding(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base64_padding() {
        let encoded = encode_base64(b"A");
        assert!(encoded.ends_with("=="));
        assert_eq!(decode_base64(&encoded).unwrap(), b"A");

        let encoded = encode_base64(b"AB");
        assert!(encoded.ends_with('='));
        assert_eq!(decode_base64(&encoded).unwrap(), b"AB");
    }

    #[test]
    fn base64_empty() {
        assert_eq!(encode_base64(b""), "");
        assert!(decode_base64("").unwrap().is_empty());
    }

    #[test]
    fn base64url_has_no_padding_or_unsafe_chars() {
        let data = [0xFBu8, 0xFF, 0xBF, 0x00];
        let encoded = encode_base64url(&data);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode_base64url(&encoded).unwrap(), data);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(matches!(
            decode_base64("not base64 !!"),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert!(bytes_to_text(vec![0xC3, 0x28]).is_err());
        assert_eq!(bytes_to_text(text_to_bytes("héllo")).unwrap(), "héllo");
    }
}

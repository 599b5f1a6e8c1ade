//! HMAC-SHA256 request signing

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Literal appended to the timestamp in the stream handshake payload
pub const STREAM_PATH_TAG: &str = "stream";

/// Sign `payload` with `secret`
///
/// Returns the base64 (standard alphabet, padded) HMAC-SHA256 digest.
/// Fails only when `secret` is empty.
pub fn sign(secret: &[u8], payload: &str) -> AuthResult<String> {
    if secret.is_empty() {
        return Err(AuthError::EmptySecret);
    }

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
    mac.update(payload.as_bytes());

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Payload signed during the stream handshake: `"<timestamp_ms>stream"`
pub fn auth_payload(timestamp_ms: i64) -> String {
    format!("{}{}", timestamp_ms, STREAM_PATH_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign(b"secret", "1700000000000stream").unwrap();
        let b = sign(b"secret", "1700000000000stream").unwrap();
        assert_eq!(a, b);

        let c = sign(b"secret", "1700000000001stream").unwrap();
        assert_ne!(a, c);

        let d = sign(b"other", "1700000000000stream").unwrap();
        assert_ne!(a, d);
    }

    #[test]
    fn test_sign_output_shape() {
        for (secret, payload) in [("k", "x"), ("a much longer secret value", ""), ("s", "1stream")] {
            let sig = sign(secret.as_bytes(), payload).unwrap();
            // 32 byte digest -> 44 base64 characters with one pad
            assert_eq!(sig.len(), 44);
            assert!(sig.ends_with('='));
            assert!(sig
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
            assert_eq!(BASE64.decode(&sig).unwrap().len(), 32);
        }
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let sig = sign(b"Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(sig, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(sign(b"", "payload"), Err(AuthError::EmptySecret));
    }

    #[test]
    fn test_auth_payload() {
        assert_eq!(auth_payload(1_700_000_000_000), "1700000000000stream");
    }
}

//! Hashing and token utilities for the cache layer

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of a response body, used as the blob storage key.
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Generate an opaque URL-safe token for client identifiers.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256(b"silo telemetry");
        assert_eq!(hash.len(), 64); // SHA-256 produces 64 hex chars
    }

    #[test]
    fn test_sha256_deterministic() {
        assert_eq!(sha256(b"silo telemetry"), sha256(b"silo telemetry"));
        assert_ne!(sha256(b"silo telemetry"), sha256(b"other"));
    }

    #[test]
    fn test_generate_token() {
        let t1 = generate_token();
        let t2 = generate_token();

        // 16 bytes encode to 22 Base64url characters
        assert_eq!(t1.len(), 22);
        assert_ne!(t1, t2);

        // URL-safe, no padding
        assert!(!t1.contains('+'));
        assert!(!t1.contains('/'));
        assert!(!t1.contains('='));
    }
}

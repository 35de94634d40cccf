//! Token generation and the single canonical token digest.
//!
//! Spec section 9 calls out that a previous design hashed tokens once at
//! registration and again at lookup with two different encodings, so a
//! correct token could fail to authenticate. There is exactly one function
//! here, `hash_token`, and every caller — registry writes and auth reads
//! alike — goes through it.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Generates a new random bearer token, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The canonical digest stored in the user registry and recomputed on every
/// authentication attempt. SHA-256 over the raw token bytes, hex-encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_hex_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_deterministic() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
    }

    #[test]
    fn different_tokens_hash_differently() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(hash_token(&a), hash_token(&b));
    }
}

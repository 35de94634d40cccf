//! Random secret-value generation, grounded on `auth_crypto.rs`'s
//! `generate_random_salt`/`generate_random_nonce` (same `OsRng` source, same
//! "fill a buffer, map it to output" shape).

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CoreError, CoreResult};

const ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";

/// Generates a random secret value of the requested length, sampled
/// uniformly from an alphanumeric-plus-symbol alphabet.
pub fn generate_secret(length: usize) -> CoreResult<String> {
    if length == 0 {
        return Err(CoreError::InvalidArgument(
            "generated secret length must be greater than zero".to_string(),
        ));
    }

    let mut rng = OsRng;
    let mut out = String::with_capacity(length);
    for _ in 0..length {
        let idx = (rng.next_u32() as usize) % ALPHABET.len();
        out.push(ALPHABET[idx] as char);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_requested_length() {
        let s = generate_secret(24).expect("generate");
        assert_eq!(s.len(), 24);
    }

    #[test]
    fn rejects_zero_length() {
        assert!(generate_secret(0).is_err());
    }

    #[test]
    fn uses_only_the_declared_alphabet() {
        let s = generate_secret(256).expect("generate");
        assert!(s.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn is_not_deterministic() {
        let a = generate_secret(32).unwrap();
        let b = generate_secret(32).unwrap();
        assert_ne!(a, b);
    }
}
